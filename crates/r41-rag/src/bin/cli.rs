//! Command-line front end: ask, chat, ingest and serve
//!
//! Run with: cargo run -p r41-rag --bin r41-rag -- chat

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use r41_rag::bootstrap;
use r41_rag::config::RagConfig;
use r41_rag::ingestion::Ingestor;
use r41_rag::server::RagServer;
use r41_rag::types::ConversationHistory;

/// R41 club assistant
#[derive(Parser, Debug)]
#[command(name = "r41-rag")]
#[command(version)]
#[command(about = "Ask questions about the R41 club from the terminal", long_about = None)]
struct Args {
    /// Configuration file path (overrides R41_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level: default (warnings), -v (info), -vv (debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive chat; type `exit` or `quit` to leave
    Chat,
    /// Rebuild the vector index from the knowledge directory
    Ingest {
        /// Knowledge directory (defaults to ingestion.knowledge_dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Run the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Ask { question } => ask(config, &question.join(" ")).await,
        Commands::Chat => chat(config).await,
        Commands::Ingest { dir } => ingest(config, dir).await,
        Commands::Serve => {
            RagServer::new(config).await?.start().await?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "r41_rag=warn",
        1 => "r41_rag=info",
        _ => "r41_rag=debug,tower_http=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RagConfig> {
    let Some(path) = path else {
        return Ok(RagConfig::load()?);
    };
    let mut config = RagConfig::from_file(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

async fn ask(config: RagConfig, question: &str) -> anyhow::Result<()> {
    let relaxed = config.faq.relaxed_threshold;
    let runtime = bootstrap::build_pipeline(config).await?;

    let answer = runtime
        .pipeline
        .answer_text_with_faq_fallback(question, &ConversationHistory::new(), relaxed)
        .await;
    println!("{}", answer.trim());
    Ok(())
}

async fn chat(config: RagConfig) -> anyhow::Result<()> {
    let runtime = bootstrap::build_pipeline(config).await?;
    let mut history = ConversationHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{}",
        style("Ask me anything about the R41 club. Type 'exit' to quit.").bold()
    );

    loop {
        print!("{} ", style("you>").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        print!("{} ", style("r41>").green().bold());
        let mut answer = String::new();
        let mut stream = runtime.pipeline.answer(question, &history);
        while let Some(fragment) = stream.next().await {
            print!("{}", fragment);
            std::io::stdout().flush()?;
            answer.push_str(&fragment);
        }
        println!("\n");

        history.record_exchange(question, answer);
    }

    println!("{}", style("Bye!").dim());
    Ok(())
}

async fn ingest(mut config: RagConfig, dir: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(dir) = dir {
        config.ingestion.knowledge_dir = dir;
    }

    let backends = bootstrap::build_backends(&config)?;
    if !backends.embedder.health_check().await.unwrap_or(false) {
        anyhow::bail!(
            "Embedding backend is not reachable at {}; start Ollama and pull {}",
            config.llm.base_url,
            config.embeddings.model
        );
    }
    let faq = bootstrap::load_faq(&config)?;

    println!(
        "Indexing {} into {}",
        style(config.ingestion.knowledge_dir.display()).bold(),
        style(config.vector_db.storage_path.display()).bold()
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Embedding [{bar:40.cyan/blue}] {pos}/{len} | ETA: {eta}")
            .context("invalid progress template")?
            .progress_chars("=> "),
    );

    let ingestor = Ingestor::new(config.ingestion.clone(), backends.embedder, backends.store);
    let report = ingestor
        .ingest(faq.as_deref(), |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
        .await?;
    bar.finish_and_clear();

    println!(
        "{} {} chunks from {} files, {} FAQ rows ({} files skipped)",
        style("Indexed").green().bold(),
        report.chunks,
        report.files,
        report.faq_rows,
        report.skipped_files
    );
    Ok(())
}
