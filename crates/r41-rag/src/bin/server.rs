//! Chat server binary
//!
//! Run with: cargo run -p r41-rag --bin r41-rag-server

use r41_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "r41_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                    R41 Club Assistant                     ║
║          Grounded answers about the robotics club         ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Generator model: {}", config.llm.generate_model);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Vector index: {}", config.vector_db.storage_path.display());
    tracing::info!("  - FAQ table: {}", config.faq.path.display());

    let server = RagServer::new(config).await?;

    let health = server.state().backend_health().await;
    if health.generator && health.embeddings {
        tracing::info!("Model backends are reachable");
    } else {
        tracing::warn!(
            "Model backends not fully available (generator: {}, embeddings: {})",
            health.generator,
            health.embeddings
        );
        tracing::warn!("For local models start Ollama and pull them:");
        tracing::warn!("  ollama serve");
        tracing::warn!("  ollama pull nomic-embed-text && ollama pull llama3.2:3b");
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/chat - Ask a question (streamed answer)");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
