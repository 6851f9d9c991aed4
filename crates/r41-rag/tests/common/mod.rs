//! Scripted providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use r41_rag::config::RagConfig;
use r41_rag::error::{Error, Result};
use r41_rag::faq::{FaqEntry, FaqMatcher};
use r41_rag::generation::TokenStream;
use r41_rag::pipeline::{AnswerPipeline, StageModels};
use r41_rag::providers::{EmbeddingProvider, GenerationRequest, LlmProvider};
use r41_rag::retrieval::{HybridRetriever, Retriever};
use r41_rag::types::{Document, RetrievalResult, ScoredDocument};

/// Which stage a generation request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rewrite,
    Route,
    Decompose,
    Answer,
}

impl Stage {
    fn of(request: &GenerationRequest) -> Self {
        let system = request.system.as_deref().unwrap_or("");
        if system.contains("You rewrite questions") {
            Stage::Rewrite
        } else if system.contains("You route questions") {
            Stage::Route
        } else if system.contains("search queries") {
            Stage::Decompose
        } else {
            Stage::Answer
        }
    }
}

/// How the answer stage behaves
#[derive(Debug, Clone)]
pub enum AnswerScript {
    /// Emit these fragments, then end
    Fragments(Vec<String>),
    /// Emit these fragments, then fail
    FailAfter(Vec<String>),
    /// Refuse to start
    FailToStart,
    /// Emit a fragment every `interval`, forever
    Endless { interval: Duration },
}

/// Fake LLM answering every stage from a script
pub struct ScriptedLlm {
    pub route_reply: String,
    pub decompose_reply: String,
    /// `None` echoes the question back
    pub rewrite_reply: Option<String>,
    /// Echo with "this year" replaced by the academic year from the prompt
    pub resolve_dates: bool,
    pub answer: AnswerScript,
    pub calls: Mutex<Vec<Stage>>,
    pub answer_prompts: Mutex<Vec<GenerationRequest>>,
    /// Fragments pulled from the answer stream
    pub pulled: Arc<AtomicUsize>,
    /// Set when the answer stream is dropped
    pub answer_dropped: Arc<AtomicBool>,
}

impl ScriptedLlm {
    pub fn in_domain(fragments: &[&str]) -> Self {
        Self {
            route_reply: r#"{"route": "vector_search", "confidence": 0.92}"#.to_string(),
            decompose_reply: "R41 robotics night date\nR41 events calendar".to_string(),
            rewrite_reply: None,
            resolve_dates: false,
            answer: AnswerScript::Fragments(fragments.iter().map(|f| f.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
            answer_prompts: Mutex::new(Vec::new()),
            pulled: Arc::new(AtomicUsize::new(0)),
            answer_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn out_of_domain() -> Self {
        Self {
            route_reply: r#"{"route": "irrelevant", "confidence": 0.97}"#.to_string(),
            ..Self::in_domain(&["should never be generated"])
        }
    }

    pub fn with_route_reply(mut self, reply: &str) -> Self {
        self.route_reply = reply.to_string();
        self
    }

    pub fn with_decompose_reply(mut self, reply: &str) -> Self {
        self.decompose_reply = reply.to_string();
        self
    }

    pub fn with_date_resolution(mut self) -> Self {
        self.resolve_dates = true;
        self
    }

    pub fn with_answer(mut self, answer: AnswerScript) -> Self {
        self.answer = answer;
        self
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().clone()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls.lock().iter().filter(|s| **s == stage).count()
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let stage = Stage::of(request);
        self.calls.lock().push(stage);
        match stage {
            Stage::Rewrite => {
                if let Some(reply) = &self.rewrite_reply {
                    return Ok(reply.clone());
                }
                let prompt = request.prompt();
                let question = prompt.rsplit("Question: ").next().unwrap_or(prompt).to_string();
                let year = request
                    .system
                    .as_deref()
                    .and_then(|s| s.split("The current academic year is ").nth(1))
                    .and_then(|rest| rest.split(" and").next());
                match year {
                    Some(year) if self.resolve_dates => {
                        Ok(question.replace("this year", &format!("in {}", year)))
                    }
                    _ => Ok(question),
                }
            }
            Stage::Route => Ok(self.route_reply.clone()),
            Stage::Decompose => Ok(self.decompose_reply.clone()),
            Stage::Answer => Err(Error::llm("answers are streamed")),
        }
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        let stage = Stage::of(request);
        if stage != Stage::Answer {
            let text = self.generate(request).await?;
            return Ok(stream::once(async move { Ok(text) }).boxed());
        }
        self.calls.lock().push(stage);
        self.answer_prompts.lock().push(request.clone());

        let pulled = Arc::clone(&self.pulled);
        let guard = DropFlag(Arc::clone(&self.answer_dropped));
        let stream = match self.answer.clone() {
            AnswerScript::FailToStart => return Err(Error::llm("backend unavailable")),
            AnswerScript::Fragments(fragments) => stream::iter(fragments.into_iter().map(Ok)).boxed(),
            AnswerScript::FailAfter(fragments) => stream::iter(fragments.into_iter().map(Ok))
                .chain(stream::once(async { Err(Error::llm("connection reset")) }))
                .boxed(),
            AnswerScript::Endless { interval } => stream::unfold(0usize, move |n| async move {
                tokio::time::sleep(interval).await;
                Some((Ok(format!("tok{} ", n)), n + 1))
            })
            .boxed(),
        };

        Ok(stream
            .inspect(move |_| {
                let _keep = &guard;
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Retriever returning a fixed list and counting its calls
pub struct FixedRetriever {
    pub documents: Vec<Document>,
    pub calls: AtomicUsize,
}

impl FixedRetriever {
    pub fn new(contents: &[&str]) -> Self {
        Self {
            documents: contents.iter().map(|c| Document::new(*c, "kb.md")).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<RetrievalResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .documents
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, d)| ScoredDocument::new(d.clone(), 1.0 / (i + 1) as f32))
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Bag-of-keywords embedder that records every text it embeds
pub struct KeywordEmbedder {
    pub embedded: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub const VOCABULARY: [&'static str; 6] = ["r41", "club", "robotics", "arduino", "workshop", "president"];

    pub fn new() -> Self {
        Self {
            embedded: Mutex::new(Vec::new()),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        Self::VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| w.starts_with(term)).count() as f32)
            .collect()
    }

    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedded.lock().push(text.to_string());
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        Self::VOCABULARY.len()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Embeds every text to the same vector
pub struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "constant"
    }
}

pub fn faq() -> Arc<FaqMatcher> {
    Arc::new(FaqMatcher::new(vec![
        FaqEntry::new("What is R41?", "R41 is the robotics club of ENSAB."),
        FaqEntry::new("How can I join the club?", "Fill in the membership form on our Instagram."),
    ]))
}

pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.pipeline.deadline_secs = None;
    config.pipeline.stream_buffer = 4;
    config
}

/// Pipeline over `llm` for every stage and a single fixed retriever
pub fn pipeline(
    config: &RagConfig,
    llm: Arc<ScriptedLlm>,
    retriever: Arc<FixedRetriever>,
    faq: Option<Arc<FaqMatcher>>,
) -> AnswerPipeline {
    let hybrid = HybridRetriever::new(config.retrieval.rrf_k).with_retriever(retriever, 1.0);
    AnswerPipeline::new(config, StageModels::shared(llm), Arc::new(hybrid), faq)
}
