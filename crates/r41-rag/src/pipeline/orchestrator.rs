//! Answer pipeline: FAQ fast path, rewrite, route, decompose, retrieve, and
//! streamed generation
//!
//! Each call to [`AnswerPipeline::answer`] spawns one producer task that
//! writes answer fragments into a bounded channel. The returned
//! [`AnswerStream`] reads that channel; dropping it closes the channel, and
//! the producer stops (dropping the upstream generator stream) on its next
//! send.

use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::faq::FaqMatcher;
use crate::generation::PromptBuilder;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::retrieval::{dedupe, format_context, HybridRetriever};
use crate::types::ConversationHistory;

use super::decomposer::Decomposer;
use super::messages::{
    is_dont_know, DONT_KNOW_MESSAGE, GENERATION_ERROR_MESSAGE, REFUSAL_MESSAGE, TIMEOUT_MESSAGE,
};
use super::rewriter::QueryRewriter;
use super::router::Router;

/// Progress of one request through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Rewritten,
    Routed,
    Refused,
    Retrieving,
    Answered,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::Rewritten => "rewritten",
            PipelineStage::Routed => "routed",
            PipelineStage::Refused => "refused",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Answered => "answered",
        };
        f.write_str(name)
    }
}

fn enter(stage: PipelineStage) {
    tracing::info!(stage = %stage, "pipeline stage");
}

/// Model handles for each stage; the same provider may back several
#[derive(Clone)]
pub struct StageModels {
    pub rewriter: Arc<dyn LlmProvider>,
    pub router: Arc<dyn LlmProvider>,
    pub decomposer: Arc<dyn LlmProvider>,
    pub generator: Arc<dyn LlmProvider>,
}

impl StageModels {
    /// One provider for every stage
    pub fn shared(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            rewriter: Arc::clone(&llm),
            router: Arc::clone(&llm),
            decomposer: Arc::clone(&llm),
            generator: llm,
        }
    }
}

struct Settings {
    top_k: usize,
    faq_threshold: u8,
    faq_max_words: usize,
    stream_buffer: usize,
    short_circuit_empty_context: bool,
    deadline: Option<Duration>,
}

struct PipelineInner {
    faq: Option<Arc<FaqMatcher>>,
    rewriter: QueryRewriter,
    router: Router,
    decomposer: Decomposer,
    retriever: Arc<HybridRetriever>,
    generator: Arc<dyn LlmProvider>,
    settings: Settings,
}

/// Cheaply cloneable handle to the request pipeline
#[derive(Clone)]
pub struct AnswerPipeline {
    inner: Arc<PipelineInner>,
}

impl AnswerPipeline {
    pub fn new(
        config: &RagConfig,
        models: StageModels,
        retriever: Arc<HybridRetriever>,
        faq: Option<Arc<FaqMatcher>>,
    ) -> Self {
        let stage_tokens = config.llm.max_stage_tokens;
        let pipeline = &config.pipeline;

        let inner = PipelineInner {
            faq: faq.filter(|_| config.faq.enabled),
            rewriter: QueryRewriter::new(models.rewriter, stage_tokens, pipeline.academic_year_start_month),
            router: Router::new(models.router, stage_tokens),
            decomposer: Decomposer::new(
                models.decomposer,
                pipeline.max_sub_questions,
                pipeline.include_original,
                stage_tokens,
            ),
            retriever,
            generator: models.generator,
            settings: Settings {
                top_k: config.retrieval.top_k,
                faq_threshold: config.faq.threshold,
                faq_max_words: config.faq.max_words,
                stream_buffer: pipeline.stream_buffer.max(1),
                short_circuit_empty_context: pipeline.short_circuit_empty_context,
                deadline: pipeline.deadline_secs.map(Duration::from_secs),
            },
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn faq(&self) -> Option<&Arc<FaqMatcher>> {
        self.inner.faq.as_ref()
    }

    /// Answer from the FAQ table if the question is short and matches closely
    pub fn faq_answer(&self, question: &str) -> Option<String> {
        self.inner.faq_answer(question)
    }

    /// Start answering; fragments arrive on the returned stream
    pub fn answer(&self, question: impl Into<String>, history: &ConversationHistory) -> AnswerStream {
        let question = question.into();
        let history = history.clone();
        let request_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.settings.stream_buffer);

        let inner = Arc::clone(&self.inner);
        let span = tracing::info_span!("answer", request_id = %request_id);
        tokio::spawn(
            async move {
                inner.produce(&question, &history, tx).await;
            }
            .instrument(span),
        );

        AnswerStream {
            request_id,
            inner: ReceiverStream::new(rx),
        }
    }

    /// Collect the whole answer; identical to concatenating [`answer`](Self::answer)
    pub async fn answer_text(&self, question: impl Into<String>, history: &ConversationHistory) -> String {
        self.answer(question, history).collect::<Vec<_>>().await.concat()
    }

    /// Collect the answer, replacing the don't-know fallback with a looser
    /// FAQ match when one scores at least `relaxed_threshold`
    pub async fn answer_text_with_faq_fallback(
        &self,
        question: impl Into<String>,
        history: &ConversationHistory,
        relaxed_threshold: u8,
    ) -> String {
        let question = question.into();
        let answer = self.answer_text(question.clone(), history).await;
        if !is_dont_know(&answer) {
            return answer;
        }

        match self.faq().and_then(|faq| faq.find(&question, relaxed_threshold)) {
            Some(faq_answer) => {
                tracing::info!("No grounded answer; using relaxed FAQ match");
                faq_answer.to_string()
            }
            None => answer,
        }
    }
}

impl PipelineInner {
    async fn produce(&self, question: &str, history: &ConversationHistory, tx: mpsc::Sender<String>) {
        let started = std::time::Instant::now();
        // a dropped AnswerStream cancels whichever stage is in flight
        let work = async {
            tokio::select! {
                biased;
                _ = tx.closed() => tracing::info!("Client went away; abandoning request"),
                _ = self.run(question, history, &tx) => {}
            }
        };

        match self.settings.deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, work).await.is_err() {
                    tracing::warn!("Request exceeded its {:?} deadline", deadline);
                    let _ = tx.send(TIMEOUT_MESSAGE.to_string()).await;
                }
            }
            None => work.await,
        }

        tracing::info!("Request finished in {:?}", started.elapsed());
    }

    async fn run(&self, question: &str, history: &ConversationHistory, tx: &mpsc::Sender<String>) {
        enter(PipelineStage::Start);

        if let Some(answer) = self.faq_answer(question) {
            tracing::info!("Answered from FAQ");
            let _ = tx.send(answer).await;
            enter(PipelineStage::Answered);
            return;
        }

        if tx.is_closed() {
            return;
        }
        let rewritten = self.rewriter.rewrite(question, history).await;
        enter(PipelineStage::Rewritten);
        if tx.is_closed() {
            return;
        }

        let decision = self.router.route(&rewritten, history).await;
        enter(PipelineStage::Routed);
        tracing::info!(route = %decision.route, confidence = ?decision.confidence, "routed");

        if !decision.is_in_domain() {
            enter(PipelineStage::Refused);
            let _ = tx.send(REFUSAL_MESSAGE.to_string()).await;
            return;
        }

        if tx.is_closed() {
            return;
        }
        enter(PipelineStage::Retrieving);
        let sub_questions = self.decomposer.decompose(&rewritten).await;
        let results = match self
            .retriever
            .retrieve_many(sub_questions.as_slice(), self.settings.top_k)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Retrieval failed, answering without context: {}", e);
                Vec::new()
            }
        };

        let documents = dedupe(&results);
        let context = format_context(&documents);
        tracing::debug!(
            "Context: {} passages, {} chars from {} sub-questions",
            documents.len(),
            context.len(),
            sub_questions.len()
        );

        if context.trim().is_empty() && self.settings.short_circuit_empty_context {
            tracing::info!("No relevant passages; answering with the fallback");
            let _ = tx.send(DONT_KNOW_MESSAGE.to_string()).await;
            enter(PipelineStage::Answered);
            return;
        }

        if tx.is_closed() {
            tracing::info!("Client went away before generation");
            return;
        }
        let request = PromptBuilder::answer(&rewritten, &context, history);
        if self.stream_generation(&request, tx).await {
            enter(PipelineStage::Answered);
        }
    }

    /// Forward generator fragments; false when the stream ended early
    async fn stream_generation(
        &self,
        request: &GenerationRequest,
        tx: &mpsc::Sender<String>,
    ) -> bool {
        let mut stream = match self.generator.generate_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Generation failed to start: {}", e);
                let _ = tx.send(GENERATION_ERROR_MESSAGE.to_string()).await;
                return false;
            }
        };

        let mut chunks = 0usize;
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) if fragment.is_empty() => continue,
                Ok(fragment) => {
                    if tx.send(fragment).await.is_err() {
                        tracing::info!("Client went away after {} chunks; stopping generation", chunks);
                        return false;
                    }
                    chunks += 1;
                }
                Err(e) => {
                    tracing::error!("Generation failed after {} chunks: {}", chunks, e);
                    let _ = tx.send(GENERATION_ERROR_MESSAGE.to_string()).await;
                    return false;
                }
            }
        }

        tracing::debug!("Streamed {} chunks", chunks);
        true
    }

    fn faq_answer(&self, question: &str) -> Option<String> {
        let faq = self.faq.as_ref()?;
        if question.split_whitespace().count() >= self.settings.faq_max_words {
            return None;
        }
        faq.find(question, self.settings.faq_threshold).map(str::to_string)
    }
}

/// Ordered answer fragments of one request
///
/// Concatenating every item gives the full answer.
pub struct AnswerStream {
    request_id: Uuid,
    inner: ReceiverStream<String>,
}

impl AnswerStream {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Stream for AnswerStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
