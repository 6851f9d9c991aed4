//! Query processing pipeline
//!
//! raw question + history → rewrite → route → {refusal | decompose →
//! hybrid retrieval fan-out → dedupe/format → streamed generation}, with a
//! fuzzy FAQ short path for short questions.

pub mod decomposer;
pub mod messages;
pub mod orchestrator;
pub mod rewriter;
pub mod router;
pub mod temporal;

pub use decomposer::{Decomposer, SubQuestionSet};
pub use messages::{DONT_KNOW_MESSAGE, GENERATION_ERROR_MESSAGE, REFUSAL_MESSAGE, TIMEOUT_MESSAGE};
pub use orchestrator::{AnswerPipeline, AnswerStream, PipelineStage, StageModels};
pub use rewriter::QueryRewriter;
pub use router::{parse_route, Route, RouteDecision, Router};
pub use temporal::TemporalContext;
