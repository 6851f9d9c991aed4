//! Topic routing with a fail-safe parser

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::types::ConversationHistory;

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid JSON object pattern"));

/// Where a query goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// About the club: retrieve and answer
    InDomain,
    /// Anything else: refuse
    OutOfDomain,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Route::InDomain => "vector_search",
            Route::OutOfDomain => "irrelevant",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub route: Route,
    /// Model-reported confidence in `[0, 1]`, when given
    pub confidence: Option<f32>,
    /// Raw model output, kept for logs
    pub raw: Option<String>,
}

impl RouteDecision {
    pub fn out_of_domain(raw: Option<String>) -> Self {
        Self {
            route: Route::OutOfDomain,
            confidence: None,
            raw,
        }
    }

    pub fn is_in_domain(&self) -> bool {
        self.route == Route::InDomain
    }
}

#[derive(Deserialize)]
struct RawRoute {
    route: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse router output; anything unrecognised is out of domain
pub fn parse_route(raw: &str) -> RouteDecision {
    try_parse_route(raw).unwrap_or_else(|| RouteDecision::out_of_domain(Some(raw.to_string())))
}

/// First embedded JSON object carrying a known route
fn try_parse_route(raw: &str) -> Option<RouteDecision> {
    JSON_OBJECT.find_iter(raw).find_map(|candidate| {
        let parsed: RawRoute = serde_json::from_str(candidate.as_str()).ok()?;
        let route = match parsed.route.trim().to_lowercase().as_str() {
            "vector_search" | "in_domain" => Route::InDomain,
            "irrelevant" | "out_of_domain" => Route::OutOfDomain,
            _ => return None,
        };
        Some(RouteDecision {
            route,
            confidence: parsed.confidence.map(|c| c.clamp(0.0, 1.0)),
            raw: Some(raw.to_string()),
        })
    })
}

/// In-domain / out-of-domain classifier
pub struct Router {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    pub async fn route(&self, question: &str, history: &ConversationHistory) -> RouteDecision {
        let request = PromptBuilder::route(question, history)
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.0);

        match self.llm.generate(&request).await {
            Ok(raw) => try_parse_route(&raw).unwrap_or_else(|| {
                tracing::warn!("Unparsable router output, refusing: {:?}", raw);
                RouteDecision::out_of_domain(Some(raw))
            }),
            Err(e) => {
                tracing::warn!("Router failed, refusing: {}", e);
                RouteDecision::out_of_domain(None)
            }
        }
    }
}
