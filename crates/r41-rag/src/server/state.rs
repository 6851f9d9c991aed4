//! Application state for the chat server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bootstrap::RagRuntime;
use crate::config::RagConfig;
use crate::pipeline::AnswerPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    runtime: RagRuntime,
    /// Ready state
    ready: RwLock<bool>,
}

/// Backend reachability as reported by `/ready`
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendHealth {
    pub generator: bool,
    pub embeddings: bool,
    pub vector_db: bool,
    pub indexed_documents: usize,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.generator && self.embeddings && self.vector_db
    }
}

impl AppState {
    pub fn new(runtime: RagRuntime) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                runtime,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.runtime.config
    }

    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.inner.runtime.pipeline
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Check every backend
    pub async fn backend_health(&self) -> BackendHealth {
        let backends = &self.inner.runtime.backends;
        let (generator, embeddings, store_len) = tokio::join!(
            backends.llm.health_check(),
            backends.embedder.health_check(),
            crate::providers::VectorStoreProvider::len(backends.store.as_ref()),
        );

        let flag = |name: &str, result: crate::error::Result<bool>| match result {
            Ok(up) => up,
            Err(e) => {
                tracing::warn!("{} health check failed: {}", name, e);
                false
            }
        };

        BackendHealth {
            generator: flag("generator", generator),
            embeddings: flag("embeddings", embeddings),
            vector_db: store_len.is_ok(),
            indexed_documents: store_len.unwrap_or(0),
        }
    }
}
