//! Shared application state injected into Axum handlers.

use std::sync::Arc;

use gemma_core::GemmaContext;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: AppConfig,
    /// Serialises native calls internally; handlers only clone the `Arc`.
    context: Arc<GemmaContext>,
}

impl AppState {
    pub fn new(config: AppConfig, context: Arc<GemmaContext>) -> Self {
        Self {
            inner: Arc::new(Inner { config, context }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn context(&self) -> Arc<GemmaContext> {
        self.inner.context.clone()
    }
}
