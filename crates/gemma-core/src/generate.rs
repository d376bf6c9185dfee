//! Generation requests and the channel-based streaming driver.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::context::GemmaContext;

/// Default output bound in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 8192;

/// Parameters for a generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Size of the output buffer handed to the engine, in bytes.
    pub max_length: usize,
    /// Wall-clock budget enforced by [`generate_blocking`].
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_length: DEFAULT_MAX_LENGTH,
            timeout: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Events emitted during streaming generation.
#[derive(Debug, Clone)]
pub enum GenerateEvent {
    /// A new text fragment was produced.
    Token(String),
    /// Generation finished.
    Done {
        finish_reason: FinishReason,
        /// Byte length of the decoded output. Invalid UTF-8 from the engine
        /// is replaced before counting, so this can exceed the native count.
        text_bytes: usize,
    },
    /// The engine or the handle reported an error.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The engine stopped on its own.
    Stop,
    /// The receiver went away.
    Cancelled,
    /// The request's timeout elapsed.
    Timeout,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Run a blocking streaming generation.
///
/// This is intended to be called inside `tokio::task::spawn_blocking`.
/// Fragments are sent over `tx` as they arrive, followed by exactly one
/// `Done` or `Error` event. Dropping the receiver or exceeding
/// `request.timeout` stops the engine through the token callback.
pub fn generate_blocking(
    ctx: &GemmaContext,
    request: &GenerateRequest,
    tx: mpsc::Sender<GenerateEvent>,
) {
    let started = Instant::now();
    let mut finish_reason = FinishReason::Stop;

    let result = ctx.generate_with(request, |piece| {
        if let Some(limit) = request.timeout
            && started.elapsed() >= limit
        {
            finish_reason = FinishReason::Timeout;
            return false;
        }
        if tx.blocking_send(GenerateEvent::Token(piece.to_string())).is_err() {
            finish_reason = FinishReason::Cancelled;
            return false;
        }
        true
    });

    let event = match result {
        Ok(text) => {
            debug!(%finish_reason, bytes = text.len(), "Generation finished");
            GenerateEvent::Done {
                finish_reason,
                text_bytes: text.len(),
            }
        }
        Err(e) => GenerateEvent::Error(e.to_string()),
    };
    let _ = tx.blocking_send(event);
}
