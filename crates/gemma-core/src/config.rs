//! Context creation parameters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Output bound passed to `GemmaCreate` when none is configured.
pub const DEFAULT_CONTEXT_MAX_LENGTH: u32 = 2048;

/// Describes how to create a [`GemmaContext`](crate::GemmaContext).
///
/// Paths and type strings are handed to the engine untouched; the engine
/// decides whether they are usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tokenizer model file (e.g. `tokenizer.spm`).
    pub tokenizer_path: PathBuf,
    /// Model variant, e.g. `2b-it`.
    pub model_type: String,
    /// Compressed weights file (e.g. `2b-it-sfp.sbs`).
    pub weights_path: PathBuf,
    /// Weight encoding, e.g. `sfp`, `bf16`, `f32`.
    pub weight_type: String,
    /// Maximum generated length configured on the native side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl EngineConfig {
    pub fn new(
        tokenizer_path: impl Into<PathBuf>,
        model_type: impl Into<String>,
        weights_path: impl Into<PathBuf>,
        weight_type: impl Into<String>,
    ) -> Self {
        Self {
            tokenizer_path: tokenizer_path.into(),
            model_type: model_type.into(),
            weights_path: weights_path.into(),
            weight_type: weight_type.into(),
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn effective_max_length(&self) -> u32 {
        self.max_length.unwrap_or(DEFAULT_CONTEXT_MAX_LENGTH)
    }
}
