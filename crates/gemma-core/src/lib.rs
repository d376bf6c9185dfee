//! Safe Rust wrapper around the Gemma C API.
//!
//! Loads the engine library once per process, owns native contexts with
//! deterministic release, and marshals prompts, output buffers and
//! streaming token callbacks across the C boundary.
//!
//! ```no_run
//! use gemma_core::{EngineConfig, GemmaBackend, GemmaContext, GenerateRequest};
//!
//! let backend = GemmaBackend::load(None)?;
//! let config = EngineConfig::new("tokenizer.spm", "2b-it", "2b-it-sfp.sbs", "sfp");
//! let ctx = GemmaContext::new(&backend, config)?;
//!
//! let text = ctx.generate_with(&GenerateRequest::new("Hello"), |piece| {
//!     print!("{piece}");
//!     true
//! })?;
//! println!("\n{} bytes", text.len());
//! ctx.close();
//! # Ok::<(), gemma_core::GemmaError>(())
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod generate;
mod marshal;

pub use backend::{GemmaBackend, LIBRARY_PATH_ENV};
pub use config::{DEFAULT_CONTEXT_MAX_LENGTH, EngineConfig};
pub use context::GemmaContext;
pub use error::{GemmaError, Result};
pub use generate::{
    DEFAULT_MAX_LENGTH, FinishReason, GenerateEvent, GenerateRequest, generate_blocking,
};
pub use gemma_sys::GemmaApi;
