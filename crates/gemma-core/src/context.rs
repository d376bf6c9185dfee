//! Safe RAII wrapper around a native `GemmaContext`.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gemma_sys::GemmaContext as RawContext;
use tracing::{debug, info, warn};

use crate::backend::GemmaBackend;
use crate::config::EngineConfig;
use crate::error::{GemmaError, Result};
use crate::generate::GenerateRequest;
use crate::marshal::{OutputBuffer, TokenBridge, c_len, c_path, c_string};

/// Owns one native context and destroys it exactly once.
///
/// Every native call happens with the inner mutex held, so a context can be
/// shared across threads (`Arc<GemmaContext>`) while the engine only ever
/// sees one call at a time. `None` inside the mutex means closed.
pub struct GemmaContext {
    raw: Mutex<Option<NonNull<RawContext>>>,
    /// Mirrors `raw.is_none()` so state can be read without waiting on an
    /// in-flight call.
    closed: AtomicBool,
    backend: GemmaBackend,
    config: EngineConfig,
}

// Safety: the pointer is never dereferenced on the Rust side and is only
// handed to the engine while `raw` is locked.
unsafe impl Send for GemmaContext {}
unsafe impl Sync for GemmaContext {}

impl GemmaContext {
    /// Create a context through `GemmaCreate`.
    pub fn new(backend: &GemmaBackend, config: EngineConfig) -> Result<Self> {
        let tokenizer = c_path("tokenizer_path", &config.tokenizer_path)?;
        let model_type = c_string("model_type", &config.model_type)?;
        let weights = c_path("weights_path", &config.weights_path)?;
        let weight_type = c_string("weight_type", &config.weight_type)?;
        let max_length = c_len("max_length", config.effective_max_length() as usize)?;

        info!(
            tokenizer = %config.tokenizer_path.display(),
            weights = %config.weights_path.display(),
            model_type = %config.model_type,
            weight_type = %config.weight_type,
            "Creating Gemma context…"
        );
        let ptr = unsafe {
            (backend.api().create)(
                tokenizer.as_ptr(),
                model_type.as_ptr(),
                weights.as_ptr(),
                weight_type.as_ptr(),
                max_length,
            )
        };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| GemmaError::Initialization("GemmaCreate returned null".into()))?;

        info!(model_type = %config.model_type, "Gemma context created");
        Ok(Self {
            raw: Mutex::new(Some(ptr)),
            closed: AtomicBool::new(false),
            backend: backend.clone(),
            config,
        })
    }

    //  Accessors

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &GemmaBackend {
        &self.backend
    }

    /// Does not block on an in-flight call.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    //  Core operations

    /// Number of tokens the engine's tokenizer produces for `text`.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let guard = self.lock();
        let ctx = (*guard).ok_or(GemmaError::InvalidState)?;
        let c_text = c_string("text", text)?;

        let n = unsafe { (self.backend.api().count_tokens)(ctx.as_ptr(), c_text.as_ptr()) };
        if n < 0 {
            return Err(GemmaError::Engine(format!("GemmaCountTokens returned {n}")));
        }
        Ok(n as usize)
    }

    /// Generate a completion for `request.prompt` without streaming.
    pub fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generate_raw(&request.prompt, request.max_length, None)
    }

    /// Generate a completion, calling `on_token` for every fragment the
    /// engine produces. Returning `false` from `on_token` stops generation;
    /// the text produced so far is still returned.
    ///
    /// A panic inside `on_token` stops generation and is resumed here once
    /// the native call has returned. `on_token` must not call back into this
    /// context; the call would block on the lock held for generation.
    pub fn generate_with<F>(&self, request: &GenerateRequest, mut on_token: F) -> Result<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mut bridge = TokenBridge::new(&mut on_token);
        let result = self.generate_raw(&request.prompt, request.max_length, Some(&mut bridge));
        let tokens = bridge.finish();
        debug!(tokens, "Streaming generation returned");
        result
    }

    fn generate_raw(
        &self,
        prompt: &str,
        max_length: usize,
        bridge: Option<&mut TokenBridge<'_>>,
    ) -> Result<String> {
        let guard = self.lock();
        let ctx = (*guard).ok_or(GemmaError::InvalidState)?;
        let c_prompt = c_string("prompt", prompt)?;
        let mut output = OutputBuffer::new(max_length)?;

        let (callback, user_data) = match bridge {
            Some(b) => b.raw_parts(),
            None => (None, ptr::null_mut()),
        };
        let written = unsafe {
            (self.backend.api().generate)(
                ctx.as_ptr(),
                c_prompt.as_ptr(),
                output.as_mut_ptr(),
                output.capacity(),
                callback,
                user_data,
            )
        };
        drop(guard);

        if written < 0 {
            warn!(code = written, "GemmaGenerate failed");
            return Err(GemmaError::Generation(written));
        }
        output.decode(written as usize)
    }

    /// Destroy the native context. Further calls are no-ops and every other
    /// operation fails with [`GemmaError::InvalidState`].
    pub fn close(&self) {
        let mut guard = self.lock();
        if let Some(ctx) = guard.take() {
            self.closed.store(true, Ordering::Release);
            debug!("Destroying Gemma context");
            unsafe { (self.backend.api().destroy)(ctx.as_ptr()) }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<NonNull<RawContext>>> {
        // Nothing panics while the lock is held; recover the state anyway.
        self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Backstop for callers that forget [`GemmaContext::close`].
impl Drop for GemmaContext {
    fn drop(&mut self) {
        let raw = self.raw.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = raw.take() {
            *self.closed.get_mut() = true;
            warn!("Gemma context dropped without close(); destroying");
            unsafe { (self.backend.api().destroy)(ctx.as_ptr()) }
        }
    }
}

impl std::fmt::Debug for GemmaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemmaContext")
            .field("model_type", &self.config.model_type)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
