//! Raw FFI declarations for the Gemma C API.
//!
//! The engine ships as a shared library (`libgemma.so`, `libgemma.dylib`,
//! `gemma.dll`) exporting four C functions. Instead of linking at build
//! time, [`GemmaLibrary`] opens the library at runtime and resolves the
//! symbols into a [`GemmaApi`] function table.
//!
//! ```c
//! typedef struct GemmaContext GemmaContext;
//! typedef bool (*GemmaTokenCallback)(const char* text, int len, void* user_data);
//!
//! GemmaContext* GemmaCreate(const char* tokenizer_path, const char* model_type,
//!                           const char* weights_path, const char* weight_type,
//!                           int max_length);
//! void GemmaDestroy(GemmaContext* ctx);
//! int  GemmaGenerate(GemmaContext* ctx, const char* prompt, char* output,
//!                    int max_length, GemmaTokenCallback cb, void* user_data);
//! int  GemmaCountTokens(GemmaContext* ctx, const char* text);
//! ```

use std::ffi::{OsStr, OsString, c_char, c_int, c_void};

use libloading::Library;

/// Opaque native context. Only ever handled behind a pointer.
#[repr(C)]
pub struct GemmaContext {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<(*mut u8, core::marker::PhantomPinned)>,
}

/// Per-token notification. `text` is *not* NUL-terminated; `len` bytes are
/// valid. Returning `false` asks the engine to stop generating.
pub type GemmaTokenCallback =
    Option<unsafe extern "C" fn(text: *const c_char, len: c_int, user_data: *mut c_void) -> bool>;

pub type GemmaCreateFn = unsafe extern "C" fn(
    tokenizer_path: *const c_char,
    model_type: *const c_char,
    weights_path: *const c_char,
    weight_type: *const c_char,
    max_length: c_int,
) -> *mut GemmaContext;

pub type GemmaDestroyFn = unsafe extern "C" fn(ctx: *mut GemmaContext);

/// Returns the number of bytes written to `output`, or a negative value on
/// failure.
pub type GemmaGenerateFn = unsafe extern "C" fn(
    ctx: *mut GemmaContext,
    prompt: *const c_char,
    output: *mut c_char,
    max_length: c_int,
    callback: GemmaTokenCallback,
    user_data: *mut c_void,
) -> c_int;

/// Returns the token count of `text`, or a negative value on failure.
pub type GemmaCountTokensFn =
    unsafe extern "C" fn(ctx: *mut GemmaContext, text: *const c_char) -> c_int;

pub const SYMBOL_CREATE: &[u8] = b"GemmaCreate\0";
pub const SYMBOL_DESTROY: &[u8] = b"GemmaDestroy\0";
pub const SYMBOL_GENERATE: &[u8] = b"GemmaGenerate\0";
pub const SYMBOL_COUNT_TOKENS: &[u8] = b"GemmaCountTokens\0";

/// Base name of the engine library, without platform prefix/suffix.
pub const LIBRARY_NAME: &str = "gemma";

/// Platform file name of the engine library (`libgemma.so` on Linux).
pub fn default_library_name() -> OsString {
    libloading::library_filename(LIBRARY_NAME)
}

/// Function table for one engine implementation.
///
/// Pointers resolved from a [`GemmaLibrary`] are only valid while that
/// library stays loaded.
#[derive(Clone, Copy)]
pub struct GemmaApi {
    pub create: GemmaCreateFn,
    pub destroy: GemmaDestroyFn,
    pub generate: GemmaGenerateFn,
    pub count_tokens: GemmaCountTokensFn,
}

impl std::fmt::Debug for GemmaApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemmaApi")
            .field("create", &(self.create as *const c_void))
            .field("destroy", &(self.destroy as *const c_void))
            .field("generate", &(self.generate as *const c_void))
            .field("count_tokens", &(self.count_tokens as *const c_void))
            .finish()
    }
}

/// A dynamically loaded engine library together with its resolved symbols.
pub struct GemmaLibrary {
    api: GemmaApi,
    // Must outlive every pointer copied out of `api`.
    _lib: Library,
}

impl GemmaLibrary {
    /// Open the library at `path` (file name or full path) and resolve all
    /// four entry points.
    ///
    /// # Safety
    /// Loading a library runs its initialisers. The caller must trust the
    /// library and guarantee that it exports the signatures declared in
    /// this crate.
    pub unsafe fn open<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let lib = unsafe { Library::new(path.as_ref())? };
        let api = unsafe {
            GemmaApi {
                create: *lib.get::<GemmaCreateFn>(SYMBOL_CREATE)?,
                destroy: *lib.get::<GemmaDestroyFn>(SYMBOL_DESTROY)?,
                generate: *lib.get::<GemmaGenerateFn>(SYMBOL_GENERATE)?,
                count_tokens: *lib.get::<GemmaCountTokensFn>(SYMBOL_COUNT_TOKENS)?,
            }
        };
        Ok(Self { api, _lib: lib })
    }

    pub fn api(&self) -> &GemmaApi {
        &self.api
    }
}
