//! Process-wide loading of the Gemma engine library.

use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use gemma_sys::{GemmaApi, GemmaLibrary};
use tracing::{info, warn};

use crate::error::{GemmaError, Result};

/// Environment variable overriding the library location.
pub const LIBRARY_PATH_ENV: &str = "GEMMA_LIBRARY_PATH";

static LOADED: OnceLock<std::result::Result<GemmaBackend, LoadFailure>> = OnceLock::new();

#[derive(Debug, Clone)]
struct LoadFailure {
    library: String,
    reason: String,
}

impl From<&LoadFailure> for GemmaError {
    fn from(f: &LoadFailure) -> Self {
        GemmaError::LibraryLoad {
            library: f.library.clone(),
            reason: f.reason.clone(),
        }
    }
}

/// Handle to a resolved engine function table.
///
/// Cloning is cheap; a dynamically loaded library stays mapped until the
/// last clone (and every context created from it) is gone.
#[derive(Clone)]
pub struct GemmaBackend {
    inner: Arc<Inner>,
}

struct Inner {
    api: GemmaApi,
    source: String,
    /// Keeps the symbols in `api` valid.
    _library: Option<GemmaLibrary>,
}

impl GemmaBackend {
    /// Load the engine library once per process.
    ///
    /// The location is `path` if given, else `$GEMMA_LIBRARY_PATH`, else the
    /// platform file name for `gemma` resolved by the dynamic loader. The
    /// first outcome is cached: later calls return the same backend (or the
    /// same error) regardless of `path`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let requested = resolve_library(path);
        let outcome = LOADED.get_or_init(|| open(&requested));
        match outcome {
            Ok(backend) => {
                if backend.inner.source != requested.to_string_lossy() {
                    warn!(
                        loaded = %backend.inner.source,
                        requested = %requested.to_string_lossy(),
                        "Engine library already loaded; ignoring requested location"
                    );
                }
                Ok(backend.clone())
            }
            Err(failure) => Err(failure.into()),
        }
    }

    /// Wrap an already-resolved function table, e.g. a statically linked
    /// engine. Not cached.
    pub fn from_api(api: GemmaApi) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                source: "<static>".into(),
                _library: None,
            }),
        }
    }

    pub(crate) fn api(&self) -> &GemmaApi {
        &self.inner.api
    }

    /// Where the function table came from (library path or `<static>`).
    pub fn source(&self) -> &str {
        &self.inner.source
    }
}

impl std::fmt::Debug for GemmaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemmaBackend")
            .field("source", &self.inner.source)
            .finish_non_exhaustive()
    }
}

/// Pick the library location: explicit path, then env override, then the
/// platform default name.
pub fn resolve_library(path: Option<&Path>) -> OsString {
    if let Some(p) = path {
        return p.as_os_str().to_owned();
    }
    match std::env::var_os(LIBRARY_PATH_ENV) {
        Some(v) if !v.is_empty() => v,
        _ => gemma_sys::default_library_name(),
    }
}

fn open(location: &OsString) -> std::result::Result<GemmaBackend, LoadFailure> {
    let shown = location.to_string_lossy().into_owned();
    let library = unsafe { GemmaLibrary::open(location) }.map_err(|e| LoadFailure {
        library: shown.clone(),
        reason: e.to_string(),
    })?;

    info!(library = %shown, "Gemma engine library loaded");
    Ok(GemmaBackend {
        inner: Arc::new(Inner {
            api: *library.api(),
            source: shown,
            _library: Some(library),
        }),
    })
}
