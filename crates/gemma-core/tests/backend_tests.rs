//! Process-wide library loading. Kept in its own test binary because the
//! first load outcome is cached for the life of the process.

use std::path::Path;

use gemma_core::{GemmaBackend, GemmaError};

#[test]
fn load_missing_library_is_cached_error() {
    let path = Path::new("/nonexistent/gemma-test/libgemma-missing.so");

    let err = GemmaBackend::load(Some(path)).unwrap_err();
    match &err {
        GemmaError::LibraryLoad { library, reason } => {
            assert_eq!(library, "/nonexistent/gemma-test/libgemma-missing.so");
            assert!(!reason.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("libgemma-missing.so"));

    // A second call, even with another location, returns the cached failure.
    let again = GemmaBackend::load(None).unwrap_err();
    assert!(matches!(
        again,
        GemmaError::LibraryLoad { ref library, .. } if library.ends_with("libgemma-missing.so")
    ));
}
