//! Marshaling helpers for the C boundary: NUL-terminated inputs, the
//! caller-allocated output buffer, and the scoped token-callback bridge.

use std::any::Any;
use std::ffi::{CString, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::path::Path;

use crate::error::{GemmaError, Result};

/// Convert `value` to a C string; `what` names the field in errors.
pub(crate) fn c_string(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| GemmaError::InvalidArgument(format!("{what} contains a NUL byte")))
}

pub(crate) fn c_path(what: &str, path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| GemmaError::InvalidArgument(format!("{what} is not valid UTF-8")))?;
    c_string(what, s)
}

/// Validate a byte bound for the C `int` parameter.
pub(crate) fn c_len(what: &str, len: usize) -> Result<c_int> {
    if len == 0 {
        return Err(GemmaError::InvalidArgument(format!("{what} must be positive")));
    }
    c_int::try_from(len)
        .map_err(|_| GemmaError::InvalidArgument(format!("{what} {len} exceeds {}", c_int::MAX)))
}

//  Output buffer

/// Zeroed byte buffer the engine writes generated text into.
///
/// Only the prefix the engine reports as written is ever decoded.
pub(crate) struct OutputBuffer {
    bytes: Vec<u8>,
    capacity: c_int,
}

impl OutputBuffer {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        let capacity = c_len("max_length", capacity)?;
        Ok(Self {
            bytes: vec![0u8; capacity as usize],
            capacity,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_char {
        self.bytes.as_mut_ptr() as *mut c_char
    }

    pub(crate) fn capacity(&self) -> c_int {
        self.capacity
    }

    /// Decode the first `written` bytes.
    pub(crate) fn decode(mut self, written: usize) -> Result<String> {
        if written > self.bytes.len() {
            return Err(GemmaError::Engine(format!(
                "engine reported {written} bytes written into a {}-byte buffer",
                self.bytes.len()
            )));
        }
        self.bytes.truncate(written);
        Ok(match String::from_utf8(self.bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

//  Token callback bridge

/// Routes native token notifications to a Rust closure for the duration of
/// one `GemmaGenerate` call.
///
/// The bridge lives on the caller's stack; the user-data pointer handed to
/// the engine is derived from `&mut self` and must not be used once the
/// native call returns. Panics raised by the closure are caught at the
/// boundary, turned into a stop signal, and re-raised by [`finish`].
///
/// [`finish`]: TokenBridge::finish
pub(crate) struct TokenBridge<'a> {
    on_token: &'a mut dyn FnMut(&str) -> bool,
    panic: Option<Box<dyn Any + Send + 'static>>,
    calls: usize,
}

impl<'a> TokenBridge<'a> {
    pub(crate) fn new(on_token: &'a mut dyn FnMut(&str) -> bool) -> Self {
        Self {
            on_token,
            panic: None,
            calls: 0,
        }
    }

    pub(crate) fn raw_parts(&mut self) -> (gemma_sys::GemmaTokenCallback, *mut c_void) {
        (
            Some(token_trampoline),
            self as *mut TokenBridge<'a> as *mut c_void,
        )
    }

    #[cfg(test)]
    pub(crate) fn calls(&self) -> usize {
        self.calls
    }

    /// End the registration, resuming any panic raised by the closure.
    pub(crate) fn finish(self) -> usize {
        if let Some(payload) = self.panic {
            resume_unwind(payload);
        }
        self.calls
    }
}

unsafe extern "C" fn token_trampoline(
    text: *const c_char,
    len: c_int,
    user_data: *mut c_void,
) -> bool {
    if user_data.is_null() {
        return false;
    }
    let bridge = unsafe { &mut *(user_data as *mut TokenBridge<'_>) };
    if bridge.panic.is_some() {
        return false;
    }

    let bytes: &[u8] = if text.is_null() || len <= 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(text as *const u8, len as usize) }
    };
    let piece = String::from_utf8_lossy(bytes);

    bridge.calls += 1;
    match catch_unwind(AssertUnwindSafe(|| (bridge.on_token)(&piece))) {
        Ok(keep_going) => keep_going,
        Err(payload) => {
            bridge.panic = Some(payload);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify(bridge: &mut TokenBridge<'_>, text: &[u8]) -> bool {
        let (cb, data) = bridge.raw_parts();
        let cb = cb.unwrap();
        unsafe { cb(text.as_ptr() as *const c_char, text.len() as c_int, data) }
    }

    #[test]
    fn c_string_rejects_interior_nul() {
        assert!(c_string("prompt", "hello").is_ok());
        let err = c_string("prompt", "he\0llo").unwrap_err();
        assert!(matches!(err, GemmaError::InvalidArgument(m) if m.contains("prompt")));
    }

    #[test]
    fn c_len_bounds() {
        assert_eq!(c_len("n", 16).unwrap(), 16);
        assert!(c_len("n", 0).is_err());
        assert!(c_len("n", c_int::MAX as usize + 1).is_err());
    }

    #[test]
    fn decode_uses_reported_length() {
        let mut buf = OutputBuffer::new(32).unwrap();
        assert_eq!(buf.capacity(), 32);
        unsafe {
            let p = buf.as_mut_ptr() as *mut u8;
            std::ptr::write_bytes(p, b'#', 32);
            std::ptr::copy_nonoverlapping(b"hi".as_ptr(), p, 2);
        }
        assert_eq!(buf.decode(2).unwrap(), "hi");
    }

    #[test]
    fn decode_rejects_overlong_report() {
        let buf = OutputBuffer::new(4).unwrap();
        assert!(matches!(buf.decode(5), Err(GemmaError::Engine(_))));
    }

    #[test]
    fn decode_replaces_invalid_utf8() {
        let mut buf = OutputBuffer::new(4).unwrap();
        unsafe {
            let p = buf.as_mut_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping([b'a', 0xff, b'b'].as_ptr(), p, 3);
        }
        assert_eq!(buf.decode(3).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn bridge_forwards_text_and_flag() {
        let mut seen = Vec::new();
        let mut cb = |s: &str| {
            seen.push(s.to_string());
            seen.len() < 2
        };
        let mut bridge = TokenBridge::new(&mut cb);
        assert!(notify(&mut bridge, b"foo"));
        assert!(!notify(&mut bridge, "bär".as_bytes()));
        assert_eq!(bridge.calls(), 2);
        assert_eq!(bridge.finish(), 2);
        assert_eq!(seen, vec!["foo", "bär"]);
    }

    #[test]
    fn bridge_handles_null_text() {
        let mut got = None;
        let mut cb = |s: &str| {
            got = Some(s.to_string());
            true
        };
        let mut bridge = TokenBridge::new(&mut cb);
        let (cb_fn, data) = bridge.raw_parts();
        let keep = unsafe { cb_fn.unwrap()(std::ptr::null(), 3, data) };
        assert!(keep);
        bridge.finish();
        assert_eq!(got.as_deref(), Some(""));
    }

    #[test]
    fn bridge_captures_panic() {
        let mut cb = |_: &str| -> bool { panic!("boom") };
        let mut bridge = TokenBridge::new(&mut cb);
        assert!(!notify(&mut bridge, b"x"));
        // Further notifications are refused without calling the closure.
        assert!(!notify(&mut bridge, b"y"));
        assert_eq!(bridge.calls(), 1);

        let res = catch_unwind(AssertUnwindSafe(move || bridge.finish()));
        let payload = res.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    }
}
