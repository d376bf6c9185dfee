//! In-process stand-in for the native engine.
//!
//! The stub functions are plain `extern "C"` Rust functions wired into a
//! [`GemmaApi`] table, so tests exercise the same C boundary as the real
//! library. Each test registers a [`Probe`] under a unique key and passes
//! that key as the tokenizer path; the model type selects the behaviour:
//!
//! | model type | generate | count_tokens |
//! |---|---|---|
//! | `echo`     | writes the prompt, pads the rest of the buffer with `#` | word count |
//! | `stream`   | one callback per word, output is the words delivered | word count |
//! | `slow`     | like `echo` after sleeping 25 ms | word count |
//! | `fail`     | returns -1 | word count |
//! | `streamfail` | one callback with the first word, then returns -7 | word count |
//! | `rawbytes` | writes `o` followed by the invalid byte `0xff` | word count |
//! | `badcount` | like `echo` | returns -3 |
//! | `liar`     | reports more bytes than the buffer holds | word count |
//! | `invalid`  | `GemmaCreate` returns null | - |

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use gemma_core::{EngineConfig, GemmaApi, GemmaBackend};
use gemma_sys::{GemmaContext as RawContext, GemmaTokenCallback};

/// Native-side call counters for one test.
#[derive(Default)]
pub struct Probe {
    creates: AtomicUsize,
    destroys: AtomicUsize,
    generates: AtomicUsize,
    counts: AtomicUsize,
    callbacks: AtomicUsize,
    overlaps: AtomicUsize,
    in_flight: AtomicBool,
}

impl Probe {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
    pub fn generates(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }
    pub fn counts(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }
    /// Token notifications delivered to the wrapper's callback.
    pub fn callbacks(&self) -> usize {
        self.callbacks.load(Ordering::SeqCst)
    }
    /// Generate calls that started while another was still running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

static PROBES: OnceLock<Mutex<HashMap<String, Arc<Probe>>>> = OnceLock::new();

fn probes() -> std::sync::MutexGuard<'static, HashMap<String, Arc<Probe>>> {
    PROBES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Register a fresh probe under `key`.
pub fn probe(key: &str) -> Arc<Probe> {
    let probe = Arc::new(Probe::default());
    probes().insert(key.to_string(), probe.clone());
    probe
}

pub fn backend() -> GemmaBackend {
    GemmaBackend::from_api(GemmaApi {
        create: stub_create,
        destroy: stub_destroy,
        generate: stub_generate,
        count_tokens: stub_count_tokens,
    })
}

pub fn config(key: &str, mode: &str) -> EngineConfig {
    EngineConfig::new(key, mode, "/models/weights.sbs", "sfp")
}

struct StubContext {
    probe: Arc<Probe>,
    mode: String,
}

unsafe extern "C" fn stub_create(
    tokenizer_path: *const c_char,
    model_type: *const c_char,
    _weights_path: *const c_char,
    _weight_type: *const c_char,
    _max_length: c_int,
) -> *mut RawContext {
    let key = unsafe { CStr::from_ptr(tokenizer_path) }.to_string_lossy();
    let mode = unsafe { CStr::from_ptr(model_type) }
        .to_string_lossy()
        .into_owned();
    let Some(probe) = probes().get(key.as_ref()).cloned() else {
        return std::ptr::null_mut();
    };
    probe.creates.fetch_add(1, Ordering::SeqCst);
    if mode == "invalid" {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(StubContext { probe, mode })) as *mut RawContext
}

unsafe extern "C" fn stub_destroy(ctx: *mut RawContext) {
    let stub = unsafe { Box::from_raw(ctx as *mut StubContext) };
    stub.probe.destroys.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn stub_generate(
    ctx: *mut RawContext,
    prompt: *const c_char,
    output: *mut c_char,
    max_length: c_int,
    callback: GemmaTokenCallback,
    user_data: *mut c_void,
) -> c_int {
    let stub = unsafe { &*(ctx as *const StubContext) };
    let probe = &stub.probe;
    probe.generates.fetch_add(1, Ordering::SeqCst);
    if probe.in_flight.swap(true, Ordering::SeqCst) {
        probe.overlaps.fetch_add(1, Ordering::SeqCst);
    }

    let prompt = unsafe { CStr::from_ptr(prompt) }.to_bytes();
    let out = output as *mut u8;
    let cap = max_length as usize;
    unsafe { std::ptr::write_bytes(out, b'#', cap) };

    let rc = match stub.mode.as_str() {
        "fail" => -1,
        "liar" => max_length.saturating_add(10),
        "streamfail" => {
            if let (Some(cb), Some(word)) = (callback, prompt.split(|b| *b == b' ').next()) {
                probe.callbacks.fetch_add(1, Ordering::SeqCst);
                unsafe { cb(word.as_ptr() as *const c_char, word.len() as c_int, user_data) };
            }
            -7
        }
        "rawbytes" => {
            let bytes = [b'o', 0xff];
            let n = bytes.len().min(cap);
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, n) };
            n as c_int
        }
        "stream" => {
            let mut written = 0usize;
            for word in prompt.split(|b| *b == b' ').filter(|w| !w.is_empty()) {
                if written + word.len() > cap {
                    break;
                }
                unsafe { std::ptr::copy_nonoverlapping(word.as_ptr(), out.add(written), word.len()) };
                written += word.len();
                let Some(cb) = callback else { continue };
                probe.callbacks.fetch_add(1, Ordering::SeqCst);
                let keep_going =
                    unsafe { cb(word.as_ptr() as *const c_char, word.len() as c_int, user_data) };
                if !keep_going {
                    break;
                }
            }
            written as c_int
        }
        mode => {
            if mode == "slow" {
                std::thread::sleep(Duration::from_millis(25));
            }
            if prompt.len() > cap {
                -1
            } else {
                unsafe { std::ptr::copy_nonoverlapping(prompt.as_ptr(), out, prompt.len()) };
                prompt.len() as c_int
            }
        }
    };

    probe.in_flight.store(false, Ordering::SeqCst);
    rc
}

unsafe extern "C" fn stub_count_tokens(ctx: *mut RawContext, text: *const c_char) -> c_int {
    let stub = unsafe { &*(ctx as *const StubContext) };
    stub.probe.counts.fetch_add(1, Ordering::SeqCst);
    if stub.mode == "badcount" {
        return -3;
    }
    let text = unsafe { CStr::from_ptr(text) }.to_string_lossy();
    text.split_whitespace().count() as c_int
}
