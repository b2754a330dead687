//! FFI bindings for Synheart Stream
//!
//! This module provides C-compatible functions for driving a stream session
//! from a host BLE stack. Notification payloads go in as raw byte buffers;
//! events come out as JSON strings that must be freed by the caller using
//! `stream_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use serde::Serialize;

use crate::config::StreamConfig;
use crate::pipeline::StreamSession;
use crate::protocol::{start_frame, stop_frame};
use crate::types::{Characteristic, MeasurementType, RawFrame};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Serialize to a newly allocated C string, recording any failure
fn to_json_cstr<T: Serialize + ?Sized>(value: &T) -> *mut c_char {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };
    match CString::new(json) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a StreamSession
pub struct StreamSessionHandle {
    session: StreamSession,
}

/// Create a new session.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for the
///   default configuration.
/// - Returns a pointer that must be freed with `stream_session_free`.
/// - Returns NULL on error; call `stream_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stream_session_new(config_json: *const c_char) -> *mut StreamSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        StreamConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string");
                return ptr::null_mut();
            }
        };
        match StreamConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match StreamSession::with_config(config) {
        Ok(session) => Box::into_raw(Box::new(StreamSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `stream_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stream_session_free(session: *mut StreamSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Ingest one notification and return the resulting events as a JSON array.
///
/// `characteristic` is one of `heart_rate_measurement`, `pmd_control`,
/// `pmd_data` or `battery_level`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `stream_session_new`.
/// - `characteristic` must be a valid null-terminated C string.
/// - `data` must point to `len` readable bytes (may be NULL when `len` is 0).
/// - Returns a newly allocated string that must be freed with `stream_free_string`.
/// - Returns NULL on error; call `stream_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stream_session_ingest(
    session: *mut StreamSessionHandle,
    characteristic: *const c_char,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    let name = match cstr_to_string(characteristic) {
        Some(s) => s,
        None => {
            set_last_error("Invalid characteristic string pointer");
            return ptr::null_mut();
        }
    };

    let Some(characteristic) = Characteristic::from_name(&name) else {
        set_last_error(&format!("Unknown characteristic: {}", name));
        return ptr::null_mut();
    };

    let bytes: &[u8] = if len == 0 {
        &[]
    } else if data.is_null() {
        set_last_error("Null data pointer");
        return ptr::null_mut();
    } else {
        slice::from_raw_parts(data, len)
    };

    match handle.session.try_ingest(RawFrame::new(characteristic, bytes)) {
        Ok(events) => to_json_cstr(&events),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Reset a session after a disconnect.
///
/// # Safety
/// - `session` must be a valid pointer returned by `stream_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn stream_session_reset(session: *mut StreamSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    (*session).session.reset();
    0
}

#[derive(Serialize)]
struct SessionSnapshot {
    session_id: String,
    rmssd_ms: Option<f64>,
    respiration_bpm: Option<f64>,
    battery_level: Option<u8>,
}

/// Current derived metrics and battery level as a JSON object.
///
/// # Safety
/// - `session` must be a valid pointer returned by `stream_session_new`.
/// - Returns a newly allocated string that must be freed with `stream_free_string`.
/// - Returns NULL on error; call `stream_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stream_session_metrics(session: *const StreamSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let session = &(*session).session;
    let metrics = session.metrics();
    to_json_cstr(&SessionSnapshot {
        session_id: session.session_id().to_string(),
        rmssd_ms: metrics.rmssd_ms,
        respiration_bpm: metrics.respiration_bpm,
        battery_level: session.battery_level(),
    })
}

// ============================================================================
// Control frames
// ============================================================================

/// Bytes to write to the PMD control point, as a JSON array of integers.
///
/// # Safety
/// - `measurement` must be a valid null-terminated C string (`ecg`, `ppg` or `acc`).
/// - Returns a newly allocated string that must be freed with `stream_free_string`.
/// - Returns NULL on error; call `stream_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stream_control_frame(measurement: *const c_char, start: bool) -> *mut c_char {
    clear_last_error();

    let name = match cstr_to_string(measurement) {
        Some(s) => s,
        None => {
            set_last_error("Invalid measurement string pointer");
            return ptr::null_mut();
        }
    };

    let measurement = match name.as_str() {
        "ecg" => MeasurementType::Ecg,
        "ppg" => MeasurementType::Ppg,
        "acc" => MeasurementType::Acc,
        other => {
            set_last_error(&format!("Unknown measurement: {}", other));
            return ptr::null_mut();
        }
    };

    if start {
        to_json_cstr(start_frame(measurement))
    } else {
        to_json_cstr(&stop_frame(measurement))
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stream functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stream function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stream_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stream function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stream_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stream_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        stream_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = stream_session_new(ptr::null());
            assert!(!session.is_null());

            let hr = CString::new("heart_rate_measurement").unwrap();
            let frame = [0x10u8, 64, 0x00, 0x04, 0x00, 0x04];
            let events = take_string(stream_session_ingest(
                session,
                hr.as_ptr(),
                frame.as_ptr(),
                frame.len(),
            ));
            let value: serde_json::Value = serde_json::from_str(&events).unwrap();
            assert_eq!(value[0]["type"], "hr_sample");
            assert_eq!(value[0]["value"]["ibis"][1], 1000);
            assert_eq!(value[1]["type"], "rmssd");

            let metrics = take_string(stream_session_metrics(session));
            let value: serde_json::Value = serde_json::from_str(&metrics).unwrap();
            assert_eq!(value["rmssd_ms"], 0.0);
            assert!(value["battery_level"].is_null());

            assert_eq!(stream_session_reset(session), 0);
            let metrics = take_string(stream_session_metrics(session));
            let value: serde_json::Value = serde_json::from_str(&metrics).unwrap();
            assert!(value["rmssd_ms"].is_null());

            stream_session_free(session);
        }
    }

    #[test]
    fn test_ffi_custom_config() {
        unsafe {
            let config = CString::new(r#"{"ecg_capacity": 10}"#).unwrap();
            let session = stream_session_new(config.as_ptr());
            assert!(!session.is_null());
            assert_eq!((*session).session.config().ecg_capacity, 10);
            stream_session_free(session);

            let bad = CString::new(r#"{"ecg_capacity": 0}"#).unwrap();
            assert!(stream_session_new(bad.as_ptr()).is_null());
            assert!(!stream_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let session = stream_session_new(ptr::null());
            let pmd = CString::new("pmd_data").unwrap();
            let frame = [0x00u8, 0x01];
            let result = stream_session_ingest(session, pmd.as_ptr(), frame.as_ptr(), frame.len());
            assert!(result.is_null());

            let error = CStr::from_ptr(stream_last_error()).to_str().unwrap();
            assert!(error.contains("too short"), "{error}");

            let gyro = CString::new("gyro").unwrap();
            assert!(stream_session_ingest(session, gyro.as_ptr(), frame.as_ptr(), 2).is_null());

            assert!(stream_session_ingest(ptr::null_mut(), pmd.as_ptr(), ptr::null(), 0).is_null());
            stream_session_free(session);
        }
    }

    #[test]
    fn test_ffi_control_frame() {
        unsafe {
            let ecg = CString::new("ecg").unwrap();
            assert_eq!(
                take_string(stream_control_frame(ecg.as_ptr(), true)),
                "[2,0,0,1,130,0,1,1,14,0]"
            );
            assert_eq!(take_string(stream_control_frame(ecg.as_ptr(), false)), "[3,0]");

            let gyro = CString::new("gyro").unwrap();
            assert!(stream_control_frame(gyro.as_ptr(), true).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = stream_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
