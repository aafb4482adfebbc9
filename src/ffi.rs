//! FFI bindings for the ILR engine
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `ilr_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::dates::parse_date;
use crate::error::ComputeError;
use crate::pipeline::{ilr_to_json, IlrCalculator};
use crate::rules::RuleSet;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Convert a computation result into a C string, recording errors
fn result_to_cstr(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Parse an optional `YYYY-MM-DD` C string into a calculator
unsafe fn apply_today(
    calculator: IlrCalculator,
    today: *const c_char,
) -> Result<IlrCalculator, ComputeError> {
    match cstr_to_string(today) {
        None => Ok(calculator),
        Some(raw) => parse_date(&raw)
            .map(|date| calculator.with_today(date))
            .ok_or_else(|| ComputeError::DateParseError(format!("invalid today date '{}'", raw))),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Run one assessment and return the result bundle as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ilr_free_string`.
/// - Returns NULL on error; call `ilr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ilr_calculate(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    result_to_cstr(ilr_to_json(json_str))
}

/// Run one assessment with a fixed reference date for `daysUntilEligible`.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - `today` must be a valid null-terminated `YYYY-MM-DD` C string, or NULL for
///   the system date.
/// - Returns a newly allocated string that must be freed with `ilr_free_string`.
/// - Returns NULL on error; call `ilr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ilr_calculate_with_today(
    json: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = apply_today(IlrCalculator::new(), today)
        .and_then(|calculator| calculator.calculate_json(&json_str));
    result_to_cstr(result)
}

// ============================================================================
// Calculator API
// ============================================================================

/// Opaque handle for a configured calculator
pub struct IlrCalculatorHandle {
    calculator: IlrCalculator,
}

/// Create a calculator.
///
/// # Safety
/// - `rules_json` must be a valid null-terminated C string, or NULL for the
///   statutory rules.
/// - Must be freed with `ilr_calculator_free`.
/// - Returns NULL on error; call `ilr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ilr_calculator_new(rules_json: *const c_char) -> *mut IlrCalculatorHandle {
    clear_last_error();

    let calculator = match cstr_to_string(rules_json) {
        None => Ok(IlrCalculator::new()),
        Some(json) => RuleSet::from_json(&json).and_then(IlrCalculator::with_rules),
    };

    match calculator {
        Ok(calculator) => Box::into_raw(Box::new(IlrCalculatorHandle { calculator })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a calculator.
///
/// # Safety
/// - `calculator` must be a valid pointer returned by `ilr_calculator_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ilr_calculator_free(calculator: *mut IlrCalculatorHandle) {
    if !calculator.is_null() {
        drop(Box::from_raw(calculator));
    }
}

/// Run one assessment with a configured calculator.
///
/// # Safety
/// - `calculator` must be a valid pointer returned by `ilr_calculator_new`.
/// - `json` must be a valid null-terminated C string.
/// - `today` must be a valid null-terminated C string, or NULL.
/// - Returns a newly allocated string that must be freed with `ilr_free_string`.
/// - Returns NULL on error; call `ilr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ilr_calculator_calculate(
    calculator: *const IlrCalculatorHandle,
    json: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if calculator.is_null() {
        set_last_error("Null calculator pointer");
        return ptr::null_mut();
    }

    let handle = &*calculator;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = apply_today(handle.calculator.clone(), today)
        .and_then(|calculator| calculator.calculate_json(&json_str));
    result_to_cstr(result)
}

/// Return the statutory rule set as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `ilr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ilr_rules_json() -> *mut c_char {
    clear_last_error();
    result_to_cstr(RuleSet::default().to_json())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ilr_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ilr_last_error() -> *const c_char {
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
pub unsafe extern "C" fn ilr_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input_json() -> CString {
        CString::new(
            r#"{
                "trips": [{"id": "t1", "outDate": "2023-03-01", "inDate": "2023-03-15"}],
                "visaStartDate": "2023-01-01",
                "vignetteEntryDate": "2023-01-01",
                "ilrTrack": 5
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_calculate() {
        let json = sample_input_json();

        unsafe {
            let result = ilr_calculate(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"status\": \"ELIGIBLE\""));
            assert!(result_str.contains("2027-12-04"));

            ilr_free_string(result);
        }
    }

    #[test]
    fn test_ffi_calculate_with_today() {
        let json = sample_input_json();
        let today = CString::new("2027-12-01").unwrap();

        unsafe {
            let result = ilr_calculate_with_today(json.as_ptr(), today.as_ptr());
            assert!(!result.is_null());

            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(value["summary"]["daysUntilEligible"], 3);

            ilr_free_string(result);
        }
    }

    #[test]
    fn test_ffi_calculator_lifecycle() {
        let rules = CString::new(r#"{"applicationLeadDays": 0}"#).unwrap();
        let json = sample_input_json();

        unsafe {
            let calculator = ilr_calculator_new(rules.as_ptr());
            assert!(!calculator.is_null());

            let result = ilr_calculator_calculate(calculator, json.as_ptr(), ptr::null());
            assert!(!result.is_null());
            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("2028-01-01"));

            ilr_free_string(result);
            ilr_calculator_free(calculator);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = ilr_calculate(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = ilr_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let bad_rules = CString::new(r#"{"rollingWindowMonths": 0}"#).unwrap();
            assert!(ilr_calculator_new(bad_rules.as_ptr()).is_null());

            let json = sample_input_json();
            let bad_today = CString::new("yesterday").unwrap();
            assert!(ilr_calculate_with_today(json.as_ptr(), bad_today.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_rules_and_version() {
        unsafe {
            let rules = ilr_rules_json();
            assert!(!rules.is_null());
            let rules_str = CStr::from_ptr(rules).to_str().unwrap();
            assert!(rules_str.contains("rollingAbsenceLimitDays"));
            ilr_free_string(rules);

            let version = ilr_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
