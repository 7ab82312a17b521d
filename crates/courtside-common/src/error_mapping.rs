//! Error Code Mapping
//!
//! Maps probe error codes (from JavaScript) to Rust `BackendError` variants.

use crate::error::BackendError;
use serde_json::Value;

/// Maps a probe error code and message to a `BackendError`.
pub fn map_probe_error(code: &str, message: &str, details: Option<&Value>) -> BackendError {
    match code {
        "ELEMENT_NOT_FOUND" => BackendError::ElementNotFound {
            id: extract_id(details),
        },
        "ELEMENT_STALE" => BackendError::ElementStale {
            id: extract_id(details),
        },
        "ELEMENT_NOT_INTERACTABLE" => BackendError::ElementNotInteractable {
            id: extract_id(details),
            reason: message.to_string(),
        },
        "SELECTOR_INVALID" => {
            let selector = details
                .and_then(|d| d.get("selector"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            BackendError::SelectorInvalid { selector }
        }
        "SCRIPT_ERROR" => BackendError::ScriptError(message.to_string()),
        "TIMEOUT" => BackendError::Timeout {
            operation: message.to_string(),
        },
        "INVALID_REQUEST" | "UNKNOWN_ACTION" => BackendError::InvalidRequest(message.to_string()),
        // Fallback for unknown codes
        _ => BackendError::Probe(format!("[{}] {}", code, message)),
    }
}

/// Extract element ID from details JSON.
fn extract_id(details: Option<&Value>) -> u32 {
    details
        .and_then(|d| d.get("id"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32
}
