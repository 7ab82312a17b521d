/// Error codes shared between the probe script and every backend.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {id} not found")]
    ElementNotFound { id: u32 },

    #[error("Element {id} is stale (removed from DOM or page changed)")]
    ElementStale { id: u32 },

    #[error("Element {id} is not interactable: {reason}")]
    ElementNotInteractable { id: u32, reason: String },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Probe execution failed: {0}")]
    Probe(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Not ready")]
    NotReady,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

/// Driver messages that mean the browser itself is gone.
const DEAD_DRIVER_MARKERS: &[&str] = &[
    "chrome not reachable",
    "session deleted",
    "invalid session id",
    "target closed",
    "browser has disconnected",
    "connection refused",
];

impl BackendError {
    /// Returns the probe protocol error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            BackendError::ElementStale { .. } => "ELEMENT_STALE",
            BackendError::ElementNotInteractable { .. } => "ELEMENT_NOT_INTERACTABLE",
            BackendError::SelectorInvalid { .. } => "SELECTOR_INVALID",
            BackendError::ScriptError(_) => "SCRIPT_ERROR",
            BackendError::Timeout { .. } => "TIMEOUT",
            BackendError::InvalidRequest(_) => "INVALID_REQUEST",
            BackendError::Probe(_) => "PROBE_ERROR",
            BackendError::ConnectionLost(_) => "CONNECTION_LOST",
            BackendError::NotReady => "NOT_READY",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::NotSupported(_) => "NOT_SUPPORTED",
            BackendError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the driver can no longer be used for this run.
    ///
    /// Element-level and script-level failures are recoverable; a lost
    /// connection or a crashed browser is not.
    pub fn is_fatal(&self) -> bool {
        match self {
            BackendError::ConnectionLost(_) | BackendError::NotReady => true,
            BackendError::Other(msg)
            | BackendError::Probe(msg)
            | BackendError::Navigation(msg)
            | BackendError::ScriptError(msg) => {
                let lower = msg.to_ascii_lowercase();
                DEAD_DRIVER_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }

    /// True for errors the element resolver answers with one re-resolution.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            BackendError::ElementStale { .. } | BackendError::ElementNotFound { .. }
        )
    }
}
