use async_trait::async_trait;
pub use courtside_common::error::BackendError;
pub use courtside_common::protocol::NavigationResult;
use courtside_common::protocol::{ProbeAction, ProbeResponse};

/// The Backend trait is the unified interface every browser driver implements.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the backend (start browser, connect to a driver, etc.)
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the backend and cleanup resources.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    /// Execute one probe action inside the current document.
    async fn execute_probe(&mut self, action: ProbeAction) -> Result<ProbeResponse, BackendError>;

    /// Capture a screenshot of the current viewport (PNG bytes).
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;

    /// Serialized HTML of the current document.
    async fn page_source(&mut self) -> Result<String, BackendError>;

    /// Refresh the current page.
    async fn refresh(&mut self) -> Result<NavigationResult, BackendError> {
        Err(BackendError::NotSupported("refresh".into()))
    }

    /// Press a named key ("Enter", "ArrowDown", "Escape") on the focused element.
    async fn press_key(&mut self, _key: &str) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("press_key".into()))
    }
}
