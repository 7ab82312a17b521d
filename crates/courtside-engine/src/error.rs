use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::resolution::ResolveError;
use crate::selectors::Role;
use courtside_common::protocol::Locator;
use thiserror::Error;

/// Errors that escape a workflow stage.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no element for role '{role}' (tried {} locators)", .attempted.len())]
    ElementNotFound { role: Role, attempted: Vec<Locator> },

    #[error("element for role '{role}' went stale again after re-resolution")]
    StaleReference { role: Role },

    #[error("verification failed: {0}")]
    VerificationMismatch(String),

    #[error("browser automation failed: {0}")]
    HardAutomation(#[source] BackendError),

    #[error("login failed after {attempts} attempts")]
    LoginFailed { attempts: u32 },

    #[error("could not reach the booking page: {0}")]
    NavigationFailed(String),

    #[error("could not select {target}: {reason}")]
    DateSelectionFailed { target: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// True when the browser session can no longer be used.
    pub fn is_hard(&self) -> bool {
        matches!(self, EngineError::HardAutomation(e) if e.is_fatal())
    }
}

/// Only a driver that is gone escalates as a hard failure; anything else
/// means a check on the page could not be completed.
impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        if err.is_fatal() {
            EngineError::HardAutomation(err)
        } else {
            EngineError::VerificationMismatch(err.to_string())
        }
    }
}

/// Failure inside one attempt of a retried step.
#[derive(Debug)]
pub(crate) enum StepError {
    /// Worth another attempt.
    Recoverable(String),
    /// Ends the stage, and usually the run.
    Fatal(EngineError),
}

impl From<ResolveError> for StepError {
    fn from(err: ResolveError) -> Self {
        if err.is_hard() {
            StepError::Fatal(err.into())
        } else {
            StepError::Recoverable(err.to_string())
        }
    }
}

impl From<BackendError> for StepError {
    fn from(err: BackendError) -> Self {
        if err.is_fatal() {
            StepError::Fatal(EngineError::HardAutomation(err))
        } else {
            StepError::Recoverable(err.to_string())
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { role, attempted } => {
                EngineError::ElementNotFound { role, attempted }
            }
            ResolveError::Stale { role } => EngineError::StaleReference { role },
            ResolveError::Backend(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_backend_error_is_not_hard() {
        let err: EngineError = BackendError::ScriptError("Execution context was destroyed".into()).into();
        assert!(matches!(err, EngineError::VerificationMismatch(_)));
        assert!(!err.is_hard());

        let err: EngineError = BackendError::ElementNotInteractable {
            id: 4,
            reason: "click intercepted".into(),
        }
        .into();
        assert!(!err.is_hard());
    }

    #[test]
    fn test_dead_driver_is_hard() {
        let err: EngineError = BackendError::ConnectionLost("socket closed".into()).into();
        assert!(err.is_hard());

        let err: EngineError = ResolveError::Backend(BackendError::Other("chrome not reachable".into())).into();
        assert!(err.is_hard());
    }
}
