//! Terminal outcome of a run.

use crate::request::ResourceId;
use crate::schedule::SlotTime;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Success,
    Failure,
    NoAvailability,
    Error,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Success => "SUCCESS",
            TerminalState::Failure => "FAILURE",
            TerminalState::NoAvailability => "NO_AVAILABILITY",
            TerminalState::Error => "ERROR",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub state: TerminalState,
    pub message: String,
    pub resource: Option<ResourceId>,
    pub time: Option<SlotTime>,
}

impl Outcome {
    pub fn new(state: TerminalState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            resource: None,
            time: None,
        }
    }

    pub fn success(resource: ResourceId, time: SlotTime, message: impl Into<String>) -> Self {
        Self {
            state: TerminalState::Success,
            message: message.into(),
            resource: Some(resource),
            time: Some(time),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(TerminalState::Failure, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TerminalState::Error, message)
    }

    pub fn no_availability(message: impl Into<String>) -> Self {
        Self::new(TerminalState::NoAvailability, message)
    }

    pub fn is_success(&self) -> bool {
        self.state == TerminalState::Success
    }
}

/// Workflow stage that produced a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Launch,
    Login,
    Navigation,
    DateSelection,
    Booking,
    PostConfirmation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Launch => "launch",
            Stage::Login => "login",
            Stage::Navigation => "navigation",
            Stage::DateSelection => "date_selection",
            Stage::Booking => "booking",
            Stage::PostConfirmation => "post_confirmation",
        };
        f.write_str(name)
    }
}

/// Accumulates the run's single terminal outcome.
///
/// Each `record` overwrites the current state, except that a SUCCESS
/// downgraded to FAILURE stays downgraded for the rest of the run.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    current: Option<Outcome>,
    history: Vec<(Stage, Outcome)>,
    downgraded: bool,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, outcome: Outcome) {
        if self.downgraded && outcome.state == TerminalState::Success {
            warn!(%stage, "ignoring SUCCESS after the run was downgraded to FAILURE");
            self.history.push((stage, outcome));
            return;
        }
        if let Some(prev) = &self.current
            && prev.state == TerminalState::Success
            && outcome.state == TerminalState::Failure
        {
            self.downgraded = true;
        }
        debug!(%stage, state = %outcome.state, message = %outcome.message, "outcome recorded");
        self.history.push((stage, outcome.clone()));
        self.current = Some(outcome);
    }

    pub fn current(&self) -> Option<&Outcome> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[(Stage, Outcome)] {
        &self.history
    }

    /// The last recorded outcome; ERROR when nothing was ever recorded.
    pub fn into_final(self) -> Outcome {
        self.current
            .unwrap_or_else(|| Outcome::error("run ended without recording an outcome"))
    }
}
