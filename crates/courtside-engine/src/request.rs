use crate::schedule::{SlotTime, duration_labels};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A bookable resource (a court), identified the way the site labels it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for ResourceId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

/// Everything one run tries to book. Built once from configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub days_ahead: u32,
    /// Preference order: the first available wins.
    pub resources: Vec<ResourceId>,
    pub time: SlotTime,
    pub duration_minutes: u32,
    pub players: Vec<String>,
}

impl BookingRequest {
    pub fn duration_labels(&self) -> Vec<String> {
        duration_labels(self.duration_minutes)
    }
}

/// Site login. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
