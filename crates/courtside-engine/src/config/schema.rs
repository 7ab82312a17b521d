use crate::selectors::Role;
use courtside_common::protocol::Locator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourtsideConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Extra candidates per role, tried after the built-in ones.
    #[serde(default)]
    pub selectors: HashMap<Role, Vec<Locator>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_booking_paths")]
    pub booking_paths: Vec<String>,
    /// IANA zone the site's calendar runs in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            login_path: default_login_path(),
            booking_paths: default_booking_paths(),
            timezone: default_timezone(),
        }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_booking_paths() -> Vec<String> {
    [
        "/app/bookings/grid",
        "/court-booking",
        "/bookings",
        "/booking",
        "/book-online",
        "/reserve",
        "/courts",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Court numbers in preference order.
    #[serde(default = "default_courts")]
    pub courts: Vec<u32>,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub players: Vec<String>,
    /// Slot text fragments that mean "already taken".
    #[serde(default = "default_unavailable_markers")]
    pub unavailable_markers: Vec<String>,
    #[serde(default = "default_sweeps")]
    pub sweeps: u32,
    #[serde(default = "default_sweep_delay_ms")]
    pub sweep_delay_ms: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            courts: default_courts(),
            time: default_time(),
            days_ahead: default_days_ahead(),
            duration_minutes: default_duration_minutes(),
            players: Vec::new(),
            unavailable_markers: default_unavailable_markers(),
            sweeps: default_sweeps(),
            sweep_delay_ms: default_sweep_delay_ms(),
        }
    }
}

fn default_courts() -> Vec<u32> {
    vec![1]
}

fn default_time() -> String {
    "18:00".to_string()
}

fn default_days_ahead() -> u32 {
    7
}

fn default_duration_minutes() -> u32 {
    60
}

fn default_unavailable_markers() -> Vec<String> {
    ["booked", "unavailable", "not available", "reserved", "full"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sweeps() -> u32 {
    1
}

fn default_sweep_delay_ms() -> u64 {
    30000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    #[serde(default = "default_login_backoff_ms")]
    pub login_backoff_ms: u64,
    #[serde(default = "default_login_verify_ms")]
    pub login_verify_ms: u64,
    #[serde(default = "default_date_attempts")]
    pub date_attempts: u32,
    #[serde(default = "default_dialog_timeout_ms")]
    pub dialog_timeout_ms: u64,
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_post_confirm_ms")]
    pub post_confirm_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            element_timeout_ms: default_element_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            login_attempts: default_login_attempts(),
            login_backoff_ms: default_login_backoff_ms(),
            login_verify_ms: default_login_verify_ms(),
            date_attempts: default_date_attempts(),
            dialog_timeout_ms: default_dialog_timeout_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            post_confirm_ms: default_post_confirm_ms(),
        }
    }
}

impl TimingConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn login_backoff(&self) -> Duration {
        Duration::from_millis(self.login_backoff_ms)
    }

    pub fn login_verify(&self) -> Duration {
        Duration::from_millis(self.login_verify_ms)
    }

    pub fn dialog_timeout(&self) -> Duration {
        Duration::from_millis(self.dialog_timeout_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn post_confirm(&self) -> Duration {
        Duration::from_millis(self.post_confirm_ms)
    }
}

fn default_element_timeout_ms() -> u64 {
    10000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_login_attempts() -> u32 {
    3
}

fn default_login_backoff_ms() -> u64 {
    2000
}

fn default_login_verify_ms() -> u64 {
    10000
}

fn default_date_attempts() -> u32 {
    3
}

fn default_dialog_timeout_ms() -> u64 {
    10000
}

fn default_confirm_timeout_ms() -> u64 {
    10000
}

fn default_post_confirm_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRetry {
    /// Go back to the booking page and pick the date again.
    #[default]
    DateOnly,
    /// Log in again, navigate, then pick the date.
    FullSession,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub date_retry: DateRetry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            user_data_dir: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Persist screenshots and HTML at every capture point.
    #[serde(default = "default_capture")]
    pub capture: bool,
    #[serde(default = "default_debug_dir")]
    pub dir: PathBuf,
    /// Outline every resolved element in the page.
    #[serde(default)]
    pub highlight: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            capture: default_capture(),
            dir: default_debug_dir(),
            highlight: false,
        }
    }
}

fn default_capture() -> bool {
    true
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from("./debug")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}
