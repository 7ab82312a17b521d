use super::schema::CourtsideConfig;
use crate::request::{BookingRequest, Credentials, ResourceId};
use crate::schedule::{Clock, SlotTime, target_date};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an explicit path, or from the default locations, then apply
    /// `COURTSIDE_*` environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<CourtsideConfig, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from(p).await?,
            None => Self::load_default().await?,
        };
        apply_env(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from default locations:
    /// 1. ./courtside.yaml
    /// 2. ~/.courtside/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<CourtsideConfig, ConfigError> {
        let local_config = PathBuf::from("./courtside.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".courtside").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        debug!("no config file found, using defaults");
        Ok(CourtsideConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<CourtsideConfig, ConfigError> {
        info!(path = %path.display(), "loading config");
        let content = tokio::fs::read_to_string(path).await?;
        let config: CourtsideConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// Applies `COURTSIDE_*` overrides read through `lookup`.
pub fn apply_env<F>(config: &mut CourtsideConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("COURTSIDE_URL") {
        config.site.base_url = Some(v);
    }
    if let Some(v) = get("COURTSIDE_USERNAME") {
        config.credentials.username = Some(v);
    }
    if let Some(v) = get("COURTSIDE_PASSWORD") {
        config.credentials.password = Some(v);
    }
    if let Some(v) = get("COURTSIDE_COURTS") {
        let courts: Vec<u32> = v
            .split(',')
            .filter_map(|c| c.trim().parse().ok())
            .collect();
        if courts.is_empty() {
            warn!(value = %v, "COURTSIDE_COURTS has no numeric entries, keeping configured courts");
        } else {
            config.booking.courts = courts;
        }
    }
    if let Some(v) = get("COURTSIDE_TIME") {
        config.booking.time = v;
    }
    if let Some(v) = get("COURTSIDE_DAYS_AHEAD") {
        match v.trim().parse() {
            Ok(n) => config.booking.days_ahead = n,
            Err(_) => warn!(value = %v, "ignoring non-numeric COURTSIDE_DAYS_AHEAD"),
        }
    }
    if let Some(v) = get("COURTSIDE_DURATION_MINUTES") {
        match v.trim().parse() {
            Ok(n) => config.booking.duration_minutes = n,
            Err(_) => warn!(value = %v, "ignoring non-numeric COURTSIDE_DURATION_MINUTES"),
        }
    }
    if let Some(v) = get("COURTSIDE_PLAYERS") {
        config.booking.players = v
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(v) = get("COURTSIDE_HEADLESS") {
        config.browser.headless = !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        );
    }
    if let Some(v) = get("COURTSIDE_TIMEZONE") {
        config.site.timezone = v;
    }
    if let Some(v) = get("COURTSIDE_WEBHOOK_URL") {
        config.notify.webhook_url = Some(v);
    }
}

impl CourtsideConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .site
            .base_url
            .as_deref()
            .ok_or(ConfigError::Missing("site.base_url"))?;
        Url::parse(raw).map_err(|e| ConfigError::Invalid {
            field: "site.base_url",
            reason: e.to_string(),
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.site
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                field: "site.timezone",
                reason: e.to_string(),
            })
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let username = self
            .credentials
            .username
            .clone()
            .ok_or(ConfigError::Missing("credentials.username"))?;
        let password = self
            .credentials
            .password
            .clone()
            .ok_or(ConfigError::Missing("credentials.password"))?;
        Ok(Credentials::new(username, password))
    }

    /// Validates the booking section into the run's immutable request.
    pub fn booking_request(&self, clock: &dyn Clock) -> Result<BookingRequest, ConfigError> {
        let booking = &self.booking;
        if booking.courts.is_empty() {
            return Err(ConfigError::Missing("booking.courts"));
        }
        let time: SlotTime = booking.time.parse().map_err(|e| ConfigError::Invalid {
            field: "booking.time",
            reason: format!("{e}"),
        })?;
        if booking.duration_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "booking.duration_minutes",
                reason: "must be positive".into(),
            });
        }
        let date = target_date(clock.today(), booking.days_ahead).ok_or(ConfigError::Invalid {
            field: "booking.days_ahead",
            reason: "target date out of range".into(),
        })?;

        Ok(BookingRequest {
            date,
            days_ahead: booking.days_ahead,
            resources: booking.courts.iter().copied().map(ResourceId::from).collect(),
            time,
            duration_minutes: booking.duration_minutes,
            players: booking.players.clone(),
        })
    }
}
