//! Booking resolver: first-fit over the resource preference list.
//!
//! A resource is tried end to end (slot, dialog, players, duration, confirm)
//! before moving to the next one. Clicking the confirm control is the commit
//! point: whatever the verification says, no other resource is tried after it.

use crate::backend::{Backend, BackendError};
use crate::config::TimingConfig;
use crate::config::schema::BookingConfig;
use crate::outcome::Outcome;
use crate::page::Page;
use crate::request::{BookingRequest, ResourceId};
use crate::resolution::{ElementResolver, Interaction, ResolveError};
use crate::schedule::day_tab_label;
use crate::selectors::{Role, RoleParams};
use crate::wait::{Deadline, settle};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    /// UI hiccup; the resource counts as unavailable.
    Transient,
    /// The site refused the booking after confirm.
    Rejected,
    /// Confirm was clicked but the result could not be established.
    Unverified,
    /// The browser session is gone.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptError {
    pub kind: AttemptErrorKind,
    pub detail: String,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

/// Audit record for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    pub resource: ResourceId,
    pub found: bool,
    pub slot_available: bool,
    /// The confirm control was clicked (commit point reached).
    pub committed: bool,
    pub confirmed: bool,
    pub error: Option<AttemptError>,
}

impl AttemptResult {
    fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            found: false,
            slot_available: false,
            committed: false,
            confirmed: false,
            error: None,
        }
    }

    /// Anything worse than "this resource was not available".
    pub fn is_hard_error(&self) -> bool {
        matches!(
            self.error.as_ref().map(|e| e.kind),
            Some(AttemptErrorKind::Unverified | AttemptErrorKind::Fatal)
        )
    }

    fn fail(&mut self, kind: AttemptErrorKind, detail: impl Into<String>) {
        self.error = Some(AttemptError {
            kind,
            detail: detail.into(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct BookingReport {
    pub outcome: Outcome,
    pub attempts: Vec<AttemptResult>,
}

/// Evidence read after the confirm click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationSignals {
    /// Text of a site alert, if one is shown.
    pub alert: Option<String>,
    pub success_marker: bool,
    /// Navigated to a confirmation URL.
    pub confirmation_url: bool,
    /// The confirm control disappeared.
    pub confirm_gone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Confirmed,
    Rejected(String),
    Unverified,
}

impl ConfirmationSignals {
    /// An alert always wins; otherwise any positive signal confirms.
    pub fn verdict(&self) -> Verdict {
        if let Some(alert) = &self.alert {
            return Verdict::Rejected(alert.clone());
        }
        if self.success_marker || self.confirmation_url || self.confirm_gone {
            Verdict::Confirmed
        } else {
            Verdict::Unverified
        }
    }
}

/// Why an attempt stopped before the commit point.
enum Abort {
    Transient(String),
    Fatal(String),
}

impl From<ResolveError> for Abort {
    fn from(err: ResolveError) -> Self {
        if err.is_hard() {
            Abort::Fatal(err.to_string())
        } else {
            Abort::Transient(err.to_string())
        }
    }
}

impl From<BackendError> for Abort {
    fn from(err: BackendError) -> Self {
        if err.is_fatal() {
            Abort::Fatal(err.to_string())
        } else {
            Abort::Transient(err.to_string())
        }
    }
}

pub struct BookingResolver<'a> {
    resolver: &'a ElementResolver<'a>,
    timing: &'a TimingConfig,
    settings: &'a BookingConfig,
}

impl<'a> BookingResolver<'a> {
    pub fn new(
        resolver: &'a ElementResolver<'a>,
        timing: &'a TimingConfig,
        settings: &'a BookingConfig,
    ) -> Self {
        Self {
            resolver,
            timing,
            settings,
        }
    }

    pub async fn book<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        request: &BookingRequest,
    ) -> BookingReport {
        let day = day_tab_label(request.date);
        let when = format!("{} on {}", request.time, day);
        let sweeps = self.settings.sweeps.max(1);
        let mut attempts: Vec<AttemptResult> = Vec::new();

        for sweep in 1..=sweeps {
            if sweep > 1 {
                info!(sweep, sweeps, "every court was unavailable, sweeping again");
                sleep(Duration::from_millis(self.settings.sweep_delay_ms)).await;
            }

            for resource in &request.resources {
                let attempt = self.try_resource(page, request, resource).await;
                info!(
                    court = %resource,
                    found = attempt.found,
                    available = attempt.slot_available,
                    confirmed = attempt.confirmed,
                    error = ?attempt.error,
                    "attempt finished"
                );
                let confirmed = attempt.confirmed;
                let committed = attempt.committed;
                let error = attempt.error.clone();
                attempts.push(attempt);

                if confirmed {
                    let outcome = Outcome::success(
                        resource.clone(),
                        request.time,
                        format!("Booked court {resource} at {when}"),
                    );
                    return BookingReport { outcome, attempts };
                }

                let outcome = match error {
                    Some(AttemptError {
                        kind: AttemptErrorKind::Fatal,
                        detail,
                    }) => Some(Outcome::error(format!(
                        "Booking aborted on court {resource}: {detail}"
                    ))),
                    Some(AttemptError {
                        kind: AttemptErrorKind::Rejected,
                        detail,
                    }) => Some(Outcome::failure(format!(
                        "Court {resource} at {when} was rejected: {detail}"
                    ))),
                    Some(AttemptError {
                        kind: AttemptErrorKind::Unverified,
                        detail,
                    }) => Some(Outcome::error(format!(
                        "Could not verify booking of court {resource} at {when}: {detail}"
                    ))),
                    _ if committed => Some(Outcome::error(format!(
                        "Booking state of court {resource} is unknown after confirm"
                    ))),
                    _ => None,
                };
                if let Some(outcome) = outcome {
                    return BookingReport { outcome, attempts };
                }
            }
        }

        let tried = request
            .resources
            .iter()
            .map(ResourceId::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let outcome = if attempts.iter().any(AttemptResult::is_hard_error) {
            Outcome::error(format!("Booking errors for courts {tried} at {when}"))
        } else {
            Outcome::no_availability(format!("No court available at {when} (tried {tried})"))
        };
        BookingReport { outcome, attempts }
    }

    async fn try_resource<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        request: &BookingRequest,
        resource: &ResourceId,
    ) -> AttemptResult {
        info!(court = %resource, time = %request.time, "trying court");
        let mut attempt = AttemptResult::new(resource.clone());

        match self.drive(page, request, &mut attempt).await {
            Ok(()) => {}
            Err(Abort::Transient(detail)) => {
                warn!(court = %resource, %detail, "court attempt failed, moving on");
                page.capture(&format!("attempt_failed_court_{resource}")).await;
                attempt.fail(AttemptErrorKind::Transient, detail);
                self.dismiss_dialog(page).await;
            }
            Err(Abort::Fatal(detail)) => {
                error!(court = %resource, %detail, "browser failure during booking");
                page.capture(&format!("attempt_error_court_{resource}")).await;
                attempt.fail(AttemptErrorKind::Fatal, detail);
            }
        }
        attempt
    }

    async fn drive<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        request: &BookingRequest,
        attempt: &mut AttemptResult,
    ) -> Result<(), Abort> {
        let params = RoleParams::new()
            .with("court", attempt.resource.as_str())
            .with_all("time", request.time.variants())
            .with("time_24h", request.time.as_24h());
        let timeout = self.timing.element_timeout();

        if let Some(label) = self.resolver.probe(page, Role::TimeLabel, &params).await?
            && let Err(e) = page.scroll_into_view(&label).await
        {
            if e.is_fatal() {
                return Err(e.into());
            }
            debug!(error = %e, "could not scroll time label into view");
        }

        let slot = match self.resolver.locate(page, Role::SlotCell, &params, timeout).await {
            Ok(slot) => slot,
            Err(ResolveError::NotFound { .. }) => {
                debug!(court = %attempt.resource, "no slot cell");
                return Err(Abort::Transient("slot not found".into()));
            }
            Err(e) => return Err(e.into()),
        };
        attempt.found = true;

        if !slot.is_enabled() {
            info!(court = %attempt.resource, "slot is disabled");
            return Ok(());
        }
        if let Some(marker) = self.unavailable_marker(slot.text()) {
            info!(court = %attempt.resource, marker, "slot is taken");
            return Ok(());
        }
        attempt.slot_available = true;
        page.capture(&format!("attempt_court_{}", attempt.resource))
            .await;

        self.resolver
            .perform(page, Role::SlotCell, &params, Interaction::Click, timeout)
            .await?;
        settle(self.timing.poll_interval()).await;

        match self
            .resolver
            .locate(page, Role::BookingDialog, &RoleParams::new(), self.timing.dialog_timeout())
            .await
        {
            Ok(_) => debug!("booking dialog open"),
            Err(ResolveError::NotFound { .. }) => {
                return Err(Abort::Transient("booking dialog did not open".into()));
            }
            Err(e) => return Err(e.into()),
        }

        self.fill_players(page, &request.players).await?;
        self.select_duration(page, request).await?;
        page.capture("pre_confirmation").await;

        let before = page.state(false).await?.url;
        match self
            .resolver
            .perform(page, Role::ConfirmButton, &RoleParams::new(), Interaction::Click, timeout)
            .await
        {
            Ok(()) => {}
            Err(ResolveError::NotFound { .. }) => {
                return Err(Abort::Transient("no confirm control in dialog".into()));
            }
            Err(e) => return Err(e.into()),
        }
        attempt.committed = true;
        info!(court = %attempt.resource, "confirm clicked");

        let signals = match self.await_confirmation(page, &before).await {
            Ok(signals) => signals,
            Err(e) if e.is_fatal() => return Err(Abort::Fatal(e.to_string())),
            Err(e) => {
                attempt.fail(AttemptErrorKind::Unverified, e.to_string());
                return Ok(());
            }
        };
        page.capture("post_confirmation").await;
        debug!(?signals, "confirmation signals");

        match signals.verdict() {
            Verdict::Confirmed => attempt.confirmed = true,
            Verdict::Rejected(alert) => {
                warn!(court = %attempt.resource, %alert, "site rejected the booking");
                attempt.fail(AttemptErrorKind::Rejected, alert);
            }
            Verdict::Unverified => {
                attempt.fail(
                    AttemptErrorKind::Unverified,
                    "page showed no result after confirm",
                );
            }
        }
        Ok(())
    }

    fn unavailable_marker(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.settings
            .unavailable_markers
            .iter()
            .map(String::as_str)
            .find(|m| !m.is_empty() && text.contains(&m.to_lowercase()))
    }

    async fn fill_players<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        players: &[String],
    ) -> Result<(), Abort> {
        let timeout = self.timing.element_timeout();
        for (i, name) in players.iter().enumerate() {
            if i > 0 {
                match self
                    .resolver
                    .perform(page, Role::AddPlayer, &RoleParams::new(), Interaction::Click, timeout)
                    .await
                {
                    Ok(()) => settle(self.timing.poll_interval()).await,
                    Err(ResolveError::NotFound { .. }) => {
                        return Err(Abort::Transient(format!(
                            "no 'Add Player' control for player {}",
                            i + 2
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            let label = format!("Player {}", i + 2);
            let params = RoleParams::new().with("player_label", label.as_str());
            match self
                .resolver
                .perform(page, Role::PlayerField, &params, Interaction::Type(name), timeout)
                .await
            {
                Ok(()) => debug!(field = %label, "player name typed"),
                Err(ResolveError::NotFound { .. }) => {
                    return Err(Abort::Transient(format!("no field for {label}")));
                }
                Err(e) => return Err(e.into()),
            }
            self.commit_autocomplete(page).await?;
        }
        Ok(())
    }

    /// Picks the first autocomplete suggestion, or falls back to the keyboard.
    async fn commit_autocomplete<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
    ) -> Result<(), Abort> {
        match self
            .resolver
            .perform(
                page,
                Role::AutocompleteOption,
                &RoleParams::new(),
                Interaction::Click,
                self.timing.settle(),
            )
            .await
        {
            Ok(()) => {
                debug!("autocomplete option chosen");
                return Ok(());
            }
            Err(e) if e.is_hard() => return Err(e.into()),
            Err(e) => debug!(error = %e, "no autocomplete option, using keyboard"),
        }
        for key in ["ArrowDown", "Enter"] {
            match page.press_key(key).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => debug!(key, error = %e, "key press unavailable"),
            }
        }
        Ok(())
    }

    async fn select_duration<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        request: &BookingRequest,
    ) -> Result<(), Abort> {
        let params = RoleParams::new()
            .with_all("duration", request.duration_labels())
            .with("duration_minutes", request.duration_minutes.to_string());
        match self
            .resolver
            .perform(page, Role::DurationOption, &params, Interaction::Click, self.timing.settle())
            .await
        {
            Ok(()) => debug!(minutes = request.duration_minutes, "duration selected"),
            Err(ResolveError::NotFound { .. }) => debug!("no duration control, keeping site default"),
            Err(e) if e.is_hard() => return Err(e.into()),
            Err(e) => warn!(error = %e, "could not select duration"),
        }
        Ok(())
    }

    async fn await_confirmation<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        url_before: &str,
    ) -> Result<ConfirmationSignals, BackendError> {
        let deadline = Deadline::after(self.timing.confirm_timeout(), self.timing.poll_interval());
        loop {
            let signals = self.read_confirmation(page, url_before).await?;
            if signals.alert.is_some() || signals.success_marker || signals.confirmation_url {
                return Ok(signals);
            }
            if signals.confirm_gone {
                // Give a late alert the settle window to appear.
                settle(self.timing.settle()).await;
                return self.read_confirmation(page, url_before).await;
            }
            if !deadline.tick().await {
                return Ok(signals);
            }
        }
    }

    async fn read_confirmation<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        url_before: &str,
    ) -> Result<ConfirmationSignals, BackendError> {
        let none = RoleParams::new();
        let alert = self
            .resolver
            .probe(page, Role::BookingAlert, &none)
            .await?
            .map(|a| a.text().to_string());
        let success_marker = self
            .resolver
            .probe(page, Role::BookingSuccess, &none)
            .await?
            .is_some();
        let url = page.state(false).await?.url;
        let confirm_gone = self
            .resolver
            .probe(page, Role::ConfirmButton, &none)
            .await?
            .is_none();
        Ok(ConfirmationSignals {
            alert,
            success_marker,
            confirmation_url: url != url_before && url.to_lowercase().contains("confirm"),
            confirm_gone,
        })
    }

    /// Best-effort close of an open booking dialog.
    async fn dismiss_dialog<B: Backend + ?Sized>(&self, page: &mut Page<'_, B>) {
        let none = RoleParams::new();
        if !matches!(
            self.resolver.probe(page, Role::BookingDialog, &none).await,
            Ok(Some(_))
        ) {
            return;
        }
        if let Err(e) = page.press_key("Escape").await {
            debug!(error = %e, "escape not delivered");
        }
        settle(self.timing.poll_interval()).await;
        if let Ok(Some(close)) = self.resolver.probe(page, Role::DialogClose, &none).await
            && let Err(e) = page.click(&close).await
        {
            debug!(error = %e, "dialog close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_beats_other_signals() {
        let signals = ConfirmationSignals {
            alert: Some("Court already booked".into()),
            success_marker: true,
            confirmation_url: true,
            confirm_gone: true,
        };
        assert_eq!(signals.verdict(), Verdict::Rejected("Court already booked".into()));
    }

    #[test]
    fn test_confirm_gone_without_alert_confirms() {
        let signals = ConfirmationSignals {
            confirm_gone: true,
            ..Default::default()
        };
        assert_eq!(signals.verdict(), Verdict::Confirmed);
        assert_eq!(ConfirmationSignals::default().verdict(), Verdict::Unverified);
    }

    #[test]
    fn test_hard_error_classification() {
        let mut attempt = AttemptResult::new(ResourceId::new("1"));
        assert!(!attempt.is_hard_error());
        attempt.fail(AttemptErrorKind::Transient, "slot not found");
        assert!(!attempt.is_hard_error());
        attempt.fail(AttemptErrorKind::Unverified, "?");
        assert!(attempt.is_hard_error());
    }
}
