//! One booking run, end to end.

use crate::backend::Backend;
use crate::booking::{AttemptResult, BookingResolver};
use crate::capture::ArtifactSink;
use crate::config::{ConfigError, CourtsideConfig, DateRetry};
use crate::error::EngineError;
use crate::login::LoginController;
use crate::navigation::Navigator;
use crate::outcome::{Outcome, OutcomeTracker, Stage};
use crate::page::Page;
use crate::request::{BookingRequest, Credentials};
use crate::resolution::ElementResolver;
use crate::schedule::DateLabels;
use crate::selectors::{Role, RoleParams, SelectorTable};
use crate::wait::Deadline;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

/// What a run produced: the terminal outcome plus the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub attempts: Vec<AttemptResult>,
    pub history: Vec<(Stage, Outcome)>,
}

pub struct BookingRun<'a> {
    config: &'a CourtsideConfig,
    table: &'a SelectorTable,
    request: &'a BookingRequest,
    credentials: &'a Credentials,
    sink: &'a dyn ArtifactSink,
    base_url: Url,
    login_url: String,
}

impl<'a> BookingRun<'a> {
    pub fn new(
        config: &'a CourtsideConfig,
        table: &'a SelectorTable,
        request: &'a BookingRequest,
        credentials: &'a Credentials,
        sink: &'a dyn ArtifactSink,
    ) -> Result<Self, ConfigError> {
        let base_url = config.base_url()?;
        let login_url = base_url
            .join(&config.site.login_path)
            .map_err(|e| ConfigError::Invalid {
                field: "site.login_path",
                reason: e.to_string(),
            })?
            .to_string();
        Ok(Self {
            config,
            table,
            request,
            credentials,
            sink,
            base_url,
            login_url,
        })
    }

    /// Runs every stage against the backend. The backend is closed on every
    /// path, and exactly one outcome is produced.
    pub async fn execute<B: Backend + ?Sized>(&self, backend: &mut B) -> RunReport {
        let mut tracker = OutcomeTracker::new();
        let mut attempts = Vec::new();

        info!(
            date = %self.request.date,
            time = %self.request.time,
            courts = ?self.request.resources,
            "starting booking run"
        );

        match backend.launch().await {
            Ok(()) => {
                let mut page = Page::new(&mut *backend, self.sink);
                self.drive(&mut page, &mut tracker, &mut attempts).await;
            }
            Err(e) => {
                error!(error = %e, "backend failed to launch");
                tracker.record(Stage::Launch, Outcome::error(format!("Browser failed to start: {e}")));
            }
        }

        if let Err(e) = backend.close().await {
            warn!(error = %e, "failed to close backend");
        }

        let history = tracker.history().to_vec();
        let outcome = tracker.into_final();
        info!(state = %outcome.state, message = %outcome.message, "run finished");
        RunReport {
            outcome,
            attempts,
            history,
        }
    }

    async fn drive<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        tracker: &mut OutcomeTracker,
        attempts: &mut Vec<AttemptResult>,
    ) {
        let timing = &self.config.timing;
        let resolver = ElementResolver::new(self.table, timing.poll_interval())
            .with_highlight(self.config.debug.highlight);
        let login = LoginController::new(&resolver, timing, &self.login_url);
        let navigator = Navigator::new(
            &resolver,
            timing,
            &self.base_url,
            &self.config.site.booking_paths,
        );
        let booker = BookingResolver::new(&resolver, timing, &self.config.booking);
        let labels = DateLabels::new(self.request.date);

        if let Err(e) = login.login(page, self.credentials).await {
            self.escalate(page, tracker, Stage::Login, e).await;
            return;
        }

        if let Err(e) = navigator.open_booking_page(page).await {
            self.escalate(page, tracker, Stage::Navigation, e).await;
            return;
        }

        let date_attempts = timing.date_attempts.max(1);
        for attempt in 1..=date_attempts {
            match navigator
                .select_date(page, &labels, self.request.days_ahead)
                .await
            {
                Ok(selected) => {
                    info!(attempt, strategy = ?selected.strategy, date = %labels.day_tab, "date selected");
                    break;
                }
                Err(e) if e.is_hard() || attempt == date_attempts => {
                    self.escalate(page, tracker, Stage::DateSelection, e).await;
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, policy = ?self.config.policy.date_retry, "date selection failed, retrying");
                    page.capture(&format!("date_selection_failed_{attempt}")).await;
                    let recovered = match self.config.policy.date_retry {
                        DateRetry::DateOnly => navigator.open_booking_page(page).await,
                        DateRetry::FullSession => match login.login(page, self.credentials).await {
                            Ok(_) => navigator.open_booking_page(page).await,
                            Err(e) => Err(e),
                        },
                    };
                    if let Err(e) = recovered {
                        let stage = match e {
                            EngineError::LoginFailed { .. } => Stage::Login,
                            _ => Stage::Navigation,
                        };
                        self.escalate(page, tracker, stage, e).await;
                        return;
                    }
                }
            }
        }

        let report = booker.book(page, self.request).await;
        attempts.extend(report.attempts);
        let booked = report.outcome.is_success();
        if !booked {
            page.capture("booking_failure").await;
        }
        tracker.record(Stage::Booking, report.outcome.clone());

        if booked {
            self.check_late_alert(page, &resolver, tracker, &report.outcome)
                .await;
        }
    }

    /// A booking alert shortly after a confirmed booking downgrades it.
    async fn check_late_alert<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        resolver: &ElementResolver<'_>,
        tracker: &mut OutcomeTracker,
        booked: &Outcome,
    ) {
        let timing = &self.config.timing;
        let deadline = Deadline::after(timing.post_confirm(), timing.poll_interval());
        loop {
            match resolver
                .probe(page, Role::BookingAlert, &RoleParams::new())
                .await
            {
                Ok(Some(alert)) => {
                    warn!(alert = alert.text(), "booking alert after confirmation");
                    page.capture("post_confirmation_alert").await;
                    let mut downgraded = Outcome::failure(format!(
                        "Booking alert after confirmation: {}",
                        alert.text()
                    ));
                    downgraded.resource = booked.resource.clone();
                    downgraded.time = booked.time;
                    tracker.record(Stage::PostConfirmation, downgraded);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "post-confirmation check failed");
                    return;
                }
            }
            if !deadline.tick().await {
                return;
            }
        }
    }

    async fn escalate<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        tracker: &mut OutcomeTracker,
        stage: Stage,
        err: EngineError,
    ) {
        error!(%stage, error = %err, "stage failed");
        page.capture(&format!("{stage}_failure")).await;
        let outcome = if err.is_hard() {
            Outcome::error(format!("{stage}: {err}"))
        } else {
            Outcome::failure(format!("{stage}: {err}"))
        };
        tracker.record(stage, outcome);
    }
}
