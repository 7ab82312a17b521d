//! Navigation to the booking surface and target-date selection.

use crate::backend::Backend;
use crate::config::TimingConfig;
use crate::error::{EngineError, StepError};
use crate::page::Page;
use crate::resolution::{ElementResolver, Interaction, ResolveError};
use crate::schedule::DateLabels;
use crate::selectors::{Role, RoleParams};
use crate::wait::{Deadline, settle};
use courtside_common::protocol::PageState;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Which date strategy moved the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStrategy {
    DayTab,
    DateInput,
    TextInput,
    Picker,
    NextDay,
    /// Nothing to do: the target is today and no control was found.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSelected {
    pub strategy: DateStrategy,
}

pub struct Navigator<'a> {
    resolver: &'a ElementResolver<'a>,
    timing: &'a TimingConfig,
    base_url: &'a Url,
    booking_paths: &'a [String],
}

impl<'a> Navigator<'a> {
    pub fn new(
        resolver: &'a ElementResolver<'a>,
        timing: &'a TimingConfig,
        base_url: &'a Url,
        booking_paths: &'a [String],
    ) -> Self {
        Self {
            resolver,
            timing,
            base_url,
            booking_paths,
        }
    }

    /// Reaches the booking grid: dashboard shortcut, direct paths, then the
    /// booking navigation link.
    pub async fn open_booking_page<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
    ) -> Result<(), EngineError> {
        let none = RoleParams::new();

        match self.resolver.probe(page, Role::DashboardLink, &none).await {
            Ok(Some(link)) => {
                debug!("clicking dashboard shortcut");
                match page.click(&link).await {
                    Ok(()) => settle(self.timing.settle()).await,
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => debug!(error = %e, "dashboard shortcut failed"),
                }
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => debug!(error = %e, "dashboard probe failed"),
        }

        let origin = self.read_state(page, false).await?.url;
        if !self.try_direct_paths(page).await? {
            info!("no direct booking path worked, using site navigation");
            if self.read_state(page, false).await?.url != origin {
                page.goto(&origin).await.map_err(|e| {
                    if e.is_fatal() {
                        e.into()
                    } else {
                        EngineError::NavigationFailed(format!("could not return to {origin}: {e}"))
                    }
                })?;
                settle(self.timing.settle()).await;
            }
            self.resolver
                .perform(
                    page,
                    Role::BookingNav,
                    &none,
                    Interaction::Click,
                    self.timing.element_timeout(),
                )
                .await
                .map_err(|e| match e {
                    ResolveError::NotFound { .. } => {
                        EngineError::NavigationFailed("no booking link on the page".into())
                    }
                    other => other.into(),
                })?;
            settle(self.timing.settle()).await;
        }

        match self
            .resolver
            .locate(page, Role::BookingGrid, &none, self.timing.element_timeout())
            .await
        {
            Ok(_) => info!("booking grid visible"),
            Err(ResolveError::NotFound { .. }) => {
                warn!("booking grid not recognized, continuing anyway")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn try_direct_paths<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
    ) -> Result<bool, EngineError> {
        for path in self.booking_paths {
            let url = match self.base_url.join(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!(path, error = %e, "skipping malformed booking path");
                    continue;
                }
            };
            match page.goto(url.as_str()).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    debug!(%url, error = %e, "booking path failed to load");
                    continue;
                }
            }
            settle(self.timing.settle()).await;
            let state = self.read_state(page, true).await?;
            if is_not_found_page(&state) {
                debug!(%url, "booking path is a 404 page");
                continue;
            }
            info!(%url, "opened booking page");
            return Ok(true);
        }
        Ok(false)
    }

    /// Page state, polling through soft failures while a document loads.
    async fn read_state<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        include_text: bool,
    ) -> Result<PageState, EngineError> {
        let deadline = Deadline::after(self.timing.element_timeout(), self.timing.poll_interval());
        loop {
            match page.state(include_text).await {
                Ok(state) => return Ok(state),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    debug!(error = %e, "page state unavailable, retrying");
                    if !deadline.tick().await {
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Moves the grid to the target date and verifies it.
    pub async fn select_date<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        labels: &DateLabels,
        days_ahead: u32,
    ) -> Result<DateSelected, EngineError> {
        let strategy = match self.apply_strategies(page, labels, days_ahead).await {
            Ok(strategy) => strategy,
            Err(StepError::Fatal(e)) => return Err(e),
            Err(StepError::Recoverable(reason)) => {
                return Err(EngineError::DateSelectionFailed {
                    target: labels.day_tab.clone(),
                    reason,
                });
            }
        };
        info!(?strategy, date = %labels.iso, "date control used");
        settle(self.timing.settle()).await;
        page.capture("date_selected").await;

        self.verify(page, labels, strategy).await?;
        Ok(DateSelected { strategy })
    }

    /// Budget for probing one date strategy that may not exist on the site.
    fn strategy_timeout(&self) -> Duration {
        self.timing.element_timeout() / 5
    }

    async fn apply_strategies<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        labels: &DateLabels,
        days_ahead: u32,
    ) -> Result<DateStrategy, StepError> {
        let timeout = self.strategy_timeout();
        let params = date_params(labels);

        if attempt(self.resolver.perform(page, Role::DayTab, &params, Interaction::Click, timeout).await)? {
            return Ok(DateStrategy::DayTab);
        }

        if attempt(
            self.resolver
                .perform(page, Role::DateInput, &params, Interaction::SetValue(&labels.iso), timeout)
                .await,
        )? {
            return Ok(DateStrategy::DateInput);
        }

        if attempt(
            self.resolver
                .perform(page, Role::DateTextInput, &params, Interaction::Type(&labels.iso), timeout)
                .await,
        )? {
            if let Err(e) = page.press_key("Enter").await {
                if e.is_fatal() {
                    return Err(e.into());
                }
                debug!(error = %e, "could not press Enter in date field");
            }
            return Ok(DateStrategy::TextInput);
        }

        if attempt(
            self.resolver
                .perform(page, Role::DatePickerOpener, &params, Interaction::Click, timeout)
                .await,
        )? {
            settle(self.timing.poll_interval()).await;
            if attempt(
                self.resolver
                    .perform(page, Role::DateCell, &params, Interaction::Click, timeout)
                    .await,
            )? {
                return Ok(DateStrategy::Picker);
            }
            debug!("date picker opened but no matching cell");
        }

        if days_ahead == 0 {
            return Ok(DateStrategy::Unchanged);
        }
        for step in 0..days_ahead {
            let clicked = attempt(
                self.resolver
                    .perform(page, Role::NextDay, &params, Interaction::Click, timeout)
                    .await,
            )?;
            if !clicked {
                return Err(StepError::Recoverable(if step == 0 {
                    "no date control found".to_string()
                } else {
                    format!("next-day control vanished after {step} clicks")
                }));
            }
            settle(self.timing.poll_interval()).await;
        }
        Ok(DateStrategy::NextDay)
    }

    async fn verify<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        labels: &DateLabels,
        strategy: DateStrategy,
    ) -> Result<(), EngineError> {
        let none = RoleParams::new();
        // A day tab carries the target label itself, so the page text only
        // confirms the date when the label shows up somewhere else too.
        let needed = if strategy == DateStrategy::DayTab { 2 } else { 1 };
        let deadline = Deadline::after(self.timing.settle(), self.timing.poll_interval());
        let mut seen = String::new();
        loop {
            match self.resolver.probe(page, Role::SelectedDate, &none).await {
                Ok(Some(shown)) => {
                    let value = shown.value().unwrap_or_default();
                    if labels.matches(shown.text()) || labels.matches(value) {
                        debug!(shown = shown.text(), "selected date verified");
                        return Ok(());
                    }
                    seen = format!("{} {}", shown.text(), value).trim().to_string();
                }
                Ok(None) => match page.state(true).await {
                    Ok(state) => {
                        if count_ci(&state.text, &labels.day_tab) >= needed
                            || contains_ci(&state.text, &labels.long)
                        {
                            debug!("selected date verified from page text");
                            return Ok(());
                        }
                        seen = "no selected-date indicator".to_string();
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => debug!(error = %e, "page text unavailable"),
                },
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => debug!(error = %e, "selected date probe failed"),
            }
            if !deadline.tick().await {
                break;
            }
        }
        page.capture("date_mismatch").await;
        Err(EngineError::DateSelectionFailed {
            target: labels.day_tab.clone(),
            reason: format!("grid shows '{seen}'"),
        })
    }
}

/// `Ok(true)` when the interaction happened, `Ok(false)` when the role is
/// not on this page.
fn attempt(result: Result<(), ResolveError>) -> Result<bool, StepError> {
    match result {
        Ok(()) => Ok(true),
        Err(ResolveError::NotFound { role, .. }) => {
            debug!(%role, "date strategy not available");
            Ok(false)
        }
        Err(e) if e.is_hard() => Err(e.into()),
        Err(e) => {
            debug!(error = %e, "date strategy failed");
            Ok(false)
        }
    }
}

fn date_params(labels: &DateLabels) -> RoleParams {
    RoleParams::new()
        .with("day_label", labels.day_tab.clone())
        .with("date", labels.iso.clone())
        .with("long_date", labels.long.clone())
        .with("day", labels.date.format("%-d").to_string())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    count_ci(haystack, needle) > 0
}

fn count_ci(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.to_lowercase().matches(&needle.to_lowercase()).count()
}

/// Heuristic for a soft 404: the title or body says so.
pub fn is_not_found_page(state: &PageState) -> bool {
    let title = state.title.to_lowercase();
    if title.contains("404") || title.contains("not found") {
        return true;
    }
    let text = state.text.to_lowercase();
    text.contains("page not found") || (text.contains("404") && text.contains("not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(title: &str, text: &str) -> PageState {
        PageState {
            url: "https://club.test/x".into(),
            title: title.into(),
            text: text.into(),
            ready_state: "complete".into(),
        }
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found_page(&state("404 - Missing", "")));
        assert!(is_not_found_page(&state("Club", "Sorry, page not found")));
        assert!(is_not_found_page(&state("Club", "Error 404: the resource was not found")));
        assert!(!is_not_found_page(&state("Court Bookings", "Court 1 Court 2 Book 6:00 pm")));
    }

    #[test]
    fn test_label_counting_ignores_case() {
        assert_eq!(count_ci("Mon 5th | Bookings for MON 5TH", "mon 5th"), 2);
        assert_eq!(count_ci("Sun 4th Mon 5th", "Tue 6th"), 0);
        assert!(!contains_ci("anything", ""));
    }
}
