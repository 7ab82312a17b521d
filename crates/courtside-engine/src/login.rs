//! Session/login controller.

use crate::backend::{Backend, BackendError};
use crate::config::TimingConfig;
use crate::error::{EngineError, StepError};
use crate::page::Page;
use crate::resolution::{ElementResolver, Interaction, ResolveError};
use crate::request::Credentials;
use crate::selectors::{Role, RoleParams};
use crate::wait::{Deadline, settle};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Page-state evidence read after a login submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginSignals {
    /// The password field is no longer on the page.
    pub form_gone: bool,
    /// A logout link or account menu is visible.
    pub auth_marker: bool,
    /// The browser left the login URL.
    pub url_changed: bool,
    /// The site shows a login error.
    pub error_banner: bool,
}

impl LoginSignals {
    /// Logged in iff some positive signal and no error banner.
    pub fn is_logged_in(&self) -> bool {
        !self.error_banner && (self.form_gone || self.auth_marker || self.url_changed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedIn {
    /// Attempt that succeeded, starting at 1.
    pub attempt: u32,
}

pub struct LoginController<'a> {
    resolver: &'a ElementResolver<'a>,
    timing: &'a TimingConfig,
    login_url: &'a str,
}

impl<'a> LoginController<'a> {
    pub fn new(
        resolver: &'a ElementResolver<'a>,
        timing: &'a TimingConfig,
        login_url: &'a str,
    ) -> Self {
        Self {
            resolver,
            timing,
            login_url,
        }
    }

    /// Logs in with bounded retries. Elements are resolved fresh each attempt.
    pub async fn login<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        credentials: &Credentials,
    ) -> Result<LoggedIn, EngineError> {
        let max_attempts = self.timing.login_attempts.max(1);

        for attempt in 1..=max_attempts {
            info!(attempt, max_attempts, "login attempt");
            match self.attempt(page, credentials, attempt).await {
                Ok(true) => {
                    info!(attempt, "logged in");
                    page.capture("login_success").await;
                    return Ok(LoggedIn { attempt });
                }
                Ok(false) => warn!(attempt, "login not confirmed"),
                Err(StepError::Recoverable(reason)) => {
                    warn!(attempt, %reason, "login attempt failed");
                    page.capture(&format!("login_error_{attempt}")).await;
                }
                Err(StepError::Fatal(e)) => {
                    page.capture("login_failure").await;
                    return Err(e);
                }
            }

            if attempt < max_attempts {
                let backoff = self.timing.login_backoff() * attempt;
                debug!(?backoff, "backing off before next login attempt");
                sleep(backoff).await;
            }
        }

        page.capture("login_failure").await;
        Err(EngineError::LoginFailed {
            attempts: max_attempts,
        })
    }

    async fn attempt<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        credentials: &Credentials,
        attempt: u32,
    ) -> Result<bool, StepError> {
        let none = RoleParams::new();
        page.goto(self.login_url).await?;
        settle(self.timing.settle()).await;
        page.capture(&format!("login_attempt_{attempt}")).await;

        // Form absence before submitting proves nothing; only positive markers count.
        let before = LoginSignals {
            form_gone: false,
            ..self.signals(page).await?
        };
        if before.is_logged_in() {
            info!("session already authenticated");
            return Ok(true);
        }

        self.find_form(page).await?;

        let timeout = self.timing.element_timeout();
        self.resolver
            .perform(
                page,
                Role::Username,
                &none,
                Interaction::Type(&credentials.username),
                timeout,
            )
            .await?;
        self.resolver
            .perform(
                page,
                Role::Password,
                &none,
                Interaction::Type(credentials.password()),
                timeout,
            )
            .await?;
        page.capture(&format!("login_filled_{attempt}")).await;

        match self
            .resolver
            .perform(page, Role::LoginSubmit, &none, Interaction::Click, timeout)
            .await
        {
            Ok(()) => debug!("clicked submit"),
            Err(ResolveError::NotFound { .. }) => {
                debug!("no submit control, pressing Enter in the password field");
                page.press_key("Enter").await?;
            }
            Err(e) => return Err(e.into()),
        }

        let deadline = Deadline::after(self.timing.login_verify(), self.timing.poll_interval());
        loop {
            let signals = self.signals(page).await?;
            if signals.is_logged_in() {
                debug!(?signals, "login verified");
                return Ok(true);
            }
            if signals.error_banner {
                return Err(StepError::Recoverable("site reported a login error".into()));
            }
            if !deadline.tick().await {
                debug!(?signals, "login verification timed out");
                return Ok(false);
            }
        }
    }

    /// Waits for the username field, following a login link once if needed.
    async fn find_form<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
    ) -> Result<(), StepError> {
        let none = RoleParams::new();
        let timeout = self.timing.element_timeout();
        match self
            .resolver
            .resolve(page, Role::Username, &none, timeout)
            .await
        {
            Ok(_) => return Ok(()),
            Err(ResolveError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        page.capture("login_missing_elements").await;
        let Some(link) = self.resolver.probe(page, Role::LoginLink, &none).await? else {
            return Err(StepError::Recoverable("login form not found".into()));
        };
        info!(text = link.text(), "following login link");
        page.click(&link).await?;
        settle(self.timing.settle()).await;

        self.resolver
            .resolve(page, Role::Username, &none, timeout)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ResolveError::NotFound { .. } => {
                    StepError::Recoverable("login form not found after following link".into())
                }
                other => other.into(),
            })
    }

    async fn signals<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
    ) -> Result<LoginSignals, BackendError> {
        let none = RoleParams::new();
        let url = page.state(false).await?.url;
        let form_gone = self
            .resolver
            .probe(page, Role::Password, &none)
            .await?
            .is_none();
        let auth_marker = self
            .resolver
            .probe(page, Role::AuthMarker, &none)
            .await?
            .is_some();
        let error_banner = match self.resolver.probe(page, Role::LoginError, &none).await? {
            Some(banner) => {
                warn!(text = banner.text(), "login error shown");
                true
            }
            None => false,
        };
        Ok(LoginSignals {
            form_gone,
            auth_marker,
            url_changed: left_login_page(&url, self.login_url),
            error_banner,
        })
    }
}

fn left_login_page(current: &str, login_url: &str) -> bool {
    let current = current.trim_end_matches('/');
    !current.is_empty()
        && current != login_url.trim_end_matches('/')
        && !current.to_ascii_lowercase().contains("login")
        && !current.starts_with("about:")
}
