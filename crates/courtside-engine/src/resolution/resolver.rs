use super::result::{ElementHandle, Interaction, ResolveError};
use crate::backend::{Backend, BackendError};
use crate::page::Page;
use crate::selectors::{Role, RoleParams, SelectorTable};
use crate::wait::Deadline;
use courtside_common::protocol::{ElementInfo, Locator};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    /// Visible and enabled.
    Interactable,
    /// Visible, enabled or not.
    Visible,
}

impl Want {
    fn accepts(self, info: &ElementInfo) -> bool {
        match self {
            Want::Interactable => info.is_interactable(),
            Want::Visible => info.visible,
        }
    }
}

/// Finds elements for roles by walking the selector table in priority order.
pub struct ElementResolver<'t> {
    table: &'t SelectorTable,
    poll_interval: Duration,
    highlight: bool,
}

impl<'t> ElementResolver<'t> {
    pub fn new(table: &'t SelectorTable, poll_interval: Duration) -> Self {
        Self {
            table,
            poll_interval,
            highlight: false,
        }
    }

    /// Outline every found element in the page (debug mode).
    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    /// First visible and enabled match for the role.
    pub async fn resolve<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        params: &RoleParams,
        timeout: Duration,
    ) -> Result<ElementHandle, ResolveError> {
        self.find(page, role, params, timeout, Want::Interactable)
            .await
    }

    /// First visible match for the role, enabled or not.
    pub async fn locate<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        params: &RoleParams,
        timeout: Duration,
    ) -> Result<ElementHandle, ResolveError> {
        self.find(page, role, params, timeout, Want::Visible).await
    }

    /// One sweep, no waiting. `None` when nothing visible matches right now.
    pub async fn probe<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        params: &RoleParams,
    ) -> Result<Option<ElementHandle>, BackendError> {
        match self.find(page, role, params, Duration::ZERO, Want::Visible).await {
            Ok(handle) => Ok(Some(handle)),
            Err(ResolveError::NotFound { .. }) | Err(ResolveError::Stale { .. }) => Ok(None),
            Err(ResolveError::Backend(e)) => Err(e),
        }
    }

    /// Resolves the role and applies the interaction.
    ///
    /// A stale element gets exactly one re-resolution.
    pub async fn perform<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        params: &RoleParams,
        interaction: Interaction<'_>,
        timeout: Duration,
    ) -> Result<(), ResolveError> {
        let handle = self.resolve(page, role, params, timeout).await?;
        match apply(page, &handle, interaction).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_stale() => {
                warn!(%role, action = interaction.name(), "element went stale, resolving again");
            }
            Err(e) => return Err(e.into()),
        }

        let handle = self.resolve(page, role, params, timeout).await?;
        match apply(page, &handle, interaction).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_stale() => Err(ResolveError::Stale { role }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        params: &RoleParams,
        timeout: Duration,
        want: Want,
    ) -> Result<ElementHandle, ResolveError> {
        let locators = self.table.expand(role, params);
        if locators.is_empty() {
            debug!(%role, "no candidates");
            return Err(ResolveError::NotFound {
                role,
                attempted: locators,
            });
        }

        // Immediate sweep so an element already on the page is found without
        // waiting out the budgets of earlier candidates.
        for locator in &locators {
            if let Some(handle) = self.try_locator(page, role, locator, want).await? {
                return self.found(page, handle).await;
            }
        }

        if !timeout.is_zero() {
            let per_candidate = timeout / locators.len() as u32;
            for locator in &locators {
                let deadline = Deadline::after(per_candidate, self.poll_interval);
                while deadline.tick().await {
                    if let Some(handle) = self.try_locator(page, role, locator, want).await? {
                        return self.found(page, handle).await;
                    }
                }
            }
        }

        debug!(%role, tried = locators.len(), "role not found");
        Err(ResolveError::NotFound {
            role,
            attempted: locators,
        })
    }

    async fn try_locator<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        role: Role,
        locator: &Locator,
        want: Want,
    ) -> Result<Option<ElementHandle>, ResolveError> {
        match page.query(locator).await {
            Ok(elements) => {
                let hit = elements.into_iter().find(|e| want.accepts(e));
                if hit.is_some() {
                    debug!(%role, %locator, "matched");
                }
                Ok(hit.map(|info| ElementHandle::new(role, locator.clone(), info)))
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                debug!(%role, %locator, error = %e, "candidate failed");
                Ok(None)
            }
        }
    }

    async fn found<B: Backend + ?Sized>(
        &self,
        page: &mut Page<'_, B>,
        handle: ElementHandle,
    ) -> Result<ElementHandle, ResolveError> {
        if self.highlight
            && let Err(e) = page.mark(&handle).await
        {
            debug!(error = %e, "highlight failed");
        }
        Ok(handle)
    }
}

async fn apply<B: Backend + ?Sized>(
    page: &mut Page<'_, B>,
    handle: &ElementHandle,
    interaction: Interaction<'_>,
) -> Result<(), BackendError> {
    match interaction {
        Interaction::Click => page.click(handle).await,
        Interaction::Type(text) => page.type_text(handle, text, true).await,
        Interaction::SetValue(value) => page.set_value(handle, value).await,
    }
}
