use crate::backend::BackendError;
use crate::selectors::Role;
use courtside_common::protocol::{ElementInfo, Locator};
use thiserror::Error;

/// A live element found for a role.
///
/// Valid for one interaction only; after a page transition the probe
/// rejects the id as stale. Deliberately not `Clone`.
#[derive(Debug)]
pub struct ElementHandle {
    role: Role,
    locator: Locator,
    info: ElementInfo,
}

impl ElementHandle {
    pub(crate) fn new(role: Role, locator: Locator, info: ElementInfo) -> Self {
        Self {
            role,
            locator,
            info,
        }
    }

    pub fn id(&self) -> u32 {
        self.info.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The concrete locator that matched.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn text(&self) -> &str {
        &self.info.text
    }

    pub fn value(&self) -> Option<&str> {
        self.info.value.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.info.enabled
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no element for role '{role}' (tried {} locators)", .attempted.len())]
    NotFound { role: Role, attempted: Vec<Locator> },

    #[error("element for role '{role}' went stale again after re-resolution")]
    Stale { role: Role },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ResolveError {
    /// Hard failures mean the browser session itself is unusable.
    pub fn is_hard(&self) -> bool {
        matches!(self, ResolveError::Backend(e) if e.is_fatal())
    }
}

/// What to do with a resolved element.
#[derive(Clone, Copy)]
pub enum Interaction<'a> {
    Click,
    /// Replace the field's content with the text.
    Type(&'a str),
    SetValue(&'a str),
}

impl Interaction<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Click => "click",
            Interaction::Type(_) => "type",
            Interaction::SetValue(_) => "set_value",
        }
    }
}
