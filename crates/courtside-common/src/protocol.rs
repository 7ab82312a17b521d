use crate::error::BackendError;
use crate::error_mapping::map_probe_error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a locator query string is interpreted by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// CSS selector, evaluated with `querySelectorAll`.
    Css,
    /// `name=value` attribute match, e.g. `data-court=3`.
    Attribute,
    /// Case-insensitive visible-text containment, innermost match wins.
    Text,
    /// Structural path (XPath 1.0).
    Xpath,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Css => "css",
            Strategy::Attribute => "attribute",
            Strategy::Text => "text",
            Strategy::Xpath => "xpath",
        }
    }
}

/// A concrete query the probe can run against the live document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub query: String,
}

impl Locator {
    pub fn new(strategy: Strategy, query: impl Into<String>) -> Self {
        Self {
            strategy,
            query: query.into(),
        }
    }

    pub fn css(query: impl Into<String>) -> Self {
        Self::new(Strategy::Css, query)
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(Strategy::Xpath, query)
    }

    pub fn text(query: impl Into<String>) -> Self {
        Self::new(Strategy::Text, query)
    }

    pub fn attribute(query: impl Into<String>) -> Self {
        Self::new(Strategy::Attribute, query)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.query)
    }
}

/// Actions executed by the injected probe script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProbeAction {
    Query(QueryRequest),
    Click(ElementRequest),
    Type(TypeRequest),
    SetValue(SetValueRequest),
    ScrollIntoView(ElementRequest),
    Mark(ElementRequest),
    Read(ElementRequest),
    Page(PageRequest),
}

impl ProbeAction {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeAction::Query(_) => "query",
            ProbeAction::Click(_) => "click",
            ProbeAction::Type(_) => "type",
            ProbeAction::SetValue(_) => "set_value",
            ProbeAction::ScrollIntoView(_) => "scroll_into_view",
            ProbeAction::Mark(_) => "mark",
            ProbeAction::Read(_) => "read",
            ProbeAction::Page(_) => "page",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRequest {
    pub id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRequest {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub clear: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetValueRequest {
    pub id: u32,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageRequest {
    #[serde(default)]
    pub include_text: bool,
}

/// Response envelope returned by `window.__courtside.process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeResponse {
    Ok {
        data: ProbeData,
    },
    Error {
        code: String,
        message: String,
        #[serde(default)]
        details: Option<serde_json::Value>,
    },
}

impl ProbeResponse {
    pub fn ok(data: ProbeData) -> Self {
        ProbeResponse::Ok { data }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProbeResponse::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Converts an error envelope into the matching `BackendError`.
    pub fn into_data(self) -> Result<ProbeData, BackendError> {
        match self {
            ProbeResponse::Ok { data } => Ok(data),
            ProbeResponse::Error {
                code,
                message,
                details,
            } => Err(map_probe_error(&code, &message, details.as_ref())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeData {
    Query {
        elements: Vec<ElementInfo>,
    },
    Action {
        #[serde(default)]
        message: Option<String>,
    },
    Read {
        text: String,
        #[serde(default)]
        value: Option<String>,
    },
    Page(PageState),
}

/// One element matched by a query, already registered under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: u32,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    #[serde(default)]
    pub value: Option<String>,
}

impl ElementInfo {
    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ready_state: String,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16, // generic status code (e.g. 200)
}
