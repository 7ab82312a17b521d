//! Page adapter.
//!
//! Wraps a `Backend` and translates element-level calls into probe actions.
//! Every stage of the workflow talks to the browser through this type.

use crate::backend::{Backend, BackendError, NavigationResult};
use crate::capture::{Artifact, ArtifactSink};
use crate::resolution::ElementHandle;
use courtside_common::protocol::{
    ElementInfo, ElementRequest, Locator, PageRequest, PageState, ProbeAction, ProbeData,
    QueryRequest, SetValueRequest, TypeRequest,
};
use tracing::debug;

pub struct Page<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    sink: &'a dyn ArtifactSink,
}

impl<'a, B: Backend + ?Sized> Page<'a, B> {
    pub fn new(backend: &'a mut B, sink: &'a dyn ArtifactSink) -> Self {
        Self { backend, sink }
    }

    pub async fn goto(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        debug!(url, "navigating");
        self.backend.navigate(url).await
    }

    pub async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        self.backend.press_key(key).await
    }

    /// Runs a locator and returns every match, in document order.
    pub async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementInfo>, BackendError> {
        let action = ProbeAction::Query(QueryRequest {
            locator: locator.clone(),
            limit: None,
        });
        match self.run(action).await? {
            ProbeData::Query { elements } => Ok(elements),
            other => Err(unexpected("query", &other)),
        }
    }

    pub async fn click(&mut self, handle: &ElementHandle) -> Result<(), BackendError> {
        self.act(ProbeAction::Click(ElementRequest { id: handle.id() }))
            .await
    }

    pub async fn type_text(
        &mut self,
        handle: &ElementHandle,
        text: &str,
        clear: bool,
    ) -> Result<(), BackendError> {
        self.act(ProbeAction::Type(TypeRequest {
            id: handle.id(),
            text: text.to_string(),
            clear,
        }))
        .await
    }

    pub async fn set_value(
        &mut self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<(), BackendError> {
        self.act(ProbeAction::SetValue(SetValueRequest {
            id: handle.id(),
            value: value.to_string(),
        }))
        .await
    }

    pub async fn scroll_into_view(&mut self, handle: &ElementHandle) -> Result<(), BackendError> {
        self.act(ProbeAction::ScrollIntoView(ElementRequest { id: handle.id() }))
            .await
    }

    pub async fn mark(&mut self, handle: &ElementHandle) -> Result<(), BackendError> {
        self.act(ProbeAction::Mark(ElementRequest { id: handle.id() }))
            .await
    }

    /// Current text and value of an element.
    pub async fn read(
        &mut self,
        handle: &ElementHandle,
    ) -> Result<(String, Option<String>), BackendError> {
        match self
            .run(ProbeAction::Read(ElementRequest { id: handle.id() }))
            .await?
        {
            ProbeData::Read { text, value } => Ok((text, value)),
            other => Err(unexpected("read", &other)),
        }
    }

    pub async fn state(&mut self, include_text: bool) -> Result<PageState, BackendError> {
        match self
            .run(ProbeAction::Page(PageRequest { include_text }))
            .await?
        {
            ProbeData::Page(state) => Ok(state),
            other => Err(unexpected("page", &other)),
        }
    }

    /// Hands a screenshot and the page source to the artifact sink.
    ///
    /// Failures are logged and swallowed; a capture never changes the run.
    pub async fn capture(&mut self, tag: &str) {
        let screenshot = match self.backend.screenshot().await {
            Ok(png) => Some(png),
            Err(e) => {
                debug!(tag, error = %e, "screenshot unavailable");
                None
            }
        };
        let html = match self.backend.page_source().await {
            Ok(html) => Some(html),
            Err(e) => {
                debug!(tag, error = %e, "page source unavailable");
                None
            }
        };
        if let Err(e) = self.sink.store(tag, Artifact { screenshot, html }).await {
            debug!(tag, error = %e, "failed to store debug artifact");
        }
    }

    async fn act(&mut self, action: ProbeAction) -> Result<(), BackendError> {
        self.run(action).await.map(|_| ())
    }

    async fn run(&mut self, action: ProbeAction) -> Result<ProbeData, BackendError> {
        self.backend.execute_probe(action).await?.into_data()
    }
}

fn unexpected(action: &str, data: &ProbeData) -> BackendError {
    BackendError::Probe(format!("unexpected response to '{action}': {data:?}"))
}
