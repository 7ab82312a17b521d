use crate::cdp::{CdpClient, LaunchOptions};
use crate::inject::{ProbeCallError, call_probe};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use courtside_engine::backend::{Backend, BackendError, NavigationResult};
use courtside_engine::protocol::{ProbeAction, ProbeResponse};
use tracing::info;

pub struct HeadlessBackend {
    client: Option<CdpClient>,
    options: LaunchOptions,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_options(LaunchOptions::default())
    }

    pub fn with_options(options: LaunchOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, BackendError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }
}

/// CDP key description for the named keys the engine sends.
struct KeySpec {
    key: &'static str,
    code: &'static str,
    key_code: i64,
    text: Option<&'static str>,
}

fn key_spec(key: &str) -> Option<KeySpec> {
    let spec = match key {
        "Enter" => KeySpec {
            key: "Enter",
            code: "Enter",
            key_code: 13,
            text: Some("\r"),
        },
        "ArrowDown" => KeySpec {
            key: "ArrowDown",
            code: "ArrowDown",
            key_code: 40,
            text: None,
        },
        "ArrowUp" => KeySpec {
            key: "ArrowUp",
            code: "ArrowUp",
            key_code: 38,
            text: None,
        },
        "Escape" => KeySpec {
            key: "Escape",
            code: "Escape",
            key_code: 27,
            text: None,
        },
        "Tab" => KeySpec {
            key: "Tab",
            code: "Tab",
            key_code: 9,
            text: None,
        },
        _ => return None,
    };
    Some(spec)
}

fn key_event(
    kind: DispatchKeyEventType,
    spec: &KeySpec,
) -> Result<DispatchKeyEventParams, BackendError> {
    let mut builder = DispatchKeyEventParams::builder()
        .r#type(kind.clone())
        .key(spec.key)
        .code(spec.code)
        .windows_virtual_key_code(spec.key_code)
        .native_virtual_key_code(spec.key_code);
    if let Some(text) = spec.text
        && kind == DispatchKeyEventType::KeyDown
    {
        builder = builder.text(text);
    }
    builder
        .build()
        .map_err(|e| BackendError::Other(format!("Failed to build key event: {:?}", e)))
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching Headless Backend (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;

        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;

        Self::get_navigation_result(&client.page).await
    }

    async fn execute_probe(&mut self, action: ProbeAction) -> Result<ProbeResponse, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;

        let value = serde_json::to_value(&action)?;
        let result_value = call_probe(&client.page, &value)
            .await
            .map_err(|e| match e {
                ProbeCallError::Timeout => BackendError::Timeout {
                    operation: "probe call".into(),
                },
                ProbeCallError::Failed(msg) => BackendError::Probe(msg),
            })?;

        let response: ProbeResponse = serde_json::from_value(result_value)?;
        Ok(response)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client.as_ref().ok_or(BackendError::NotReady)?;
        let bytes = client
            .page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))?;

        Ok(bytes)
    }

    async fn page_source(&mut self) -> Result<String, BackendError> {
        let client = self.client.as_ref().ok_or(BackendError::NotReady)?;
        client
            .page
            .content()
            .await
            .map_err(|e| BackendError::Other(format!("Reading page source failed: {}", e)))
    }

    async fn refresh(&mut self) -> Result<NavigationResult, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        client
            .page
            .reload()
            .await
            .map_err(|e| BackendError::Navigation(format!("refresh failed: {}", e)))?;
        Self::get_navigation_result(&client.page).await
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        let spec = key_spec(key).ok_or_else(|| BackendError::NotSupported(format!("key '{key}'")))?;

        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = key_event(kind, &spec)?;
            client
                .page
                .execute(event)
                .await
                .map_err(|e| BackendError::Other(format!("press_key {} failed: {}", key, e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_keys_are_mapped() {
        for key in ["Enter", "ArrowDown", "Escape"] {
            assert!(key_spec(key).is_some(), "{key}");
        }
        assert!(key_spec("F13").is_none());
    }

    #[test]
    fn test_enter_carries_text_on_key_down_only() {
        let spec = key_spec("Enter").unwrap();
        let down = key_event(DispatchKeyEventType::KeyDown, &spec).unwrap();
        let up = key_event(DispatchKeyEventType::KeyUp, &spec).unwrap();
        assert_eq!(down.text.as_deref(), Some("\r"));
        assert!(up.text.is_none());
    }
}
