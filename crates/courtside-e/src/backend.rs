use crate::webdriver::{WebDriverClient, browser_capabilities};
use async_trait::async_trait;
use courtside_engine::backend::{Backend, BackendError, NavigationResult};
use courtside_engine::protocol::{ProbeAction, ProbeData, ProbeResponse};
use courtside_probe::PROBE_JS;
use fantoccini::key::Key;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const PROBE_ATTEMPTS: u32 = 3;

pub struct EmbeddedBackend {
    client: Option<WebDriverClient>,
    webdriver_url: String,
    headless: bool,
    user_data_dir: Option<PathBuf>,
}

impl EmbeddedBackend {
    /// Backend connecting to the WebDriver server at `webdriver_url`.
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            client: None,
            webdriver_url: webdriver_url.into(),
            headless: true,
            user_data_dir: None,
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn user_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_data_dir = dir;
        self
    }
}

impl EmbeddedBackend {
    async fn get_navigation_result(
        client: &WebDriverClient,
    ) -> Result<NavigationResult, BackendError> {
        let title = client.client.title().await.unwrap_or_default();
        let url = client
            .client
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_default();

        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }
}

/// WebDriver code point for the named keys the engine sends.
fn key_char(key: &str) -> Option<char> {
    let key = match key {
        "Enter" => Key::Enter,
        "ArrowDown" => Key::Down,
        "ArrowUp" => Key::Up,
        "Escape" => Key::Escape,
        "Tab" => Key::Tab,
        _ => return None,
    };
    Some(char::from(key))
}

#[async_trait]
impl Backend for EmbeddedBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Connecting to WebDriver at {}...", self.webdriver_url);
        let capabilities = browser_capabilities(self.headless, self.user_data_dir.as_deref());
        let client = WebDriverClient::connect(&self.webdriver_url, Some(capabilities))
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
            .client
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;

        Self::get_navigation_result(client).await
    }

    async fn execute_probe(&mut self, action: ProbeAction) -> Result<ProbeResponse, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        let args_json = serde_json::to_value(&action)?;

        let mut last_error = None;
        for attempt in 1..=PROBE_ATTEMPTS {
            if attempt > 1 {
                warn!("Retrying probe call (attempt {})...", attempt);
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }

            let check_script = "return typeof window.__courtside !== 'undefined';";
            let is_injected = match client.client.execute(check_script, vec![]).await {
                Ok(val) => val.as_bool().unwrap_or(false),
                Err(_) => false,
            };

            if !is_injected {
                debug!("Injecting probe...");
                if let Err(e) = client.client.execute(PROBE_JS, vec![]).await {
                    last_error = Some(BackendError::Probe(format!(
                        "Failed to inject probe: {}",
                        e
                    )));
                    continue;
                }
            }

            let exec_script = "return window.__courtside.process(arguments[0]);";
            match client.client.execute(exec_script, vec![args_json.clone()]).await {
                Ok(result_value) => {
                    // A click that navigates can tear the context down before the
                    // probe answers; WPE reports that as a null result.
                    if result_value.is_null() {
                        if matches!(action, ProbeAction::Click(_)) {
                            info!("Probe returned null after click, assuming navigation");
                            return Ok(ProbeResponse::ok(ProbeData::Action {
                                message: Some("clicked (page navigated)".into()),
                            }));
                        }
                        last_error = Some(BackendError::Probe("Probe returned null".into()));
                        continue;
                    }

                    match serde_json::from_value::<ProbeResponse>(result_value) {
                        Ok(response) => return Ok(response),
                        Err(e) => {
                            last_error = Some(BackendError::Serialization(e.to_string()));
                            continue;
                        }
                    }
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if err_msg.contains("undefined is not an object")
                        || err_msg.contains("__courtside is not defined")
                        || err_msg.contains("Cannot read properties of undefined")
                    {
                        last_error = Some(BackendError::Probe(err_msg));
                        continue;
                    }
                    return Err(BackendError::Probe(err_msg));
                }
            }
        }

        Err(last_error.unwrap_or(BackendError::Probe("Failed after maximum retries".into())))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        let bytes = client
            .client
            .screenshot()
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))?;
        Ok(bytes)
    }

    async fn page_source(&mut self) -> Result<String, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        client
            .client
            .source()
            .await
            .map_err(|e| BackendError::Other(format!("Reading page source failed: {}", e)))
    }

    async fn refresh(&mut self) -> Result<NavigationResult, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;

        client
            .client
            .refresh()
            .await
            .map_err(|e| BackendError::Navigation(format!("refresh failed: {}", e)))?;

        Self::get_navigation_result(client).await
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        let code = key_char(key).ok_or_else(|| BackendError::NotSupported(format!("key '{key}'")))?;

        let focused = client
            .client
            .active_element()
            .await
            .map_err(|e| BackendError::Other(format!("No focused element for {}: {}", key, e)))?;
        focused
            .send_keys(&code.to_string())
            .await
            .map_err(|e| BackendError::Other(format!("press_key failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_keys_map_to_webdriver_code_points() {
        assert_eq!(key_char("Enter"), Some('\u{E007}'));
        assert_eq!(key_char("ArrowDown"), Some('\u{E015}'));
        assert_eq!(key_char("Escape"), Some('\u{E00C}'));
        assert_eq!(key_char("F13"), None);
    }
}
