use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};
use std::path::Path;

pub struct WebDriverClient {
    pub client: Client,
}

impl WebDriverClient {
    pub async fn connect(
        url: &str,
        capabilities: Option<Map<String, Value>>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let caps = capabilities.unwrap_or_default();

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(url)
            .await
            .map_err(|e| format!("Failed to connect to WebDriver at {}: {}", url, e))?;

        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .close()
            .await
            .map_err(|e| format!("Failed to close session: {}", e))?;
        Ok(())
    }
}

/// W3C capabilities for headless mode and an optional persistent profile,
/// understood by chromedriver and geckodriver alike.
pub fn browser_capabilities(headless: bool, user_data_dir: Option<&Path>) -> Map<String, Value> {
    let mut chrome_args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    let mut firefox_args = Vec::new();
    if headless {
        chrome_args.push("--headless=new".to_string());
        firefox_args.push("-headless".to_string());
    }
    if let Some(dir) = user_data_dir {
        chrome_args.push(format!("--user-data-dir={}", dir.display()));
        firefox_args.push("-profile".to_string());
        firefox_args.push(dir.display().to_string());
    }

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".into(), json!({ "args": chrome_args }));
    caps.insert("moz:firefoxOptions".into(), json!({ "args": firefox_args }));
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_capabilities() {
        let caps = browser_capabilities(true, None);
        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome_args.iter().any(|a| a == "--headless=new"));
        let firefox_args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert_eq!(firefox_args, &vec![json!("-headless")]);
    }

    #[test]
    fn test_profile_capabilities() {
        let caps = browser_capabilities(false, Some(Path::new("/tmp/club-profile")));
        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome_args.iter().any(|a| a == "--user-data-dir=/tmp/club-profile"));
        assert!(!chrome_args.iter().any(|a| a == "--headless=new"));
        let firefox_args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert_eq!(firefox_args, &vec![json!("-profile"), json!("/tmp/club-profile")]);
    }
}
