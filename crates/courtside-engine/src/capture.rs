//! Debug artifact persistence.
//!
//! The workflow asks for a capture at every interesting stage. What happens
//! to the screenshot and HTML is up to the sink.

use async_trait::async_trait;
use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// One captured page state.
#[derive(Debug, Default)]
pub struct Artifact {
    pub screenshot: Option<Vec<u8>>,
    pub html: Option<String>,
}

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn store(&self, tag: &str, artifact: Artifact) -> Result<(), CaptureError>;
}

/// Discards everything.
pub struct NullSink;

#[async_trait]
impl ArtifactSink for NullSink {
    async fn store(&self, _tag: &str, _artifact: Artifact) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Writes `{tag}_{YYYYmmdd_HHMMSS}.png` and `.html` into a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn store(&self, tag: &str, artifact: Artifact) -> Result<(), CaptureError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stem = format!("{}_{}", sanitize(tag), Local::now().format("%Y%m%d_%H%M%S"));

        if let Some(png) = artifact.screenshot {
            let path = self.dir.join(format!("{stem}.png"));
            tokio::fs::write(&path, png).await?;
            debug!(path = %path.display(), "saved screenshot");
        }
        if let Some(html) = artifact.html {
            let path = self.dir.join(format!("{stem}.html"));
            tokio::fs::write(&path, html).await?;
            debug!(path = %path.display(), "saved page source");
        }
        Ok(())
    }
}

fn sanitize(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(sanitize("attempt_court 3/6:00"), "attempt_court_3_6_00");
    }

    #[tokio::test]
    async fn test_directory_sink_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("debug"));
        sink.store(
            "login_failure",
            Artifact {
                screenshot: Some(vec![0x89, b'P', b'N', b'G']),
                html: Some("<html></html>".into()),
            },
        )
        .await
        .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(sink.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("login_failure_") && names[0].ends_with(".html"));
        assert!(names[1].ends_with(".png"));
    }
}
