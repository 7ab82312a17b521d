use chromiumoxide::Page;
use courtside_probe::{PROBE_JS, PROBE_LOADED_CHECK};
use std::error::Error;
use std::time::Duration;

/// Default timeout for JavaScript evaluation (10 seconds).
/// This prevents hanging when dialogs (alert/confirm/prompt) block the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Why one probe evaluation failed.
#[derive(Debug)]
pub enum ProbeCallError {
    /// The evaluation did not return within the timeout.
    Timeout,
    Failed(String),
}

impl std::fmt::Display for ProbeCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeCallError::Timeout => write!(
                f,
                "probe call timed out - possibly blocked by a dialog (alert/confirm/prompt)"
            ),
            ProbeCallError::Failed(msg) => f.write_str(msg),
        }
    }
}

impl Error for ProbeCallError {}

/// Installs the probe unless the current document already has it.
async fn inject_probe(page: &Page) -> Result<(), EvalError> {
    let loaded = evaluate_with_timeout(page, PROBE_LOADED_CHECK).await?;
    if loaded.as_bool() != Some(true) {
        evaluate_with_timeout(page, PROBE_JS).await?;
    }
    Ok(())
}

/// Runs one probe action in the page, injecting the probe first when a
/// navigation has replaced the document.
pub async fn call_probe(
    page: &Page,
    action: &serde_json::Value,
) -> Result<serde_json::Value, ProbeCallError> {
    let action_json =
        serde_json::to_string(action).map_err(|e| ProbeCallError::Failed(e.to_string()))?;
    let expression = format!("window.__courtside.process({})", action_json);

    tracing::debug!("Evaluating probe action: {}", action_json);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        let result = match inject_probe(page).await {
            Ok(()) => evaluate_with_timeout(page, &expression).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => return Err(ProbeCallError::Timeout),
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during probe call (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(ProbeCallError::Failed(format!(
                    "Evaluation failed: {}",
                    err_str
                )));
            }
        }
    }

    Err(ProbeCallError::Failed(last_error.unwrap_or_else(|| {
        "Failed to execute probe action after retries".to_string()
    })))
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(
    page: &Page,
    expression: &str,
) -> Result<serde_json::Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        // Statements like the probe installer evaluate to `undefined`.
        Ok(Ok(remote_object)) => Ok(remote_object
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null)),
    }
}
