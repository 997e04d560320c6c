use chromiumoxide::Page;
use promptlog_engine::page::PageError;
use promptlog_probe::PROBE_JS;
use std::time::Duration;

/// Bound on a single evaluation; a blocking dialog would otherwise hang the call.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries while the execution context is being replaced by a navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<serde_json::Value, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err = e.to_string();
            if is_context_error(&err) {
                Err(EvalError::Context(err))
            } else {
                Err(EvalError::Other(err))
            }
        }
        Ok(Ok(remote)) => Ok(remote
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null)),
    }
}

/// Installs the probe unless it is already present. Returns `true` when a
/// fresh copy was injected, which means any previous hooks are gone.
pub async fn ensure_probe(page: &Page) -> Result<bool, PageError> {
    let loaded = evaluate_with_timeout(page, "typeof window.Promptlog !== 'undefined'").await;
    match loaded {
        Ok(serde_json::Value::Bool(true)) => Ok(false),
        Ok(_) => {
            evaluate_with_timeout(page, PROBE_JS)
                .await
                .map_err(|e| eval_error("Probe injection", e))?;
            tracing::debug!("Injected page probe");
            Ok(true)
        }
        Err(e) => Err(eval_error("Probe check", e)),
    }
}

/// Evaluates `expression` against the probe, re-injecting it and retrying
/// while the page is mid-navigation.
pub async fn call_probe(page: &Page, expression: &str) -> Result<serde_json::Value, PageError> {
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match ensure_probe(page).await {
            Ok(_) => {}
            Err(PageError::Script(err)) if is_context_error(&err) => {
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                continue;
            }
            Err(e) => return Err(e),
        }

        match evaluate_with_timeout(page, expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Context(err)) => {
                tracing::debug!(
                    "Context error during probe call (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(e) => return Err(eval_error("Probe call", e)),
        }
    }

    Err(PageError::Script(
        last_error.unwrap_or_else(|| "probe call failed after retries".to_string()),
    ))
}

fn eval_error(operation: &str, err: EvalError) -> PageError {
    match err {
        EvalError::Timeout => PageError::Script(format!(
            "{} timed out, possibly blocked by a dialog",
            operation
        )),
        EvalError::Context(e) | EvalError::Other(e) => {
            PageError::Script(format!("{} failed: {}", operation, e))
        }
    }
}
