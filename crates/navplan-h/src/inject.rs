use chromiumoxide::Page;
use navplan_engine::DriverError;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DRIVER_JS: &str = include_str!("driver.js");

/// Upper bound for a single evaluation. A blocked JS thread (modal dialog,
/// runaway script) otherwise hangs the run.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Errors that mean the browser or its page target is gone.
pub fn is_session_error(err: &str) -> bool {
    let lower = err.to_lowercase();
    lower.contains("closed") || lower.contains("channel") || lower.contains("exited")
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
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        // `null` and `undefined` come back without a value.
        Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
    }
}

async fn ensure_injected(page: &Page) -> Result<(), EvalError> {
    let loaded = evaluate_with_timeout(page, "typeof window.__navplan !== 'undefined'").await?;
    if loaded.as_bool() != Some(true) {
        evaluate_with_timeout(page, DRIVER_JS).await?;
    }
    Ok(())
}

fn to_driver_error(err: EvalError) -> DriverError {
    match err {
        EvalError::Timeout => DriverError::Timeout(
            "script evaluation (possibly blocked by a dialog)".to_string(),
        ),
        EvalError::Context(msg) => DriverError::Script(msg),
        EvalError::Other(msg) if is_session_error(&msg) => DriverError::Closed(msg),
        EvalError::Other(msg) => DriverError::Script(msg),
    }
}

/// Evaluate `expression` against the injected helpers and decode the result.
///
/// Re-injects the helpers after navigations and retries while the page is
/// between execution contexts.
pub async fn call<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T, DriverError> {
    tracing::trace!("Evaluating: {}", expression);
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        let outcome = match ensure_injected(page).await {
            Ok(()) => evaluate_with_timeout(page, expression).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(value) => return Ok(serde_json::from_value(value)?),
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during evaluation (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(other) => return Err(to_driver_error(other)),
        }
    }

    Err(DriverError::Script(last_error.unwrap_or_else(|| {
        "Evaluation failed after retries".to_string()
    })))
}

/// `window.__navplan.<method>(<args>)` with JSON-encoded arguments.
pub fn helper_call(method: &str, args: &[serde_json::Value]) -> Result<String, DriverError> {
    let encoded = args
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("window.__navplan.{}({})", method, encoded.join(", ")))
}
