use crate::types::Result;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Cadence of a submit-then-poll task loop. Each service picks its own
/// interval and budget; the attempt count is the only timeout mechanism.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_attempts: 20,
        }
    }
}

/// One status observation of an in-flight task.
#[derive(Debug, Clone)]
pub enum TaskProbe {
    Pending,
    Succeeded(Value),
    Failed(String),
}

/// Terminal resolution of a task. Never an `Err`: timeouts and failures are
/// explicit values so pipeline drivers can apply their own fallback policy.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded(Value),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl TaskOutcome {
    pub fn into_success(self) -> Option<Value> {
        match self {
            TaskOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

impl TaskProbe {
    /// Interprets the common task-status envelope:
    /// `{"code": 0, "data": {"status": "...", "error_msg": "..."}}`.
    /// Status is compared case-insensitively; a non-zero envelope code or a
    /// missing status is a malformed observation (retryable), not a failure.
    pub fn from_status_payload(payload: &Value) -> Result<TaskProbe> {
        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(crate::types::CloudTaskError::Malformed(format!(
                "status envelope code {}: {}",
                code, message
            )));
        }

        let data = payload
            .get("data")
            .ok_or_else(|| crate::types::CloudTaskError::Malformed("missing data".into()))?;
        let status = data
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| crate::types::CloudTaskError::Malformed("missing status".into()))?;

        match status.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(TaskProbe::Succeeded(data.clone())),
            "FAILED" | "REJECTED" => {
                let reason = data
                    .get("error_msg")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                Ok(TaskProbe::Failed(reason))
            }
            _ => Ok(TaskProbe::Pending),
        }
    }
}

/// Interprets a task submit response (`{"code": 0, "data": {"task_id": ...}}`)
/// and returns the task id. A non-zero code is a rejection, a missing id a
/// malformed response; submits are not retried beyond the transport layer.
pub fn submit_task_id(response: &Value) -> Result<String> {
    let code = response.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(crate::types::CloudTaskError::Rejected(format!(
            "submit code {}: {}",
            code, message
        )));
    }
    response
        .get("data")
        .and_then(|data| data.get("task_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            crate::types::CloudTaskError::Malformed("submit response missing data.task_id".into())
        })
}

/// Drives a task to resolution: probe, then sleep, up to exactly
/// `max_attempts` probes. Probe errors (transport, malformed JSON, envelope
/// errors) are retryable within the same budget.
pub async fn drive<F, Fut>(config: &PollConfig, mut probe: F) -> TaskOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<TaskProbe>>,
{
    for attempt in 1..=config.max_attempts {
        match probe(attempt).await {
            Ok(TaskProbe::Succeeded(value)) => {
                debug!("Task succeeded on attempt {}", attempt);
                return TaskOutcome::Succeeded(value);
            }
            Ok(TaskProbe::Failed(reason)) => {
                warn!("Task failed on attempt {}: {}", attempt, reason);
                return TaskOutcome::Failed(reason);
            }
            Ok(TaskProbe::Pending) => {
                debug!(
                    "Task pending (attempt {}/{})",
                    attempt, config.max_attempts
                );
            }
            Err(e) => {
                warn!("Status probe error on attempt {}: {}", attempt, e);
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    warn!("Task timed out after {} attempts", config.max_attempts);
    TaskOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}
