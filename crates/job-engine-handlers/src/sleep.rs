use async_trait::async_trait;
use job_engine_core::Handler;
use std::time::Duration;
use tracing::debug;

/// Sleeps for `payload.seconds` then succeeds with no result. Requires a
/// positive numeric `payload.seconds`.
pub struct SleepHandler;

#[async_trait]
impl Handler for SleepHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, String> {
        let seconds = seconds_from(payload)?;
        debug!(seconds, "sleep handler sleeping");
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(None)
    }
}

fn seconds_from(payload: &serde_json::Value) -> Result<f64, String> {
    match payload.get("seconds").and_then(|v| v.as_f64()) {
        Some(seconds) if seconds > 0.0 => Ok(seconds),
        Some(_) => Err("payload.seconds must be greater than 0".to_string()),
        None => Err("payload.seconds must be a number".to_string()),
    }
}

pub fn validate(payload: &serde_json::Value) -> Result<(), String> {
    seconds_from(payload).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn sleeps_for_roughly_the_requested_duration() {
        let handler = SleepHandler;
        let start = Instant::now();
        handler
            .execute(&serde_json::json!({"seconds": 0.05}))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn rejects_zero_seconds() {
        let handler = SleepHandler;
        let err = handler
            .execute(&serde_json::json!({"seconds": 0}))
            .await
            .unwrap_err();
        assert!(err.contains("greater than 0"));
    }

    #[tokio::test]
    async fn rejects_missing_seconds() {
        let handler = SleepHandler;
        let err = handler.execute(&serde_json::json!({})).await.unwrap_err();
        assert!(err.contains("number"));
    }
}
