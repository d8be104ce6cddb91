use async_trait::async_trait;
use job_engine_core::Handler;

/// Echoes back `{"message": <payload.message>}`, discarding any other
/// payload keys. Requires a non-empty string `payload.message`.
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn execute(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, String> {
        validate(payload)?;
        let message = payload.get("message").and_then(|v| v.as_str()).unwrap();
        Ok(Some(serde_json::json!({"message": message})))
    }
}

pub fn validate(payload: &serde_json::Value) -> Result<(), String> {
    match payload.get("message").and_then(|v| v.as_str()) {
        Some(message) if !message.is_empty() => Ok(()),
        Some(_) => Err("payload.message must not be empty".to_string()),
        None => Err("payload.message must be a string".to_string()),
    }
}
