//! The handler registry: maps a job's `type` string to the capability that
//! executes it.
//!
//! Registration happens once at worker startup and the registry is
//! immutable afterwards - polymorphism is closed over whatever was
//! registered, there is no runtime plugin loading.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A capability bound to one job `type`.
///
/// Handlers return `Ok(Some(result))` on success with a result payload,
/// `Ok(None)` on success with no result to record, or `Err(message)` on
/// failure. The worker stringifies any handler error into `last_error` and
/// never lets it propagate into the loop itself.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn execute(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<Option<serde_json::Value>, String>;
}

/// A fixed, process-local mapping from job `type` to [`Handler`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `job_type`. Registering the same type twice
    /// replaces the previous handler - callers should do all registration
    /// once at startup, before the worker loop begins.
    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn execute(
            &self,
            payload: &serde_json::Value,
        ) -> std::result::Result<Option<serde_json::Value>, String> {
            Ok(Some(payload.clone()))
        }
    }

    #[tokio::test]
    async fn register_and_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", Arc::new(EchoHandler));

        assert!(registry.is_registered("echo"));
        assert!(!registry.is_registered("nope"));

        let handler = registry.get("echo").expect("registered");
        let result = handler.execute(&serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(result, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn registered_types_lists_all() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", Arc::new(EchoHandler));
        registry.register("sleep", Arc::new(EchoHandler));

        let mut types = registry.registered_types();
        types.sort_unstable();
        assert_eq!(types, vec!["echo", "sleep"]);
    }
}
