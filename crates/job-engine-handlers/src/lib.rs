//! Example handlers sufficient to exercise the full worker lifecycle:
//! `echo`, which hands its payload straight back, and `sleep`, which waits
//! for a configurable duration before succeeding.

mod echo;
mod sleep;

pub use echo::EchoHandler;
pub use sleep::SleepHandler;

/// Validate a job payload against the rules for `job_type`, the same rules
/// the submission layer enforces at `POST /jobs` time. Returns `Ok(())` for
/// any type this crate doesn't recognise - callers decide separately
/// whether an unrecognised type is itself an error.
pub fn validate_payload(job_type: &str, payload: &serde_json::Value) -> Result<(), String> {
    match job_type {
        "echo" => echo::validate(payload),
        "sleep" => sleep::validate(payload),
        _ => Ok(()),
    }
}

/// Register both example handlers on `registry` under their canonical type
/// names (`echo`, `sleep`).
pub fn register_all(registry: &mut job_engine_core::HandlerRegistry) {
    registry.register("echo", std::sync::Arc::new(EchoHandler));
    registry.register("sleep", std::sync::Arc::new(SleepHandler));
}
