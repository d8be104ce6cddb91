//! Full-jitter exponential backoff for retry scheduling.
//!
//! Formula: `delay = uniform(0, min(base * 2^(attempt-1), cap))`. Jitter
//! prevents synchronised retry storms after correlated failures; the cap
//! bounds worst-case delay. A zero base always yields zero delay (no
//! artificial wait for retry-immediately policies).

/// Compute the backoff delay in seconds for a 1-based `attempt`.
///
/// `base` and `cap` are both in seconds. Returns a value in
/// `[0, min(base * 2^(attempt-1), cap)]`.
pub fn compute_delay_seconds(base_seconds: f64, attempt: u32, cap_seconds: f64) -> f64 {
    if base_seconds <= 0.0 {
        return 0.0;
    }

    let exponent = attempt.saturating_sub(1).min(62);
    let raw = (base_seconds * 2f64.powi(exponent as i32)).min(cap_seconds);
    fastrand::f64() * raw
}
