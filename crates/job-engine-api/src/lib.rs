//! HTTP submission layer: validates job-create requests, inserts a PENDING
//! job record, and enqueues it - the external collaborator described
//! alongside the job lifecycle engine.

pub mod config;
pub mod error;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use job_engine_core::{Job, JobState, JobStore, WorkQueue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

pub struct AppState<S: JobStore, Q: WorkQueue> {
    pub store: Arc<S>,
    pub queue: Arc<Q>,
}

pub fn router<S: JobStore + 'static, Q: WorkQueue + 'static>(
    state: Arc<AppState<S, Q>>,
) -> Router {
    Router::new()
        .route("/jobs", post(create_job::<S, Q>))
        .route("/jobs/:id", get(get_job::<S, Q>))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
    pub max_retries: i32,
    pub retry_delay_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    pub state: String,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub attempt: i32,
    pub max_retries: i32,
    pub retry_delay_seconds: f64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}

/// The wire form of a state is its upper-case name, per SPEC_FULL.md §6's
/// `{id, state: "PENDING", ...}` contract - distinct from `JobState`'s
/// `Display`, which logging uses in lower case.
fn wire_state(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "PENDING",
        JobState::Running => "RUNNING",
        JobState::Success => "SUCCESS",
        JobState::Failed => "FAILED",
        JobState::Retrying => "RETRYING",
    }
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            state: wire_state(job.state).to_string(),
            payload: job.payload,
            result: job.result,
            attempt: job.attempt,
            max_retries: job.max_retries,
            retry_delay_seconds: job.retry_delay_seconds,
            last_error: job.last_error,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            duration_seconds: job.duration_seconds,
        }
    }
}

/// Validate a create-request per SPEC_FULL.md §6: non-negative retry
/// fields, plus whatever type-specific payload rule `job-engine-handlers`
/// knows about for the given `type`.
fn validate(request: &CreateJobRequest) -> Result<(), ApiError> {
    if request.max_retries < 0 {
        return Err(ApiError::Validation(
            "max_retries must be >= 0".to_string(),
        ));
    }
    if request.retry_delay_seconds < 0.0 {
        return Err(ApiError::Validation(
            "retry_delay_seconds must be >= 0".to_string(),
        ));
    }
    job_engine_handlers::validate_payload(&request.job_type, &request.payload)
        .map_err(ApiError::Validation)
}

async fn create_job<S: JobStore, Q: WorkQueue>(
    State(state): State<Arc<AppState<S, Q>>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<JobResponse>, ApiError> {
    validate(&request)?;

    let job = Job::new(
        request.job_type,
        request.payload,
        request.max_retries,
        request.retry_delay_seconds,
    );
    state.store.insert(&job).await?;
    state.queue.enqueue(job.id).await?;

    tracing::info!(job_id = %job.id, job_type = %job.job_type, "job submitted");
    Ok(Json(job.into()))
}

async fn get_job<S: JobStore, Q: WorkQueue>(
    State(state): State<Arc<AppState<S, Q>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(job.into()))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
