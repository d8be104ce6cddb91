//! PostgreSQL implementation of the `job_engine_core::JobStore` contract.
//!
//! # Database schema
//!
//! ```sql
//! CREATE TYPE job_state AS ENUM ('pending', 'running', 'success', 'failed', 'retrying');
//!
//! CREATE TABLE jobs (
//!     id                   UUID PRIMARY KEY,
//!     job_type             TEXT NOT NULL,
//!     state                job_state NOT NULL DEFAULT 'pending',
//!     payload              JSONB NOT NULL,
//!     result               JSONB,
//!     attempt              INTEGER NOT NULL DEFAULT 0,
//!     max_retries          INTEGER NOT NULL,
//!     retry_delay_seconds  DOUBLE PRECISION NOT NULL,
//!     last_error           TEXT,
//!     created_at           TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     started_at           TIMESTAMPTZ,
//!     finished_at          TIMESTAMPTZ,
//!     duration_seconds     DOUBLE PRECISION
//! );
//!
//! -- Serves query_stuck without a sequential scan; the partial predicate
//! -- keeps the index tiny since most jobs are not RUNNING at any given time.
//! CREATE INDEX idx_jobs_running_started_at ON jobs (started_at)
//!     WHERE state = 'running';
//! ```
//!
//! `state` is a Postgres enum, but this crate binds and reads it as text cast
//! through `::job_state` rather than deriving `sqlx::Type` on
//! `job_engine_core::JobState` directly - that type is owned by the core
//! crate and stays backend-agnostic so non-SQL stores can implement the same
//! trait without a `sqlx` dependency.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_engine_core::{EngineError, FailureOutcome, Job, JobState, JobStore, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn store_err(context: &'static str, error: sqlx::Error) -> EngineError {
    EngineError::Store(anyhow!(error).context(context))
}

fn state_to_str(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Running => "running",
        JobState::Success => "success",
        JobState::Failed => "failed",
        JobState::Retrying => "retrying",
    }
}

fn state_from_str(s: &str) -> std::result::Result<JobState, EngineError> {
    match s {
        "pending" => Ok(JobState::Pending),
        "running" => Ok(JobState::Running),
        "success" => Ok(JobState::Success),
        "failed" => Ok(JobState::Failed),
        "retrying" => Ok(JobState::Retrying),
        other => Err(EngineError::Store(anyhow!("unrecognised job state: {other}"))),
    }
}

fn row_to_job(row: PgRow) -> std::result::Result<Job, EngineError> {
    let state_text: String = row
        .try_get("state")
        .map_err(|e| store_err("reading state column", e))?;

    Ok(Job {
        id: row.try_get("id").map_err(|e| store_err("reading id", e))?,
        job_type: row
            .try_get("job_type")
            .map_err(|e| store_err("reading job_type", e))?,
        state: state_from_str(&state_text)?,
        payload: row
            .try_get("payload")
            .map_err(|e| store_err("reading payload", e))?,
        result: row
            .try_get("result")
            .map_err(|e| store_err("reading result", e))?,
        attempt: row
            .try_get("attempt")
            .map_err(|e| store_err("reading attempt", e))?,
        max_retries: row
            .try_get("max_retries")
            .map_err(|e| store_err("reading max_retries", e))?,
        retry_delay_seconds: row
            .try_get("retry_delay_seconds")
            .map_err(|e| store_err("reading retry_delay_seconds", e))?,
        last_error: row
            .try_get("last_error")
            .map_err(|e| store_err("reading last_error", e))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| store_err("reading created_at", e))?,
        started_at: row
            .try_get("started_at")
            .map_err(|e| store_err("reading started_at", e))?,
        finished_at: row
            .try_get("finished_at")
            .map_err(|e| store_err("reading finished_at", e))?,
        duration_seconds: row
            .try_get("duration_seconds")
            .map_err(|e| store_err("reading duration_seconds", e))?,
    })
}

/// `JobStore` backed by a single `jobs` table in PostgreSQL.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small default pool. Binaries that need custom pool
    /// sizing should build a `PgPool` themselves and call [`PgJobStore::new`].
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, state, payload, result, attempt, max_retries,
                retry_delay_seconds, last_error, created_at, started_at,
                finished_at, duration_seconds
            ) VALUES (
                $1, $2, $3::job_state, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            "#,
        )
        .bind(job.id)
        .bind(&job.job_type)
        .bind(state_to_str(job.state))
        .bind(&job.payload)
        .bind(&job.result)
        .bind(job.attempt)
        .bind(job.max_retries)
        .bind(job.retry_delay_seconds)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.duration_seconds)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("inserting job", e))?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("fetching job", e))?;

        row.map(row_to_job).transpose()
    }

    async fn mark_running(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET attempt = attempt + 1,
                state = 'running'::job_state,
                started_at = now(),
                finished_at = NULL,
                duration_seconds = NULL,
                last_error = NULL
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("marking job running", e))?;

        row.map(row_to_job).transpose()
    }

    async fn mark_succeeded(&self, id: Uuid, result: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'success'::job_state,
                result = $2,
                finished_at = now(),
                duration_seconds = EXTRACT(EPOCH FROM (now() - started_at))
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("marking job succeeded", e))?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<FailureOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("starting mark_failed transaction", e))?;

        let row = sqlx::query("SELECT attempt, max_retries FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| store_err("locking job row", e))?;

        let attempt: i32 = row
            .try_get("attempt")
            .map_err(|e| store_err("reading attempt", e))?;
        let max_retries: i32 = row
            .try_get("max_retries")
            .map_err(|e| store_err("reading max_retries", e))?;

        let outcome = if attempt <= max_retries {
            sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'retrying'::job_state,
                    last_error = $2,
                    finished_at = now(),
                    duration_seconds = EXTRACT(EPOCH FROM (now() - started_at))
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(error)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("recording retrying failure", e))?;

            FailureOutcome::Retrying { attempt }
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'failed'::job_state,
                    last_error = $2,
                    finished_at = now(),
                    duration_seconds = EXTRACT(EPOCH FROM (now() - started_at))
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(error)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("recording terminal failure", e))?;

            FailureOutcome::Failed
        };

        tx.commit()
            .await
            .map_err(|e| store_err("committing mark_failed transaction", e))?;

        Ok(outcome)
    }

    async fn mark_unsupported_type(&self, id: Uuid, job_type: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed'::job_state,
                last_error = $2,
                finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(format!("Unsupported job type: {job_type}"))
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("marking unsupported job type", e))?;

        Ok(())
    }

    async fn mark_reaped_retrying(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'retrying'::job_state,
                last_error = 'Worker timeout detected; requeued'
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("marking job reaped-retrying", e))?;

        Ok(())
    }

    async fn mark_reaped_failed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed'::job_state,
                last_error = 'Worker timeout detected; no retries left',
                finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("marking job reaped-failed", e))?;

        Ok(())
    }

    async fn query_stuck(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE state = 'running' AND started_at < $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("querying stuck jobs", e))?;

        rows.into_iter().map(row_to_job).collect()
    }
}
