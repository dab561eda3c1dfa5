use {
    crate::domain::{
        error::PipelineError,
        job::{JobStatus, JobType},
    },
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

pub struct JobRow {
    pub id: Uuid,
    pub status: JobStatus,
    pub attempts: i32,
}

/// Create a pending provisioning job for the service.
/// Returns `None` if a pending or running one already exists.
pub async fn create_if_no_live(
    tx: &mut Transaction<'_, Postgres>,
    service_id: Uuid,
    job_type: JobType,
) -> Result<Option<Uuid>, PipelineError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO provisioning_jobs (id, service_id, job_type, status)
        VALUES ($1, $2, $3, 'pending')
        ON CONFLICT (service_id, job_type) WHERE status IN ('pending', 'running') DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(service_id)
    .bind(job_type.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(id)
}

pub async fn latest(
    pool: &PgPool,
    service_id: Uuid,
    job_type: JobType,
) -> Result<Option<JobRow>, PipelineError> {
    let row = sqlx::query_as::<_, (Uuid, String, i32)>(
        r#"
        SELECT id, status, attempts
        FROM provisioning_jobs
        WHERE service_id = $1 AND job_type = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(service_id)
    .bind(job_type.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|(id, status, attempts)| {
        Ok(JobRow {
            id,
            status: JobStatus::try_from(status.as_str())?,
            attempts,
        })
    })
    .transpose()
}

/// Start (or restart) an attempt on a job.
pub async fn mark_running(pool: &PgPool, job_id: Uuid) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE provisioning_jobs
        SET status = 'running',
            attempts = attempts + 1,
            started_at = now(),
            last_error = NULL,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE provisioning_jobs
        SET status = 'failed', last_error = $2, completed_at = now(), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Compensation: only a job that is still live is failed.
pub async fn fail_if_live(pool: &PgPool, job_id: Uuid, error: &str) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE provisioning_jobs
        SET status = 'failed', last_error = $2, completed_at = now(), updated_at = now()
        WHERE id = $1 AND status IN ('pending', 'running')
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn complete(tx: &mut Transaction<'_, Postgres>, job_id: Uuid) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE provisioning_jobs
        SET status = 'completed', last_error = NULL, completed_at = now(), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
