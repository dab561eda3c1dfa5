use {
    crate::domain::{
        error::PipelineError,
        task::{NewTask, QueueName, TaskKind, TaskQueue},
    },
    sqlx::{PgPool, Postgres, Transaction},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub struct TaskRow {
    pub id: Uuid,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
}

impl TaskRow {
    pub fn kind(&self) -> Result<TaskKind, PipelineError> {
        TaskKind::try_from(self.task_type.as_str())
    }
}

pub async fn enqueue(pool: &PgPool, task: &NewTask) -> Result<Uuid, PipelineError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO task_queue (id, task_type, queue, payload, max_attempts)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(task.kind.as_str())
    .bind(task.queue.as_str())
    .bind(&task.payload)
    .bind(task.max_attempts)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Claim up to `limit` due tasks from one queue.
/// Uses SKIP LOCKED to avoid contention with other workers.
pub async fn claim(
    tx: &mut Transaction<'_, Postgres>,
    queue: QueueName,
    limit: i64,
) -> Result<Vec<TaskRow>, PipelineError> {
    let rows = sqlx::query_as::<_, (Uuid, String, serde_json::Value, i32, i32)>(
        r#"
        UPDATE task_queue
        SET status = 'processing', updated_at = now()
        WHERE id IN (
            SELECT id FROM task_queue
            WHERE status = 'pending' AND queue = $1 AND scheduled_at <= now()
            ORDER BY scheduled_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, task_type, payload, attempts, max_attempts
        "#,
    )
    .bind(queue.as_str())
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, task_type, payload, attempts, max_attempts)| TaskRow {
            id,
            task_type,
            payload,
            attempts,
            max_attempts,
        })
        .collect())
}

pub async fn complete(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    sqlx::query("UPDATE task_queue SET status = 'completed', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a failure. Exponential backoff via scheduled_at.
/// If max attempts reached, mark as 'failed' permanently.
pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE task_queue
        SET attempts = attempts + 1,
            last_error = $2,
            status = CASE
                WHEN attempts + 1 >= max_attempts THEN 'failed'
                ELSE 'pending'
            END,
            scheduled_at = CASE
                WHEN attempts + 1 >= max_attempts THEN scheduled_at
                ELSE now() + make_interval(secs => power(2, attempts + 1)::int)
            END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// A task that can never succeed: failed without spending the retry budget.
pub async fn discard(pool: &PgPool, id: Uuid, error: &str) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE task_queue
        SET attempts = attempts + 1, last_error = $2, status = 'failed', updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reset tasks stuck in 'processing' for >5 minutes back to 'pending'.
/// Returns the number of reaped tasks.
pub async fn reap_stale(pool: &PgPool) -> Result<u64, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET status = 'pending', updated_at = now()
        WHERE status = 'processing' AND updated_at < now() - interval '5 minutes'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// `TaskQueue` backed by the `task_queue` table.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TaskQueue for PgTaskQueue {
    fn enqueue(
        &self,
        task: NewTask,
    ) -> Pin<Box<dyn Future<Output = Result<Uuid, PipelineError>> + Send + '_>> {
        Box::pin(async move {
            enqueue(&self.pool, &task)
                .await
                .map_err(|e| PipelineError::Queue(format!("{}: {e}", task.kind)))
        })
    }
}

/// Single-flight lease for a scan. The returned transaction holds a
/// transaction-scoped advisory lock until it is committed or dropped;
/// `None` means another scan with the same name is running.
pub async fn try_scan_lease(
    pool: &PgPool,
    name: &str,
) -> Result<Option<Transaction<'static, Postgres>>, PipelineError> {
    let mut tx = pool.begin().await?;
    let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtext($1))")
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

    if acquired {
        Ok(Some(tx))
    } else {
        tx.rollback().await?;
        Ok(None)
    }
}
