use {
    super::tasks::{self, TaskContext},
    crate::{
        domain::{error::PipelineError, task::QueueName},
        infra::postgres::task_repo::{self, TaskRow},
    },
    sqlx::PgPool,
    std::time::Duration,
    tokio::{sync::watch, task::JoinSet},
    tracing::Instrument,
};

const IDLE_POLL: Duration = Duration::from_secs(1);
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Run `concurrency` workers until `shutdown` flips to `true`. The same
/// signal cancels in-flight provisioning.
pub async fn run_pool(ctx: TaskContext, concurrency: usize, shutdown: watch::Receiver<bool>) {
    let mut workers = JoinSet::new();
    for worker_id in 0..concurrency.max(1) {
        workers.spawn(run_worker(ctx.clone(), worker_id, shutdown.clone()));
    }
    tracing::info!(concurrency, "worker pool started");

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "worker task panicked");
        }
    }
    tracing::info!("worker pool stopped");
}

/// Poll the weighted queues one task at a time. Sleeps only when every
/// queue came back empty.
pub async fn run_worker(ctx: TaskContext, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!(worker_id, "task worker started");
    let mut tick = worker_id;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let ran = match poll_once(&ctx, tick, shutdown.clone()).await {
            Ok(ran) => ran,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "worker poll error");
                false
            }
        };
        tick = tick.wrapping_add(1);

        if ran {
            continue;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }
    }

    tracing::debug!(worker_id, "task worker shutting down");
}

/// Claim and run at most one task. Returns whether a task was claimed.
pub async fn poll_once(
    ctx: &TaskContext,
    tick: usize,
    cancel: watch::Receiver<bool>,
) -> Result<bool, PipelineError> {
    for queue in QueueName::poll_order(tick) {
        let mut tx = ctx.pool.begin().await?;
        let mut claimed = task_repo::claim(&mut tx, queue, 1).await?;
        tx.commit().await?;

        if let Some(task) = claimed.pop() {
            run_task(ctx, queue, task, cancel).await?;
            return Ok(true);
        }
    }
    Ok(false)
}

async fn run_task(
    ctx: &TaskContext,
    queue: QueueName,
    task: TaskRow,
    cancel: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    let span = tracing::info_span!(
        "task",
        task_id = %task.id,
        task_type = %task.task_type,
        queue = %queue,
        attempt = task.attempts + 1,
    );

    async {
        let result = match task.kind() {
            Ok(kind) => tasks::dispatch(ctx, kind, &task.payload, cancel).await,
            Err(e) => Err(e),
        };
        settle(&ctx.pool, &task, result).await
    }
    .instrument(span)
    .await
}

/// Record the handler result on the queue row.
async fn settle(
    pool: &PgPool,
    task: &TaskRow,
    result: Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    match result {
        Ok(()) => {
            tracing::info!("task completed");
            task_repo::complete(pool, task.id).await
        }
        Err(e) if e.is_permanent() => {
            tracing::warn!(error = %e, "task cannot succeed, discarded");
            task_repo::discard(pool, task.id, &e.to_string()).await
        }
        Err(e) => {
            if task.attempts + 1 >= task.max_attempts {
                tracing::error!(error = %e, "task failed, retry budget exhausted");
            } else {
                tracing::warn!(error = %e, "task failed, scheduling retry");
            }
            task_repo::fail(pool, task.id, &e.to_string()).await
        }
    }
}

/// Periodically reset tasks stuck in 'processing' back to 'pending'.
pub async fn run_reaper(pool: PgPool, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("stale task reaper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("stale task reaper shutting down");
                return;
            }
            _ = tokio::time::sleep(REAP_INTERVAL) => {}
        }

        match task_repo::reap_stale(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "reaped stale tasks"),
            Err(e) => tracing::error!(error = %e, "reaper error"),
        }
    }
}
