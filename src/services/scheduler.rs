use {
    crate::domain::task::{NewTask, TaskKind, TaskQueue},
    std::{sync::Arc, time::Duration},
    tokio::{
        sync::watch,
        time::{Instant, MissedTickBehavior, interval_at},
    },
};

/// Fire scan-mode `service:expire` and `billing:renewal_reminder` tasks on
/// fixed intervals. The first tick of each fires one full interval after
/// start. Overlapping scans are kept out by the handlers' lease, not here.
pub async fn run_scheduler(
    queue: Arc<dyn TaskQueue>,
    expire_every: Duration,
    renewal_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = Instant::now();
    let mut expire = interval_at(start + expire_every, expire_every);
    let mut renewal = interval_at(start + renewal_every, renewal_every);
    expire.set_missed_tick_behavior(MissedTickBehavior::Skip);
    renewal.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        expire_secs = expire_every.as_secs(),
        renewal_secs = renewal_every.as_secs(),
        "scheduler started"
    );

    loop {
        let kind = tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("scheduler shutting down");
                return;
            }
            _ = expire.tick() => TaskKind::ExpireService,
            _ = renewal.tick() => TaskKind::RenewalReminder,
        };

        match queue.enqueue(NewTask::scan(kind)).await {
            Ok(task_id) => tracing::info!(task_type = %kind, task_id = %task_id, "scan task fired"),
            Err(e) => tracing::error!(task_type = %kind, error = %e, "scan task enqueue failed"),
        }
    }
}
