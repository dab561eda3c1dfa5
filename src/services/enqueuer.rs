use {
    crate::{
        domain::{
            error::PipelineError,
            job::ProvisioningTask,
            task::{NewTask, ProvisionVpsPayload, TaskQueue},
        },
        infra::postgres::{job_repo, order_repo, service_repo},
    },
    sqlx::PgPool,
};

/// Hand committed provisioning jobs to the task queue, one critical task per
/// job. A job whose submission fails is compensated; the others still go out.
/// Returns the number of tasks submitted.
pub async fn enqueue_provisioning(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    tasks: &[ProvisioningTask],
) -> Result<usize, PipelineError> {
    let mut errors = Vec::new();
    let mut submitted = 0;

    for task in tasks {
        let payload = ProvisionVpsPayload {
            service_id: task.service_id,
            order_id: task.order_id,
            plan_id: task.plan_id,
            user_id: task.user_id,
        };

        let result = match NewTask::provision(&payload) {
            Ok(new_task) => queue.enqueue(new_task).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(task_id) => {
                submitted += 1;
                tracing::info!(
                    job_id = %task.job_id,
                    service_id = %task.service_id,
                    task_id = %task_id,
                    "provisioning task enqueued"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %task.job_id, error = %e, "provisioning task enqueue failed");
                errors.push(format!("job {}: {e}", task.job_id));
                errors.extend(compensate(pool, task, &e.to_string()).await);
            }
        }
    }

    if errors.is_empty() {
        Ok(submitted)
    } else {
        Err(PipelineError::Partial(errors))
    }
}

/// Undo the state a failed submission left behind. Each step is guarded by
/// the state it expects, so running it twice or after a partial run is safe.
/// Step failures are logged and returned, never raised.
pub async fn compensate(pool: &PgPool, task: &ProvisioningTask, reason: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let reason = format!("enqueue failed: {reason}");

    match job_repo::fail_if_live(pool, task.job_id, &reason).await {
        Ok(changed) => tracing::info!(job_id = %task.job_id, changed, "compensation: job failed"),
        Err(e) => {
            tracing::warn!(job_id = %task.job_id, error = %e, "compensation: failing job");
            errors.push(format!("compensate job {}: {e}", task.job_id));
        }
    }

    match service_repo::revert_to_pending(pool, task.service_id).await {
        Ok(changed) => {
            tracing::info!(service_id = %task.service_id, changed, "compensation: service pending")
        }
        Err(e) => {
            tracing::warn!(service_id = %task.service_id, error = %e, "compensation: reverting service");
            errors.push(format!("compensate service {}: {e}", task.service_id));
        }
    }

    match order_repo::revert_to_paid(pool, task.order_id).await {
        Ok(changed) => {
            tracing::info!(order_id = %task.order_id, changed, "compensation: order paid")
        }
        Err(e) => {
            tracing::warn!(order_id = %task.order_id, error = %e, "compensation: reverting order");
            errors.push(format!("compensate order {}: {e}", task.order_id));
        }
    }

    errors
}
