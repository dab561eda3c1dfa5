use {
    crate::{
        domain::{
            error::PipelineError,
            task::{ExpireServicePayload, SuspendVpsPayload, TaskKind, TerminateVpsPayload},
        },
        infra::postgres::{service_repo, task_repo},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

async fn ensure_exists(pool: &PgPool, service_id: Uuid) -> Result<(), PipelineError> {
    match service_repo::get_detail(pool, service_id).await? {
        Some(_) => Ok(()),
        None => Err(PipelineError::NotFound(format!("service {service_id}"))),
    }
}

/// Idempotent. A terminated service stays terminated.
pub async fn suspend_vps(pool: &PgPool, payload: &SuspendVpsPayload) -> Result<(), PipelineError> {
    if service_repo::suspend(pool, payload.service_id, &payload.reason).await? {
        tracing::info!(service_id = %payload.service_id, reason = %payload.reason, "service suspended");
        return Ok(());
    }
    ensure_exists(pool, payload.service_id).await?;
    tracing::warn!(service_id = %payload.service_id, "service terminated, not suspended");
    Ok(())
}

pub async fn terminate_vps(pool: &PgPool, payload: &TerminateVpsPayload) -> Result<(), PipelineError> {
    if !service_repo::terminate(pool, payload.service_id).await? {
        return Err(PipelineError::NotFound(format!("service {}", payload.service_id)));
    }
    tracing::info!(service_id = %payload.service_id, "service terminated");
    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpireReport {
    pub checked: usize,
    pub suspended: usize,
    pub failed: usize,
    /// Another scan held the lease; nothing was checked.
    pub skipped: bool,
}

/// Single-service mode when the payload names a service, scan mode
/// otherwise. In scan mode a failing service is logged and the sweep goes on.
pub async fn expire_service(
    pool: &PgPool,
    payload: &ExpireServicePayload,
) -> Result<ExpireReport, PipelineError> {
    if let Some(service_id) = payload.service_id {
        ensure_exists(pool, service_id).await?;
        let suspended = service_repo::expire(pool, service_id).await?;
        if suspended {
            tracing::info!(service_id = %service_id, "expired service suspended");
        }
        return Ok(ExpireReport {
            checked: 1,
            suspended: usize::from(suspended),
            ..Default::default()
        });
    }

    let Some(lease) = task_repo::try_scan_lease(pool, TaskKind::ExpireService.as_str()).await?
    else {
        tracing::info!("expiry scan already running, skipped");
        return Ok(ExpireReport {
            skipped: true,
            ..Default::default()
        });
    };

    let mut report = ExpireReport::default();
    for service_id in service_repo::expired_ids(pool).await? {
        report.checked += 1;
        match service_repo::expire(pool, service_id).await {
            Ok(true) => {
                report.suspended += 1;
                tracing::info!(service_id = %service_id, "expired service suspended");
            }
            Ok(false) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(service_id = %service_id, error = %e, "suspending expired service");
            }
        }
    }

    lease.commit().await?;
    tracing::info!(
        checked = report.checked,
        suspended = report.suspended,
        failed = report.failed,
        "expiry scan finished"
    );
    Ok(report)
}
