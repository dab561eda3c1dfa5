use {
    super::TaskContext,
    crate::{
        domain::{
            error::PipelineError,
            job::{JobStatus, JobType},
            order::OrderStatus,
            provider::{ProvisionRequest, ProvisionedMachine},
            service::ServiceStatus,
            task::ProvisionVpsPayload,
        },
        infra::postgres::{job_repo, order_repo, service_repo},
    },
    tokio::sync::watch,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Activated(ProvisionedMachine),
    /// The service is already active and its last job completed.
    AlreadyActive,
}

/// Drive the latest provisioning job of a service to completion.
///
/// A provider failure marks the job failed and is returned for retry; the
/// service keeps its status. Success activates the service, completes the
/// job and moves the order to `active` in one transaction.
pub async fn provision_vps(
    ctx: &TaskContext,
    payload: &ProvisionVpsPayload,
    cancel: watch::Receiver<bool>,
) -> Result<ProvisionOutcome, PipelineError> {
    let pool = &ctx.pool;

    let service = service_repo::get_detail(pool, payload.service_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("service {}", payload.service_id)))?;
    let job = job_repo::latest(pool, service.id, JobType::ProvisionVps).await?;

    if service.status == ServiceStatus::Active
        && job.as_ref().is_some_and(|j| j.status == JobStatus::Completed)
    {
        tracing::info!(service_id = %service.id, "service already active, nothing to provision");
        return Ok(ProvisionOutcome::AlreadyActive);
    }
    if service.status.is_terminal() {
        return Err(PipelineError::Validation(format!(
            "service {} is terminated",
            service.id
        )));
    }
    let job = job.ok_or_else(|| {
        PipelineError::NotFound(format!("provisioning job for service {}", service.id))
    })?;

    job_repo::mark_running(pool, job.id).await?;
    tracing::info!(
        service_id = %service.id,
        job_id = %job.id,
        attempt = job.attempts + 1,
        "provisioning started"
    );

    let request = ProvisionRequest {
        service_id: service.id,
        plan_id: service.plan_id,
        user_id: service.user_id,
    };

    let machine = match ctx.provisioner.provision(&request, cancel).await {
        Ok(machine) => machine,
        Err(e) => {
            job_repo::mark_failed(pool, job.id, &e.to_string()).await?;
            tracing::warn!(service_id = %service.id, job_id = %job.id, error = %e, "provisioning failed");
            return Err(e);
        }
    };

    let mut tx = pool.begin().await?;
    service_repo::activate(&mut tx, service.id, &machine.hostname, &machine.ip_address).await?;
    job_repo::complete(&mut tx, job.id).await?;

    match order_repo::current_status(&mut tx, service.order_id).await? {
        Some(OrderStatus::Provisioning) => {
            order_repo::transition(
                &mut tx,
                service.order_id,
                OrderStatus::Provisioning,
                OrderStatus::Active,
            )
            .await?;
        }
        Some(OrderStatus::Active) => {}
        Some(other) => tracing::warn!(
            order_id = %service.order_id,
            status = %other,
            "order not provisioning, left as is"
        ),
        None => tracing::warn!(order_id = %service.order_id, "order missing"),
    }

    tx.commit().await?;

    tracing::info!(
        service_id = %service.id,
        hostname = %machine.hostname,
        ip = %machine.ip_address,
        "provisioning completed"
    );
    Ok(ProvisionOutcome::Activated(machine))
}
