use {
    super::enqueuer,
    crate::{
        domain::{
            error::PipelineError,
            job::{JobType, ProvisioningTask},
            order::OrderStatus,
            service::ServiceStatus,
            task::TaskQueue,
        },
        infra::postgres::{job_repo, order_repo, service_repo},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

/// Force a fresh provisioning job for a service.
///
/// Active services are refused with `Conflict`, terminated ones with
/// `IllegalTransition`. A `provisioning` service is accepted only while it
/// has no live job, which lets a half-compensated service converge.
pub async fn reprovision_service(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    service_id: Uuid,
) -> Result<Uuid, PipelineError> {
    let detail = service_repo::get_detail(pool, service_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("service {service_id}")))?;

    let mut tx = pool.begin().await?;

    let order = order_repo::lock_order(&mut tx, detail.order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {}", detail.order_id)))?;
    let status = service_repo::lock_status(&mut tx, service_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("service {service_id}")))?;

    match status {
        ServiceStatus::Active => {
            return Err(PipelineError::Conflict(format!(
                "service {service_id} is already active"
            )));
        }
        ServiceStatus::Terminated => {
            return Err(PipelineError::IllegalTransition {
                entity: "service",
                from: status.to_string(),
                to: ServiceStatus::Provisioning.to_string(),
            });
        }
        ServiceStatus::Pending | ServiceStatus::Provisioning | ServiceStatus::Suspended => {}
    }

    let job_id = job_repo::create_if_no_live(&mut tx, service_id, JobType::ProvisionVps)
        .await?
        .ok_or_else(|| {
            PipelineError::Conflict(format!("service {service_id} already has a live job"))
        })?;

    service_repo::set_provisioning(&mut tx, service_id).await?;
    if order.status == OrderStatus::Paid {
        order_repo::transition(&mut tx, order.id, OrderStatus::Paid, OrderStatus::Provisioning)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(
        service_id = %service_id,
        job_id = %job_id,
        from = %status,
        "reprovisioning requested"
    );

    let task = ProvisioningTask {
        job_id,
        service_id,
        order_id: order.id,
        plan_id: detail.plan_id,
        user_id: detail.user_id,
    };
    enqueuer::enqueue_provisioning(pool, queue, std::slice::from_ref(&task)).await?;

    Ok(job_id)
}
