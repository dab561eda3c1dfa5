use {
    crate::{
        domain::{
            error::PipelineError,
            job::{JobType, ProvisioningTask},
            order::{OrderStatus, service_expiry},
            payment::CheckoutCompleted,
            service::ServiceStatus,
        },
        infra::postgres::{
            invoice_repo, job_repo, order_repo, payment_repo,
            payment_repo::{CheckoutPayment, UpsertResult},
            service_repo,
        },
    },
    chrono::Utc,
    sqlx::PgPool,
};

/// Settle a completed checkout in one transaction: order paid, initial
/// invoice, payment, one service per order item and a provisioning job for
/// every service that still needs one.
///
/// Returns the jobs created by this call. They must be enqueued only after
/// this function returns, since the transaction has committed by then.
pub async fn fulfill_checkout(
    pool: &PgPool,
    checkout: &CheckoutCompleted,
) -> Result<Vec<ProvisioningTask>, PipelineError> {
    let order_id = checkout.order_id()?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let order = order_repo::lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {order_id}")))?;

    let mut status = order.status;
    if !status.is_paid_or_beyond() {
        order_repo::transition(&mut tx, order.id, status, OrderStatus::Paid).await?;
        tracing::info!(order_id = %order.id, from = %status, "order paid");
        status = OrderStatus::Paid;
    }

    let items = order_repo::items(&mut tx, order.id).await?;
    let invoice_id = invoice_repo::find_or_create_initial(&mut tx, &order, &items, now).await?;

    let amount_cents = checkout
        .amount_total
        .filter(|amount| *amount > 0)
        .unwrap_or(order.total_cents);

    let payment = payment_repo::upsert_checkout_payment(
        &mut tx,
        &CheckoutPayment {
            user_id: order.user_id,
            order_id: order.id,
            invoice_id,
            payment_intent_id: checkout.payment_intent_id.as_ref(),
            checkout_session_id: &checkout.session_id,
            amount_cents,
            currency: &order.currency,
        },
    )
    .await?;
    match payment {
        UpsertResult::Created(id) => tracing::info!(payment_id = %id, "payment recorded"),
        UpsertResult::Updated(id) => tracing::info!(payment_id = %id, "payment updated"),
        UpsertResult::Kept(id) => {
            tracing::warn!(payment_id = %id, "checkout replay on refunded payment, status kept")
        }
    }

    let mut created = Vec::new();
    for item in &items {
        let service = service_repo::find_or_create_for_item(
            &mut tx,
            order.user_id,
            item,
            service_expiry(&item.billing_cycle, now),
        )
        .await?;

        if matches!(service.status, ServiceStatus::Active | ServiceStatus::Terminated) {
            tracing::debug!(service_id = %service.id, status = %service.status, "service needs no provisioning");
            continue;
        }

        service_repo::set_provisioning(&mut tx, service.id).await?;

        match job_repo::create_if_no_live(&mut tx, service.id, JobType::ProvisionVps).await? {
            Some(job_id) => created.push(ProvisioningTask {
                job_id,
                service_id: service.id,
                order_id: order.id,
                plan_id: service.plan_id,
                user_id: service.user_id,
            }),
            None => {
                tracing::debug!(service_id = %service.id, "provisioning job already live")
            }
        }
    }

    if !created.is_empty() && status == OrderStatus::Paid {
        order_repo::transition(&mut tx, order.id, OrderStatus::Paid, OrderStatus::Provisioning)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(order_id = %order.id, jobs = created.len(), "checkout fulfilled");
    Ok(created)
}
