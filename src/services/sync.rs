use {
    crate::{
        domain::{
            error::PipelineError,
            id::PaymentIntentId,
            order::OrderStatus,
            payment::{DisputeSync, PaymentStatus, RefundSync},
        },
        infra::postgres::{order_repo, payment_repo},
    },
    sqlx::PgPool,
};

/// `payment_intent.payment_failed`: only a pending payment can fail.
pub async fn payment_failed(
    pool: &PgPool,
    payment_intent_id: &PaymentIntentId,
) -> Result<(), PipelineError> {
    let mut tx = pool.begin().await?;

    let Some(payment) = payment_repo::find_by_intent(&mut tx, payment_intent_id).await? else {
        tracing::info!(payment_intent = %payment_intent_id, "no local payment, nothing to fail");
        return Ok(());
    };

    if payment.status.can_transition_to(&PaymentStatus::Failed) {
        payment_repo::set_status(&mut tx, payment.id, PaymentStatus::Failed).await?;
        tracing::info!(payment_id = %payment.id, "payment failed");
    } else {
        tracing::warn!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %PaymentStatus::Failed,
            "invalid status transition, logged as anomaly"
        );
    }

    tx.commit().await?;
    Ok(())
}

/// Upsert every refund of the charge and mark the payment refunded.
/// A refund for a payment we never recorded is a no-op.
pub async fn sync_refund(pool: &PgPool, refund: &RefundSync) -> Result<(), PipelineError> {
    let Some(intent) = refund.payment_intent_id.as_ref() else {
        tracing::info!("refund without payment intent, ignored");
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    let Some(payment) = payment_repo::find_by_intent(&mut tx, intent).await? else {
        tracing::info!(payment_intent = %intent, "refund for unknown payment, ignored");
        return Ok(());
    };

    for record in &refund.refunds {
        payment_repo::upsert_refund(&mut tx, payment.id, record).await?;
    }

    if refund.marks_payment_refunded() && payment.status != PaymentStatus::Refunded {
        if !payment.status.can_transition_to(&PaymentStatus::Refunded) {
            tracing::warn!(
                payment_id = %payment.id,
                from = %payment.status,
                "refund on a payment that never succeeded"
            );
        }
        payment_repo::set_status(&mut tx, payment.id, PaymentStatus::Refunded).await?;

        if let Some(order_id) = payment.order_id {
            if order_repo::current_status(&mut tx, order_id).await? == Some(OrderStatus::Paid) {
                order_repo::transition(&mut tx, order_id, OrderStatus::Paid, OrderStatus::Refunded)
                    .await?;
                tracing::info!(order_id = %order_id, "order refunded");
            }
        }
    }

    tx.commit().await?;
    tracing::info!(payment_id = %payment.id, refunds = refund.refunds.len(), "refund synced");
    Ok(())
}

pub async fn sync_dispute(pool: &PgPool, dispute: &DisputeSync) -> Result<(), PipelineError> {
    let Some(intent) = dispute.payment_intent_id.as_ref() else {
        tracing::info!(dispute_id = %dispute.dispute_id, "dispute without payment intent, ignored");
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    let Some(payment) = payment_repo::find_by_intent(&mut tx, intent).await? else {
        tracing::info!(payment_intent = %intent, "dispute for unknown payment, ignored");
        return Ok(());
    };

    payment_repo::upsert_dispute(&mut tx, payment.id, dispute).await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        dispute_id = %dispute.dispute_id,
        status = dispute.status.as_str(),
        "dispute synced"
    );
    Ok(())
}
