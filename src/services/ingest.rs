use {
    super::{enqueuer, fulfillment, sync},
    crate::{
        domain::{
            error::PipelineError,
            payment::{GatewayEvent, IngestOutcome, VerifiedEvent},
            task::TaskQueue,
        },
        infra::postgres::ledger_repo,
    },
    sqlx::PgPool,
};

/// Run one verified gateway event through the idempotency ledger and its
/// handler.
///
/// A payload that does not parse is rejected before the ledger is touched.
/// A handler failure is recorded on the ledger row and surfaced as
/// `EventFailed` so the gateway redelivers; the redelivery re-claims the row.
pub async fn process_event(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    event: &VerifiedEvent,
) -> Result<IngestOutcome, PipelineError> {
    let parsed = GatewayEvent::parse(event)?;

    let Some(ledger_id) = ledger_repo::claim_event(pool, event).await? else {
        tracing::info!("duplicate event, already processed");
        return Ok(IngestOutcome::Duplicate);
    };

    match dispatch(pool, queue, &parsed).await {
        Ok(outcome) => {
            ledger_repo::mark_processed(pool, ledger_id).await?;
            tracing::info!(outcome = outcome.as_str(), "event processed");
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!(error = %e, "event handler failed");
            if let Err(ledger_err) = ledger_repo::mark_failed(pool, ledger_id, &e.to_string()).await
            {
                tracing::error!(error = %ledger_err, "recording event failure");
            }
            Err(PipelineError::EventFailed {
                event_id: event.id.to_string(),
                message: e.to_string(),
            })
        }
    }
}

async fn dispatch(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    event: &GatewayEvent,
) -> Result<IngestOutcome, PipelineError> {
    match event {
        GatewayEvent::CheckoutCompleted(checkout) => {
            let tasks = fulfillment::fulfill_checkout(pool, checkout).await?;
            enqueuer::enqueue_provisioning(pool, queue, &tasks).await?;
        }
        GatewayEvent::PaymentFailed { payment_intent_id } => {
            sync::payment_failed(pool, payment_intent_id).await?;
        }
        GatewayEvent::Refund(refund) => sync::sync_refund(pool, refund).await?,
        GatewayEvent::Dispute(dispute) => sync::sync_dispute(pool, dispute).await?,
        GatewayEvent::Unhandled => return Ok(IngestOutcome::Ignored),
    }
    Ok(IngestOutcome::Processed)
}
