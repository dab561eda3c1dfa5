use {
    crate::domain::{error::PipelineError, payment::VerifiedEvent},
    sqlx::PgPool,
    uuid::Uuid,
};

/// Claim a gateway event for dispatch.
///
/// Returns the ledger row id when this delivery owns the dispatch: the event
/// is new, its previous attempt recorded an error, or a previous claim was
/// abandoned mid-flight. Returns `None` for a duplicate delivery.
pub async fn claim_event(pool: &PgPool, event: &VerifiedEvent) -> Result<Option<Uuid>, PipelineError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO payment_events (id, gateway_event_id, event_type, payload)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (gateway_event_id) DO UPDATE
        SET processed = false,
            error_message = NULL,
            processed_at = NULL,
            claimed_at = now(),
            deliveries = payment_events.deliveries + 1
        WHERE payment_events.error_message IS NOT NULL
           OR (NOT payment_events.processed
               AND payment_events.claimed_at < now() - interval '2 minutes')
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(event.id.as_str())
    .bind(&event.event_type)
    .bind(&event.payload)
    .fetch_optional(pool)
    .await?;

    if id.is_none() {
        sqlx::query(
            "UPDATE payment_events SET deliveries = deliveries + 1 WHERE gateway_event_id = $1",
        )
        .bind(event.id.as_str())
        .execute(pool)
        .await?;
    }

    Ok(id)
}

pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    sqlx::query(
        "UPDATE payment_events SET processed = true, error_message = NULL, processed_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), PipelineError> {
    sqlx::query(
        "UPDATE payment_events SET processed = true, error_message = $2, processed_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
