use {
    crate::domain::{
        error::PipelineError,
        id::PaymentIntentId,
        payment::{DisputeSync, PaymentStatus, RefundRecord},
    },
    sqlx::{Postgres, Transaction},
    uuid::Uuid,
};

pub struct PaymentRow {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub status: PaymentStatus,
}

pub struct CheckoutPayment<'a> {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_intent_id: Option<&'a PaymentIntentId>,
    pub checkout_session_id: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpsertResult {
    Created(Uuid),
    Updated(Uuid),
    /// The payment was already refunded; the checkout replay left it alone.
    Kept(Uuid),
}

fn row(id: Uuid, order_id: Option<Uuid>, status: String) -> Result<PaymentRow, PipelineError> {
    Ok(PaymentRow {
        id,
        order_id,
        status: PaymentStatus::try_from(status.as_str())?,
    })
}

/// Lookup by payment-intent id, row-locked for the rest of the transaction.
pub async fn find_by_intent(
    tx: &mut Transaction<'_, Postgres>,
    payment_intent_id: &PaymentIntentId,
) -> Result<Option<PaymentRow>, PipelineError> {
    let found = sqlx::query_as::<_, (Uuid, Option<Uuid>, String)>(
        "SELECT id, order_id, status FROM payments WHERE stripe_payment_intent_id = $1 FOR UPDATE",
    )
    .bind(payment_intent_id.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    found
        .map(|(id, order_id, status)| row(id, order_id, status))
        .transpose()
}

async fn find_by_session(
    tx: &mut Transaction<'_, Postgres>,
    session_id: &str,
) -> Result<Option<PaymentRow>, PipelineError> {
    let found = sqlx::query_as::<_, (Uuid, Option<Uuid>, String)>(
        "SELECT id, order_id, status FROM payments WHERE stripe_checkout_session_id = $1 FOR UPDATE",
    )
    .bind(session_id)
    .fetch_optional(&mut **tx)
    .await?;

    found
        .map(|(id, order_id, status)| row(id, order_id, status))
        .transpose()
}

/// Upsert the settled checkout payment, matched by payment-intent id first
/// and checkout-session id second. A refunded payment is never regressed.
pub async fn upsert_checkout_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &CheckoutPayment<'_>,
) -> Result<UpsertResult, PipelineError> {
    let mut existing = None;
    if let Some(intent) = payment.payment_intent_id {
        existing = find_by_intent(tx, intent).await?;
    }
    if existing.is_none() {
        existing = find_by_session(tx, payment.checkout_session_id).await?;
    }

    match existing {
        None => {
            let id = Uuid::now_v7();
            sqlx::query(
                r#"
                INSERT INTO payments
                    (id, user_id, order_id, invoice_id, stripe_payment_intent_id,
                     stripe_checkout_session_id, amount_cents, currency, status, method)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'succeeded', 'card')
                "#,
            )
            .bind(id)
            .bind(payment.user_id)
            .bind(payment.order_id)
            .bind(payment.invoice_id)
            .bind(payment.payment_intent_id.map(PaymentIntentId::as_str))
            .bind(payment.checkout_session_id)
            .bind(payment.amount_cents)
            .bind(payment.currency)
            .execute(&mut **tx)
            .await?;
            Ok(UpsertResult::Created(id))
        }
        Some(found) if found.status == PaymentStatus::Refunded => Ok(UpsertResult::Kept(found.id)),
        Some(found) => {
            sqlx::query(
                r#"
                UPDATE payments
                SET user_id = $2,
                    order_id = $3,
                    invoice_id = $4,
                    stripe_payment_intent_id = COALESCE($5, stripe_payment_intent_id),
                    stripe_checkout_session_id = $6,
                    amount_cents = $7,
                    currency = $8,
                    status = 'succeeded',
                    method = 'card',
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(found.id)
            .bind(payment.user_id)
            .bind(payment.order_id)
            .bind(payment.invoice_id)
            .bind(payment.payment_intent_id.map(PaymentIntentId::as_str))
            .bind(payment.checkout_session_id)
            .bind(payment.amount_cents)
            .bind(payment.currency)
            .execute(&mut **tx)
            .await?;
            Ok(UpsertResult::Updated(found.id))
        }
    }
}

pub async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    status: PaymentStatus,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE payments SET status = $2, updated_at = now() WHERE id = $1")
        .bind(payment_id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn upsert_refund(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    refund: &RefundRecord,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO refunds (id, payment_id, stripe_refund_id, amount_cents, reason, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (stripe_refund_id) DO UPDATE
        SET amount_cents = EXCLUDED.amount_cents,
            reason = EXCLUDED.reason,
            status = EXCLUDED.status,
            updated_at = now()
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(payment_id)
    .bind(&refund.refund_id)
    .bind(refund.amount_cents)
    .bind(refund.reason.as_deref())
    .bind(refund.status.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_dispute(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    dispute: &DisputeSync,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO disputes
            (id, payment_id, stripe_dispute_id, amount_cents, reason, status, evidence_due_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (stripe_dispute_id) DO UPDATE
        SET amount_cents = EXCLUDED.amount_cents,
            reason = EXCLUDED.reason,
            status = EXCLUDED.status,
            evidence_due_by = EXCLUDED.evidence_due_by,
            updated_at = now()
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(payment_id)
    .bind(&dispute.dispute_id)
    .bind(dispute.amount_cents)
    .bind(dispute.reason.as_deref())
    .bind(dispute.status.as_str())
    .bind(dispute.evidence_due_by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
