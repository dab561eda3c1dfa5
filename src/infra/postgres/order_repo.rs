use {
    crate::domain::{error::PipelineError, order::OrderStatus},
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub currency: String,
    pub total_cents: i64,
}

pub struct OrderItemRow {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub billing_cycle: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// Serialize all fulfillment work for one order, then load it row-locked.
pub async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<OrderRow>, PipelineError> {
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut **tx)
        .await?;

    // Advisory lock works before any dependent rows exist.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(order_id.to_string())
        .execute(&mut **tx)
        .await?;

    let row = sqlx::query_as::<_, (Uuid, Uuid, String, String, i64)>(
        "SELECT id, user_id, status, currency, total_cents FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|(id, user_id, status, currency, total_cents)| {
        Ok(OrderRow {
            id,
            user_id,
            status: OrderStatus::try_from(status.as_str())?,
            currency,
            total_cents,
        })
    })
    .transpose()
}

pub async fn items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Vec<OrderItemRow>, PipelineError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, i32, i64)>(
        r#"
        SELECT id, plan_id, COALESCE(NULLIF(plan_snapshot->>'name', ''), 'Service'),
               billing_cycle, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, plan_id, plan_name, billing_cycle, quantity, unit_price_cents)| OrderItemRow {
                id,
                plan_id,
                plan_name,
                billing_cycle,
                quantity,
                unit_price_cents,
            },
        )
        .collect())
}

/// Move an order along a lifecycle edge. The edge is checked against the
/// transition table first; the UPDATE is guarded by the expected current
/// status, so `false` means someone else already moved the order.
pub async fn transition(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool, PipelineError> {
    let to = from.transition_to(to)?;
    let result = sqlx::query(
        "UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
    )
    .bind(order_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn current_status(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<OrderStatus>, PipelineError> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;
    status
        .map(|s| OrderStatus::try_from(s.as_str()))
        .transpose()
}

/// Compensation: `provisioning -> paid`, unless another job for the same
/// order is still live or already finished.
pub async fn revert_to_paid(pool: &PgPool, order_id: Uuid) -> Result<bool, PipelineError> {
    let to = OrderStatus::Provisioning.compensate_to(OrderStatus::Paid)?;
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $2, updated_at = now()
        WHERE id = $1
          AND status = 'provisioning'
          AND NOT EXISTS (
              SELECT 1
              FROM provisioning_jobs j
              JOIN services s ON s.id = j.service_id
              JOIN order_items oi ON oi.id = s.order_item_id
              WHERE oi.order_id = $1
                AND j.status IN ('pending', 'running', 'completed')
          )
        "#,
    )
    .bind(order_id)
    .bind(to.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
