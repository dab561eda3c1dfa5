use {
    super::order_repo::OrderItemRow,
    crate::domain::{error::PipelineError, service::ServiceStatus},
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

pub struct ServiceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: ServiceStatus,
}

/// Service joined with the order line it was bought on.
pub struct ServiceDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    pub status: ServiceStatus,
    pub billing_cycle: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A service that is due for a renewal reminder.
pub struct ExpiringService {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// One service per order item; concurrent creators converge on the same row.
pub async fn find_or_create_for_item(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    item: &OrderItemRow,
    expires_at: DateTime<Utc>,
) -> Result<ServiceRow, PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO services (id, user_id, order_item_id, plan_id, status, expires_at)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        ON CONFLICT (order_item_id) DO NOTHING
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(item.id)
    .bind(item.plan_id)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    let (id, user_id, plan_id, status) = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String)>(
        "SELECT id, user_id, plan_id, status FROM services WHERE order_item_id = $1 FOR UPDATE",
    )
    .bind(item.id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(ServiceRow {
        id,
        user_id,
        plan_id,
        status: ServiceStatus::try_from(status.as_str())?,
    })
}

pub async fn set_provisioning(
    tx: &mut Transaction<'_, Postgres>,
    service_id: Uuid,
) -> Result<(), PipelineError> {
    sqlx::query(
        "UPDATE services SET status = 'provisioning', updated_at = now() WHERE id = $1 AND status NOT IN ('active', 'terminated')",
    )
    .bind(service_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get_detail(pool: &PgPool, service_id: Uuid) -> Result<Option<ServiceDetail>, PipelineError> {
    let row = sqlx::query_as::<
        _,
        (Uuid, Uuid, Uuid, Uuid, String, String, i64, String, Option<DateTime<Utc>>),
    >(
        r#"
        SELECT s.id, s.user_id, s.plan_id, oi.order_id, s.status,
               oi.billing_cycle, oi.unit_price_cents, o.currency, s.expires_at
        FROM services s
        JOIN order_items oi ON oi.id = s.order_item_id
        JOIN orders o ON o.id = oi.order_id
        WHERE s.id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await?;

    row.map(
        |(id, user_id, plan_id, order_id, status, billing_cycle, unit_price_cents, currency, expires_at)| {
            Ok(ServiceDetail {
                id,
                user_id,
                plan_id,
                order_id,
                status: ServiceStatus::try_from(status.as_str())?,
                billing_cycle,
                unit_price_cents,
                currency,
                expires_at,
            })
        },
    )
    .transpose()
}

/// Row-locked status read inside a transaction.
pub async fn lock_status(
    tx: &mut Transaction<'_, Postgres>,
    service_id: Uuid,
) -> Result<Option<ServiceStatus>, PipelineError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM services WHERE id = $1 FOR UPDATE")
            .bind(service_id)
            .fetch_optional(&mut **tx)
            .await?;
    status
        .map(|s| ServiceStatus::try_from(s.as_str()))
        .transpose()
}

pub async fn activate(
    tx: &mut Transaction<'_, Postgres>,
    service_id: Uuid,
    hostname: &str,
    ip_address: &str,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE services
        SET status = 'active',
            hostname = $2,
            ip_address = $3,
            metadata = metadata || jsonb_build_object('provisioned_at', now()),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(service_id)
    .bind(hostname)
    .bind(ip_address)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Returns `false` when the service does not exist or is already terminated.
pub async fn suspend(pool: &PgPool, service_id: Uuid, reason: &str) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET status = 'suspended',
            metadata = metadata || jsonb_build_object('suspended_at', now(), 'suspend_reason', $2::text),
            updated_at = now()
        WHERE id = $1 AND status <> 'terminated'
        "#,
    )
    .bind(service_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// `cancelled_at` is stamped on the first termination only.
pub async fn terminate(pool: &PgPool, service_id: Uuid) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET status = 'terminated',
            cancelled_at = COALESCE(cancelled_at, now()),
            metadata = CASE
                WHEN status = 'terminated' THEN metadata
                ELSE metadata || jsonb_build_object('terminated_at', now())
            END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(service_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Suspend an active service whose paid period is over. `false` if the
/// service was not active or not yet expired.
pub async fn expire(pool: &PgPool, service_id: Uuid) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET status = 'suspended',
            metadata = metadata || jsonb_build_object('expired_at', now()),
            updated_at = now()
        WHERE id = $1
          AND status = 'active'
          AND expires_at IS NOT NULL
          AND expires_at <= now()
        "#,
    )
    .bind(service_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn expired_ids(pool: &PgPool) -> Result<Vec<Uuid>, PipelineError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM services
        WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= now()
        ORDER BY expires_at
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Active services expiring within the next `days` days.
pub async fn expiring_within(pool: &PgPool, days: i32) -> Result<Vec<ExpiringService>, PipelineError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, DateTime<Utc>)>(
        r#"
        SELECT id, user_id, expires_at
        FROM services
        WHERE status = 'active'
          AND expires_at > now()
          AND expires_at <= now() + make_interval(days => $1)
        ORDER BY expires_at
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, expires_at)| ExpiringService {
            id,
            user_id,
            expires_at,
        })
        .collect())
}

/// Compensation: `provisioning -> pending`.
pub async fn revert_to_pending(pool: &PgPool, service_id: Uuid) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        "UPDATE services SET status = 'pending', updated_at = now() WHERE id = $1 AND status = 'provisioning'",
    )
    .bind(service_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

