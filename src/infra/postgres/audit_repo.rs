use {
    crate::domain::{audit::NewAuditEntry, error::PipelineError},
    sqlx::PgPool,
    uuid::Uuid,
};

pub async fn insert_audit_entry(pool: &PgPool, entry: &NewAuditEntry) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, entity_type, entity_id, action, actor, detail)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(&entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.action)
    .bind(&entry.actor)
    .bind(&entry.detail)
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether a reminder with this `days_left` already went out today.
pub async fn reminder_sent_today(
    pool: &PgPool,
    service_id: Uuid,
    days_left: i64,
) -> Result<bool, PipelineError> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM audit_logs
            WHERE action = 'renewal_reminder_sent'
              AND entity_type = 'service'
              AND entity_id = $1
              AND created_at::date = CURRENT_DATE
              AND (detail->>'days_left')::bigint = $2
        )
        "#,
    )
    .bind(service_id)
    .bind(days_left)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}
