use {crate::domain::error::PipelineError, sqlx::PgPool, std::collections::HashMap};

pub const RELOAD_CHANNEL: &str = "settings_reload";

pub async fn load_all(pool: &PgPool) -> Result<HashMap<String, String>, PipelineError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM system_settings")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Tell every listening process to reload its settings snapshot.
pub async fn notify_reload(pool: &PgPool) -> Result<(), PipelineError> {
    sqlx::query("SELECT pg_notify($1, '')")
        .bind(RELOAD_CHANNEL)
        .execute(pool)
        .await?;
    Ok(())
}
