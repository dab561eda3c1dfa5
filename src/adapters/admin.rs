use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::error::PipelineError,
        infra::postgres::settings_repo,
        services::reprovision::reprovision_service,
    },
    axum::{
        Json,
        extract::{Path, State},
        http::{HeaderMap, header::AUTHORIZATION},
    },
    subtle::ConstantTimeEq,
    uuid::Uuid,
};

/// Admin routes answer 401 unless a token is configured and the bearer matches.
fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), PipelineError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(PipelineError::Unauthorized);
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token_matches(expected, token) => Ok(()),
        _ => Err(PipelineError::Unauthorized),
    }
}

/// Constant-time comparison of a presented admin token. Only the length
/// check short-circuits.
pub fn token_matches(expected: &str, presented: &str) -> bool {
    let (expected, presented) = (expected.as_bytes(), presented.as_bytes());
    if expected.len() != presented.len() {
        return false;
    }
    expected.ct_eq(presented).into()
}

#[tracing::instrument(name = "admin_reprovision", skip(state, headers))]
pub async fn reprovision_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(service_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&headers, &state)?;

    let job_id = reprovision_service(&state.pool, &*state.queue, service_id).await?;
    Ok(Json(serde_json::json!({
        "status": "queued",
        "service_id": service_id,
        "job_id": job_id,
    })))
}

/// Reload this process's settings snapshot and tell the workers to do the same.
#[tracing::instrument(name = "admin_settings_reload", skip_all)]
pub async fn reload_settings_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&headers, &state)?;

    let settings = state.settings.reload().await?;
    settings_repo::notify_reload(&state.pool).await?;

    tracing::info!("settings reloaded");
    Ok(Json(serde_json::json!({
        "status": "reloaded",
        "renewal_webhook_configured": settings.renewal_webhook_url.is_some(),
        "notification_timeout_secs": settings.notification_timeout.as_secs(),
    })))
}
