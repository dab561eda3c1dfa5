use {
    super::{SIGNATURE_HEADER, verify_event},
    crate::{
        AppState, adapters::api_errors::ApiError, domain::error::PipelineError,
        services::ingest::process_event,
    },
    axum::{Json, extract::State, http::HeaderMap},
};

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sig = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PipelineError::WebhookSignature("missing Stripe-Signature header".into()))?;

    let event = verify_event(&body, sig, &state.stripe_webhook_secret)?;

    tracing::Span::current()
        .record("event_id", tracing::field::display(&event.id))
        .record("event_type", tracing::field::display(&event.event_type));

    let outcome = process_event(&state.pool, &*state.queue, &event).await?;
    Ok(Json(serde_json::json!({"status": outcome.as_str()})))
}
