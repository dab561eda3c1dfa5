use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// HTTP face of `PipelineError`.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            PipelineError::MissingOrderReference => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                self.0.to_string(),
            ),
            PipelineError::MalformedPayload(msg) => {
                (StatusCode::BAD_REQUEST, "malformed_payload", msg.clone())
            }
            PipelineError::WebhookSignature(_) => (
                StatusCode::BAD_REQUEST,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            PipelineError::IllegalTransition { .. } => (
                StatusCode::BAD_REQUEST,
                "illegal_transition",
                self.0.to_string(),
            ),
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            PipelineError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            PipelineError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "unauthorized".to_string(),
            ),
            PipelineError::EventFailed { event_id, message } => {
                tracing::error!(event_id = %event_id, "event processing failed: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "event_failed",
                    format!("event {event_id} failed, retry later"),
                )
            }
            other => {
                tracing::error!("internal error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
