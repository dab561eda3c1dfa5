use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("order reference missing from checkout metadata")]
    MissingOrderReference,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("illegal {entity} transition: {from} → {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("queue: {0}")]
    Queue(String),

    #[error("provider: {0}")]
    Provider(String),

    #[error("notification: {0}")]
    Notification(String),

    #[error("event {event_id} failed: {message}")]
    EventFailed { event_id: String, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("{}", .0.join("; "))]
    Partial(Vec<String>),
}

impl PipelineError {
    /// Errors that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MalformedPayload(_)
                | Self::NotFound(_)
                | Self::MissingOrderReference
        )
    }
}
