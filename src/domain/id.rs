use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Gateway event identifier (`evt_xxx`), the idempotency-ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(PipelineError::MalformedPayload(format!(
                "EventId must start with evt_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Payment-intent identifier (`pi_xxx`). Refunds and disputes find their
/// local payment through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIntentId(String);

impl PaymentIntentId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if !id.starts_with("pi_") {
            return Err(PipelineError::MalformedPayload(format!(
                "PaymentIntentId must start with pi_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
