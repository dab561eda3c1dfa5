use {
    super::error::PipelineError,
    super::id::{EventId, PaymentIntentId},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{collections::HashMap, fmt},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        Self::Pending,
        Self::Succeeded,
        Self::Failed,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// A failed card can still be paid by a later checkout; a refund is final.
    pub fn can_transition_to(&self, to: &PaymentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Succeeded)
                | (Self::Pending, Self::Failed)
                | (Self::Failed, Self::Succeeded)
                | (Self::Succeeded, Self::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(PipelineError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

impl RefundStatus {
    pub fn from_gateway(status: Option<&str>) -> Self {
        match status {
            Some("succeeded") => Self::Succeeded,
            Some("failed") | Some("canceled") => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    NeedsResponse,
    UnderReview,
    Won,
    Lost,
}

impl DisputeStatus {
    /// Collapses the gateway's dispute states; anything unrecognised still
    /// needs an operator response.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "won" => Self::Won,
            "lost" => Self::Lost,
            "warning_under_review" | "under_review" => Self::UnderReview,
            _ => Self::NeedsResponse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsResponse => "needs_response",
            Self::UnderReview => "under_review",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

/// Result of one webhook delivery, echoed back to the gateway as `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Processed,
    Duplicate,
    Ignored,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
        }
    }
}

/// A signature-checked gateway event envelope.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    pub id: EventId,
    pub event_type: String,
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
}

impl VerifiedEvent {
    pub fn from_json(body: &str) -> Result<Self, PipelineError> {
        let payload: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| PipelineError::MalformedPayload(format!("event body: {e}")))?;
        Self::from_value(payload)
    }

    pub fn from_value(payload: serde_json::Value) -> Result<Self, PipelineError> {
        let envelope: Envelope = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::MalformedPayload(format!("event envelope: {e}")))?;
        Ok(Self {
            id: EventId::new(envelope.id)?,
            event_type: envelope.event_type,
            payload,
        })
    }

    fn object<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        let object = self
            .payload
            .pointer("/data/object")
            .cloned()
            .ok_or_else(|| PipelineError::MalformedPayload("missing data.object".into()))?;
        serde_json::from_value(object).map_err(|e| {
            PipelineError::MalformedPayload(format!("{} object: {e}", self.event_type))
        })
    }
}

// ── Gateway object shapes ─────────────────────────────────────────────────
// Only the fields the pipeline reads. Nested references arrive either as a
// bare id or as the expanded object.

#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object { id } => id,
        }
    }
}

fn intent_id(reference: Option<&Expandable>) -> Result<Option<PaymentIntentId>, PipelineError> {
    reference
        .map(Expandable::id)
        .filter(|id| !id.is_empty())
        .map(PaymentIntentId::new)
        .transpose()
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<Expandable>,
    client_reference_id: Option<String>,
    metadata: Option<HashMap<String, String>>,
    amount_total: Option<i64>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct PaymentIntentObject {
    id: String,
}

#[derive(Deserialize)]
struct RefundObject {
    id: String,
    amount: i64,
    reason: Option<String>,
    status: Option<String>,
    payment_intent: Option<Expandable>,
}

#[derive(Deserialize)]
struct RefundList {
    #[serde(default)]
    data: Vec<RefundObject>,
}

#[derive(Deserialize)]
struct ChargeObject {
    payment_intent: Option<Expandable>,
    refunds: Option<RefundList>,
}

#[derive(Deserialize)]
struct EvidenceDetails {
    due_by: Option<i64>,
}

#[derive(Deserialize)]
struct DisputeObject {
    id: String,
    amount: i64,
    reason: Option<String>,
    status: String,
    payment_intent: Option<Expandable>,
    evidence_details: Option<EvidenceDetails>,
}

// ── Typed events ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub payment_intent_id: Option<PaymentIntentId>,
    pub order_ref: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

impl CheckoutCompleted {
    /// `metadata.order_id`, falling back to the client reference id.
    pub fn order_id(&self) -> Result<Uuid, PipelineError> {
        let reference = self
            .order_ref
            .as_deref()
            .ok_or(PipelineError::MissingOrderReference)?;
        Uuid::parse_str(reference)
            .map_err(|_| PipelineError::Validation(format!("order reference is not a uuid: {reference}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub status: RefundStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundSync {
    pub payment_intent_id: Option<PaymentIntentId>,
    pub refunds: Vec<RefundRecord>,
    /// The whole charge was reported refunded, not just one refund updated.
    pub charge_refunded: bool,
}

impl RefundSync {
    pub fn marks_payment_refunded(&self) -> bool {
        self.charge_refunded
            || self
                .refunds
                .iter()
                .any(|r| r.status == RefundStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisputeSync {
    pub payment_intent_id: Option<PaymentIntentId>,
    pub dispute_id: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub status: DisputeStatus,
    pub evidence_due_by: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    CheckoutCompleted(CheckoutCompleted),
    PaymentFailed { payment_intent_id: PaymentIntentId },
    Refund(RefundSync),
    Dispute(DisputeSync),
    Unhandled,
}

impl GatewayEvent {
    pub fn parse(event: &VerifiedEvent) -> Result<Self, PipelineError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSessionObject = event.object()?;
                let order_ref = session
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("order_id"))
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .or(session.client_reference_id.filter(|v| !v.is_empty()));
                Ok(Self::CheckoutCompleted(CheckoutCompleted {
                    payment_intent_id: intent_id(session.payment_intent.as_ref())?,
                    session_id: session.id,
                    order_ref,
                    amount_total: session.amount_total,
                    currency: session.currency,
                }))
            }
            "payment_intent.payment_failed" => {
                let intent: PaymentIntentObject = event.object()?;
                Ok(Self::PaymentFailed {
                    payment_intent_id: PaymentIntentId::new(intent.id)?,
                })
            }
            "charge.refunded" => {
                let charge: ChargeObject = event.object()?;
                let refunds = charge
                    .refunds
                    .map(|list| list.data)
                    .unwrap_or_default()
                    .into_iter()
                    .map(refund_record)
                    .collect();
                Ok(Self::Refund(RefundSync {
                    payment_intent_id: intent_id(charge.payment_intent.as_ref())?,
                    refunds,
                    charge_refunded: true,
                }))
            }
            "charge.refund.updated" => {
                let refund: RefundObject = event.object()?;
                Ok(Self::Refund(RefundSync {
                    payment_intent_id: intent_id(refund.payment_intent.as_ref())?,
                    refunds: vec![refund_record(refund)],
                    charge_refunded: false,
                }))
            }
            "charge.dispute.created" | "charge.dispute.updated" | "charge.dispute.closed" => {
                let dispute: DisputeObject = event.object()?;
                let evidence_due_by = dispute
                    .evidence_details
                    .and_then(|d| d.due_by)
                    .filter(|ts| *ts > 0)
                    .and_then(|ts| DateTime::from_timestamp(ts, 0));
                Ok(Self::Dispute(DisputeSync {
                    payment_intent_id: intent_id(dispute.payment_intent.as_ref())?,
                    status: DisputeStatus::from_gateway(&dispute.status),
                    dispute_id: dispute.id,
                    amount_cents: dispute.amount,
                    reason: dispute.reason.filter(|r| !r.is_empty()),
                    evidence_due_by,
                }))
            }
            _ => Ok(Self::Unhandled),
        }
    }
}

fn refund_record(refund: RefundObject) -> RefundRecord {
    RefundRecord {
        status: RefundStatus::from_gateway(refund.status.as_deref()),
        refund_id: refund.id,
        amount_cents: refund.amount,
        reason: refund.reason.filter(|r| !r.is_empty()),
    }
}

