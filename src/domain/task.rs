use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{fmt, future::Future, pin::Pin},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "vps:provision")]
    ProvisionVps,
    #[serde(rename = "vps:suspend")]
    SuspendVps,
    #[serde(rename = "vps:terminate")]
    TerminateVps,
    #[serde(rename = "billing:renewal_reminder")]
    RenewalReminder,
    #[serde(rename = "billing:generate_invoice")]
    GenerateInvoice,
    #[serde(rename = "service:expire")]
    ExpireService,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        Self::ProvisionVps,
        Self::SuspendVps,
        Self::TerminateVps,
        Self::RenewalReminder,
        Self::GenerateInvoice,
        Self::ExpireService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisionVps => "vps:provision",
            Self::SuspendVps => "vps:suspend",
            Self::TerminateVps => "vps:terminate",
            Self::RenewalReminder => "billing:renewal_reminder",
            Self::GenerateInvoice => "billing:generate_invoice",
            Self::ExpireService => "service:expire",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TaskKind {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PipelineError::Validation(format!("unknown task type: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    Critical,
    Default,
    Low,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [Self::Critical, Self::Default, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Default => "default",
            Self::Low => "low",
        }
    }

    /// Relative share of worker polls (critical:default:low = 6:3:1).
    pub fn weight(&self) -> usize {
        match self {
            Self::Critical => 6,
            Self::Default => 3,
            Self::Low => 1,
        }
    }

    /// Queue poll order for the `tick`-th poll. The first entry follows the
    /// weights; the rest are fallbacks in priority order so an idle preferred
    /// queue never starves the others.
    pub fn poll_order(tick: usize) -> [QueueName; 3] {
        let total: usize = Self::ALL.iter().map(QueueName::weight).sum();
        let mut slot = tick % total;
        let mut preferred = Self::Critical;
        for queue in Self::ALL {
            if slot < queue.weight() {
                preferred = queue;
                break;
            }
            slot -= queue.weight();
        }

        let mut order = [preferred; 3];
        let mut i = 1;
        for queue in Self::ALL {
            if queue != preferred {
                order[i] = queue;
                i += 1;
            }
        }
        order
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for QueueName {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "critical" => Ok(Self::Critical),
            "default" => Ok(Self::Default),
            "low" => Ok(Self::Low),
            other => Err(PipelineError::Validation(format!("unknown queue: {other}"))),
        }
    }
}

// ── Payloads ───────────────────────────────────────────────────────────────
// Identifiers only; nothing secret ever goes into a task.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionVpsPayload {
    pub service_id: Uuid,
    pub order_id: Uuid,
    pub plan_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendVpsPayload {
    pub service_id: Uuid,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateVpsPayload {
    pub service_id: Uuid,
}

/// Empty payload (no service/user) selects scan mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalReminderPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateInvoicePayload {
    pub service_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
}

/// Empty payload selects scan mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireServicePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
}

/// Decodes a task payload; a payload that does not fit its task type can
/// never succeed, so it is a permanent error.
pub fn decode_payload<T: DeserializeOwned>(
    kind: TaskKind,
    payload: &serde_json::Value,
) -> Result<T, PipelineError> {
    let payload = if payload.is_null() {
        &serde_json::Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload.clone())
        .map_err(|e| PipelineError::MalformedPayload(format!("{kind} payload: {e}")))
}

/// A task ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub kind: TaskKind,
    pub queue: QueueName,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

impl NewTask {
    pub const PROVISION_MAX_ATTEMPTS: i32 = 5;
    pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

    pub fn provision(payload: &ProvisionVpsPayload) -> Result<Self, PipelineError> {
        Ok(Self {
            kind: TaskKind::ProvisionVps,
            queue: QueueName::Critical,
            payload: serde_json::to_value(payload)?,
            max_attempts: Self::PROVISION_MAX_ATTEMPTS,
        })
    }

    /// Scan-mode task with an empty payload, as fired by the scheduler.
    pub fn scan(kind: TaskKind) -> Self {
        Self {
            kind,
            queue: QueueName::Default,
            payload: serde_json::json!({}),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Submission side of the task queue.
pub trait TaskQueue: Send + Sync {
    fn enqueue(
        &self,
        task: NewTask,
    ) -> Pin<Box<dyn Future<Output = Result<Uuid, PipelineError>> + Send + '_>>;
}
