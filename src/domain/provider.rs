use {
    super::error::PipelineError,
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin, time::Duration},
    tokio::sync::watch,
    uuid::Uuid,
};

/// What the provisioning backend is asked to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub service_id: Uuid,
    pub plan_id: Uuid,
    pub user_id: Uuid,
}

/// A machine that finished all provisioning steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedMachine {
    pub hostname: String,
    pub ip_address: String,
}

/// Compute backend. Implementations must stop at the next step boundary once
/// `cancel` flips to `true` and return `PipelineError::Provider`.
pub trait Provisioner: Send + Sync {
    fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: watch::Receiver<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<ProvisionedMachine, PipelineError>> + Send + '_>>;
}

/// Body of an outbound renewal reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalNotice {
    pub service_id: Uuid,
    pub user_id: Uuid,
    pub days_left: i64,
    pub sent_at: DateTime<Utc>,
}

/// Where reminders go, resolved from the live settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

pub trait RenewalNotifier: Send + Sync {
    fn notify(
        &self,
        target: WebhookTarget,
        notice: RenewalNotice,
    ) -> Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + '_>>;
}
