use {
    crate::domain::{
        error::PipelineError,
        provider::{RenewalNotice, RenewalNotifier, WebhookTarget},
    },
    reqwest::Client,
    serde::Serialize,
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

#[derive(Serialize)]
struct ReminderBody {
    event: &'static str,
    service_id: Uuid,
    user_id: Uuid,
    days_left: i64,
    sent_at: String,
}

/// Posts renewal reminders as JSON to the configured webhook.
#[derive(Clone, Default)]
pub struct HttpRenewalNotifier {
    client: Client,
}

impl HttpRenewalNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn post(&self, target: WebhookTarget, notice: RenewalNotice) -> Result<(), PipelineError> {
        let body = ReminderBody {
            event: "renewal_reminder",
            service_id: notice.service_id,
            user_id: notice.user_id,
            days_left: notice.days_left,
            sent_at: notice.sent_at.to_rfc3339(),
        };

        let mut request = self
            .client
            .post(&target.url)
            .timeout(target.timeout)
            .json(&body);
        if let Some(token) = target.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Notification(format!("renewal webhook: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Notification(format!(
                "renewal webhook returned {status}"
            )));
        }
        Ok(())
    }
}

impl RenewalNotifier for HttpRenewalNotifier {
    fn notify(
        &self,
        target: WebhookTarget,
        notice: RenewalNotice,
    ) -> Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + '_>> {
        Box::pin(self.post(target, notice))
    }
}
