pub mod billing;
pub mod lifecycle;
pub mod provision;

use {
    crate::{
        domain::{
            error::PipelineError,
            provider::{Provisioner, RenewalNotifier},
            task::{TaskKind, decode_payload},
        },
        settings::SettingsStore,
    },
    sqlx::PgPool,
    std::sync::Arc,
    tokio::sync::watch,
};

/// Everything a task handler may touch.
#[derive(Clone)]
pub struct TaskContext {
    pub pool: PgPool,
    pub provisioner: Arc<dyn Provisioner>,
    pub notifier: Arc<dyn RenewalNotifier>,
    pub settings: Arc<SettingsStore>,
}

/// Route a claimed task to its handler. `cancel` flips to `true` on worker
/// shutdown.
pub async fn dispatch(
    ctx: &TaskContext,
    kind: TaskKind,
    payload: &serde_json::Value,
    cancel: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    match kind {
        TaskKind::ProvisionVps => {
            let payload = decode_payload(kind, payload)?;
            provision::provision_vps(ctx, &payload, cancel).await?;
        }
        TaskKind::SuspendVps => {
            lifecycle::suspend_vps(&ctx.pool, &decode_payload(kind, payload)?).await?;
        }
        TaskKind::TerminateVps => {
            lifecycle::terminate_vps(&ctx.pool, &decode_payload(kind, payload)?).await?;
        }
        TaskKind::ExpireService => {
            lifecycle::expire_service(&ctx.pool, &decode_payload(kind, payload)?).await?;
        }
        TaskKind::RenewalReminder => {
            billing::renewal_reminder(ctx, &decode_payload(kind, payload)?).await?;
        }
        TaskKind::GenerateInvoice => {
            billing::generate_invoice(&ctx.pool, &decode_payload(kind, payload)?).await?;
        }
    }
    Ok(())
}
