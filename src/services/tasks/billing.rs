use {
    super::TaskContext,
    crate::{
        domain::{
            audit::NewAuditEntry,
            error::PipelineError,
            order::renewal_due_date,
            provider::{RenewalNotice, WebhookTarget},
            task::{GenerateInvoicePayload, RenewalReminderPayload, TaskKind},
        },
        infra::postgres::{audit_repo, invoice_repo, service_repo, task_repo},
    },
    chrono::{DateTime, Utc},
    serde_json::json,
    sqlx::PgPool,
    uuid::Uuid,
};

/// Days a reminder goes out on, counted before expiry.
pub const REMINDER_DAYS: [i64; 3] = [7, 3, 1];

/// Services expiring within this many days are considered by a scan.
const SCAN_WINDOW_DAYS: i32 = 8;

/// Whole days until `expires_at`, rounded up. Zero once expired.
pub fn days_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (expires_at - now).num_seconds();
    if secs <= 0 {
        return 0;
    }
    (secs + 86_399) / 86_400
}

pub fn is_reminder_day(days_left: i64) -> bool {
    REMINDER_DAYS.contains(&days_left)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    pub deduplicated: usize,
    pub skipped: bool,
}

/// Single-service mode when the payload names a service, scan mode
/// otherwise. Every reminder writes an audit row whether or not delivery
/// succeeded; failed deliveries come back together as `Partial`.
pub async fn renewal_reminder(
    ctx: &TaskContext,
    payload: &RenewalReminderPayload,
) -> Result<ReminderReport, PipelineError> {
    let now = Utc::now();

    if let Some(service_id) = payload.service_id {
        let service = service_repo::get_detail(&ctx.pool, service_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("service {service_id}")))?;

        let days_left = match payload.days_left {
            Some(d) if d > 0 => d,
            _ => service
                .expires_at
                .map(|at| days_until(at, now))
                .filter(|d| *d > 0)
                .unwrap_or(1),
        };
        let user_id = payload.user_id.unwrap_or(service.user_id);

        send_one(ctx, service_id, user_id, days_left, now).await?;
        return Ok(ReminderReport {
            sent: 1,
            ..Default::default()
        });
    }

    let Some(lease) =
        task_repo::try_scan_lease(&ctx.pool, TaskKind::RenewalReminder.as_str()).await?
    else {
        tracing::info!("renewal scan already running, skipped");
        return Ok(ReminderReport {
            skipped: true,
            ..Default::default()
        });
    };

    let mut report = ReminderReport::default();
    let mut errors = Vec::new();

    for service in service_repo::expiring_within(&ctx.pool, SCAN_WINDOW_DAYS).await? {
        let days_left = days_until(service.expires_at, now);
        if !is_reminder_day(days_left) {
            continue;
        }

        match audit_repo::reminder_sent_today(&ctx.pool, service.id, days_left).await {
            Ok(true) => {
                report.deduplicated += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(service_id = %service.id, error = %e, "checking reminder dedup");
                errors.push(format!("service {}: {e}", service.id));
                continue;
            }
        }

        match send_one(ctx, service.id, service.user_id, days_left, now).await {
            Ok(()) => report.sent += 1,
            Err(e) => errors.push(format!("service {}: {e}", service.id)),
        }
    }

    lease.commit().await?;
    tracing::info!(
        sent = report.sent,
        deduplicated = report.deduplicated,
        failed = errors.len(),
        "renewal scan finished"
    );

    if errors.is_empty() {
        Ok(report)
    } else {
        Err(PipelineError::Partial(errors))
    }
}

/// Deliver one reminder and record it. The audit row is written even when
/// delivery fails, then the delivery error is returned.
async fn send_one(
    ctx: &TaskContext,
    service_id: Uuid,
    user_id: Uuid,
    days_left: i64,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let settings = ctx.settings.current();

    let (channel, delivery) = match settings.renewal_webhook_url.as_deref() {
        None => ("audit_log_only", None),
        Some(url) => {
            let target = WebhookTarget {
                url: url.to_string(),
                token: settings.renewal_webhook_token.clone(),
                timeout: settings.notification_timeout,
            };
            let notice = RenewalNotice {
                service_id,
                user_id,
                days_left,
                sent_at: now,
            };
            ("webhook", Some(ctx.notifier.notify(target, notice).await))
        }
    };

    let error = match &delivery {
        Some(Err(e)) => Some(e.to_string()),
        _ => None,
    };
    let sent = matches!(delivery, Some(Ok(())));
    // Only successful sends count toward the daily dedup.
    let action = if error.is_some() {
        "renewal_reminder_failed"
    } else {
        "renewal_reminder_sent"
    };

    let entry = NewAuditEntry::service(
        service_id,
        user_id,
        action,
        json!({
            "service_id": service_id,
            "days_left": days_left,
            "channel": channel,
            "sent": sent,
            "error": error,
        }),
    );
    audit_repo::insert_audit_entry(&ctx.pool, &entry).await?;

    match delivery {
        Some(Err(e)) => {
            tracing::warn!(service_id = %service_id, days_left, error = %e, "renewal reminder delivery failed");
            Err(e)
        }
        _ => {
            tracing::info!(service_id = %service_id, days_left, channel, "renewal reminder recorded");
            Ok(())
        }
    }
}

/// Issue a pending renewal invoice for a service. Returns the invoice id.
pub async fn generate_invoice(
    pool: &PgPool,
    payload: &GenerateInvoicePayload,
) -> Result<Uuid, PipelineError> {
    let service = service_repo::get_detail(pool, payload.service_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("service {}", payload.service_id)))?;

    let now = Utc::now();
    let renewal = invoice_repo::RenewalInvoice {
        user_id: payload.user_id,
        order_id: payload.order_id,
        billing_cycle: service.billing_cycle.clone(),
        unit_price_cents: service.unit_price_cents,
        currency: service.currency.clone(),
        due_date: renewal_due_date(&service.billing_cycle, now),
    };

    let mut tx = pool.begin().await?;
    let invoice_id = invoice_repo::create_renewal(&mut tx, &renewal, now).await?;
    tx.commit().await?;

    tracing::info!(
        service_id = %service.id,
        invoice_id = %invoice_id,
        due_date = %renewal.due_date,
        "renewal invoice generated"
    );
    Ok(invoice_id)
}
