use {
    crate::{domain::error::PipelineError, settings::SettingsDefaults},
    std::{env, str::FromStr, time::Duration},
};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub stripe_webhook_secret: Option<String>,
    pub listen_addr: String,
    pub admin_token: Option<String>,
    pub worker_concurrency: usize,
    pub provision_step_delay: Duration,
    pub expire_scan_interval: Duration,
    pub renewal_scan_interval: Duration,
    pub settings_reload_interval: Duration,
    pub renewal_webhook_url: String,
    pub renewal_webhook_token: String,
    pub notification_timeout_secs: u64,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, PipelineError> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Validation(format!("{key} is not valid: {raw}"))),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        let database_url = optional("DATABASE_URL")
            .ok_or_else(|| PipelineError::Validation("DATABASE_URL must be set".into()))?;

        let worker_concurrency = parsed("WORKER_CONCURRENCY", 10usize)?;
        if worker_concurrency == 0 {
            return Err(PipelineError::Validation(
                "WORKER_CONCURRENCY must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            listen_addr: optional("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            admin_token: optional("ADMIN_TOKEN"),
            worker_concurrency,
            provision_step_delay: Duration::from_millis(parsed("PROVISION_STEP_DELAY_MS", 500)?),
            expire_scan_interval: Duration::from_secs(parsed("EXPIRE_SCAN_INTERVAL_SECS", 3600)?),
            renewal_scan_interval: Duration::from_secs(parsed("RENEWAL_SCAN_INTERVAL_SECS", 86_400)?),
            settings_reload_interval: Duration::from_secs(parsed(
                "SETTINGS_RELOAD_INTERVAL_SECS",
                60,
            )?),
            renewal_webhook_url: optional("RENEWAL_WEBHOOK_URL").unwrap_or_default(),
            renewal_webhook_token: optional("RENEWAL_WEBHOOK_TOKEN").unwrap_or_default(),
            notification_timeout_secs: parsed("NOTIFICATION_TIMEOUT_SECS", 5)?,
        })
    }

    /// Fallbacks for live settings whose database value is empty.
    pub fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            renewal_webhook_url: self.renewal_webhook_url.clone(),
            renewal_webhook_token: self.renewal_webhook_token.clone(),
            notification_timeout_secs: self.notification_timeout_secs.to_string(),
        }
    }
}
