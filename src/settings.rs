use {
    crate::{
        domain::error::PipelineError,
        infra::postgres::settings_repo::{self, RELOAD_CHANNEL},
    },
    sqlx::{PgPool, postgres::PgListener},
    std::{collections::HashMap, sync::Arc, time::Duration},
    tokio::sync::watch,
};

const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw env-sourced fallbacks, keyed like `system_settings`.
#[derive(Debug, Clone, Default)]
pub struct SettingsDefaults {
    pub renewal_webhook_url: String,
    pub renewal_webhook_token: String,
    pub notification_timeout_secs: String,
}

/// One immutable snapshot of the live settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub renewal_webhook_url: Option<String>,
    pub renewal_webhook_token: Option<String>,
    pub notification_timeout: Duration,
}

impl Settings {
    /// Database value wins unless it is empty, then the env default.
    pub fn resolve(db: &HashMap<String, String>, defaults: &SettingsDefaults) -> Self {
        let get = |key: &str, fallback: &str| -> Option<String> {
            db.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .or_else(|| Some(fallback.trim()).filter(|v| !v.is_empty()))
                .map(str::to_string)
        };

        let notification_timeout = get("notification_timeout_secs", &defaults.notification_timeout_secs)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_NOTIFICATION_TIMEOUT);

        Self {
            renewal_webhook_url: get("renewal_webhook_url", &defaults.renewal_webhook_url),
            renewal_webhook_token: get("renewal_webhook_token", &defaults.renewal_webhook_token),
            notification_timeout,
        }
    }
}

/// Publishes the current settings snapshot. Readers clone an `Arc` and never
/// block a reload; a reload replaces the whole snapshot at once.
pub struct SettingsStore {
    pool: PgPool,
    defaults: SettingsDefaults,
    snapshot: watch::Sender<Arc<Settings>>,
}

impl SettingsStore {
    pub fn new(pool: PgPool, defaults: SettingsDefaults) -> Self {
        let initial = Settings::resolve(&HashMap::new(), &defaults);
        let (snapshot, _) = watch::channel(Arc::new(initial));
        Self {
            pool,
            defaults,
            snapshot,
        }
    }

    pub fn current(&self) -> Arc<Settings> {
        self.snapshot.borrow().clone()
    }

    pub async fn reload(&self) -> Result<Arc<Settings>, PipelineError> {
        let rows = settings_repo::load_all(&self.pool).await?;
        let fresh = Arc::new(Settings::resolve(&rows, &self.defaults));
        self.snapshot.send_replace(fresh.clone());
        tracing::debug!("settings reloaded");
        Ok(fresh)
    }

    pub async fn run_periodic_reload(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            if let Err(e) = self.reload().await {
                tracing::error!(error = %e, "periodic settings reload failed");
            }
        }
    }

    /// Reload whenever another process sends `NOTIFY settings_reload`.
    /// Reconnects with exponential backoff when the connection drops.
    pub async fn run_listener(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
        let mut reconnect_delay = Duration::from_secs(1);
        let mut listener: Option<PgListener> = None;

        loop {
            if listener.is_none() {
                match connect_listener(&self.pool).await {
                    Ok(fresh) => {
                        tracing::info!(channel = RELOAD_CHANNEL, "settings listener connected");
                        reconnect_delay = Duration::from_secs(1);
                        listener = Some(fresh);
                        // Anything published while disconnected was missed.
                        if let Err(e) = self.reload().await {
                            tracing::error!(error = %e, "settings reload failed");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "settings listener connect failed");
                        tokio::select! {
                            _ = shutdown.changed() => return,
                            _ = tokio::time::sleep(reconnect_delay) => {}
                        }
                        reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
                        continue;
                    }
                }
            }
            let Some(active) = listener.as_mut() else {
                continue;
            };

            let notification = tokio::select! {
                _ = shutdown.changed() => return,
                notification = active.recv() => notification,
            };

            match notification {
                Ok(_) => {
                    if let Err(e) = self.reload().await {
                        tracing::error!(error = %e, "settings reload failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "settings listener dropped, reconnecting");
                    listener = None;
                }
            }
        }
    }
}

async fn connect_listener(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(RELOAD_CHANNEL).await?;
    Ok(listener)
}
