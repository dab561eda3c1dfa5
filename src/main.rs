use {
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    vps_billing::{
        AppState, config::AppConfig, infra::postgres::task_repo::PgTaskQueue,
        settings::SettingsStore, shutdown::shutdown_signal,
    },
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let stripe_webhook_secret = config
        .stripe_webhook_secret
        .clone()
        .expect("STRIPE_WEBHOOK_SECRET must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let settings = Arc::new(SettingsStore::new(pool.clone(), config.settings_defaults()));
    if let Err(e) = settings.reload().await {
        tracing::warn!(error = %e, "initial settings load failed, using defaults");
    }

    let state = AppState {
        pool: pool.clone(),
        stripe_webhook_secret: stripe_webhook_secret.into(),
        queue: Arc::new(PgTaskQueue::new(pool)),
        settings,
        admin_token: config.admin_token.as_deref().map(Arc::from),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, vps_billing::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}
