use {
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
    vps_billing::{
        adapters::{notifier::HttpRenewalNotifier, provisioner::SimulatedProvisioner},
        config::AppConfig,
        infra::postgres::task_repo::PgTaskQueue,
        services::{scheduler, tasks::TaskContext, worker},
        settings::SettingsStore,
        shutdown::shutdown_signal,
    },
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.worker_concurrency as u32 + 5)
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

    let ctx = TaskContext {
        pool: pool.clone(),
        provisioner: Arc::new(SimulatedProvisioner::new(config.provision_step_delay)),
        notifier: Arc::new(HttpRenewalNotifier::default()),
        settings: settings.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pool_handle = tokio::spawn(worker::run_pool(
        ctx,
        config.worker_concurrency,
        shutdown_rx.clone(),
    ));
    let scheduler_handle = tokio::spawn(scheduler::run_scheduler(
        Arc::new(PgTaskQueue::new(pool.clone())),
        config.expire_scan_interval,
        config.renewal_scan_interval,
        shutdown_rx.clone(),
    ));
    let reaper_handle = tokio::spawn(worker::run_reaper(pool.clone(), shutdown_rx.clone()));
    let listener_handle = tokio::spawn(settings.clone().run_listener(shutdown_rx.clone()));
    let reload_handle = tokio::spawn(
        settings.run_periodic_reload(config.settings_reload_interval, shutdown_rx),
    );

    tracing::info!(concurrency = config.worker_concurrency, "worker running");
    shutdown_signal().await;
    shutdown_tx.send_replace(true);

    for (name, handle) in [
        ("pool", pool_handle),
        ("scheduler", scheduler_handle),
        ("reaper", reaper_handle),
        ("settings listener", listener_handle),
        ("settings reload", reload_handle),
    ] {
        if let Err(e) = handle.await {
            tracing::error!(component = name, error = %e, "shutdown join failed");
        }
    }

    pool.close().await;
    tracing::info!("worker stopped");
}
