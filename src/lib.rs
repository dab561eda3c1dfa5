pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod settings;
pub mod shutdown;

use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        routing::{get, post},
    },
    domain::task::TaskQueue,
    settings::SettingsStore,
    std::{sync::Arc, time::Duration},
    tower::ServiceBuilder,
    tower_http::timeout::TimeoutLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub stripe_webhook_secret: Arc<str>,
    pub queue: Arc<dyn TaskQueue>,
    pub settings: Arc<SettingsStore>,
    pub admin_token: Option<Arc<str>>,
}

/// The HTTP surface: health check, gateway webhook and admin triggers.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/webhooks/stripe",
            post(adapters::stripe::webhook::stripe_webhook_handler),
        )
        .route(
            "/admin/services/{id}/reprovision",
            post(adapters::admin::reprovision_handler),
        )
        .route(
            "/admin/settings/reload",
            post(adapters::admin::reload_settings_handler),
        )
        .with_state(state);
    with_request_limits(router)
}

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body cap and request timeout shared by every route. A request that runs
/// past `REQUEST_TIMEOUT` answers 408.
pub fn with_request_limits(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(DefaultBodyLimit::max(64 * 1024)) // gateway events are well under 64 KB
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                REQUEST_TIMEOUT,
            )),
    )
}
