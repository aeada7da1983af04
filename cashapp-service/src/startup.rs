//! Application startup and lifecycle management.

use crate::config::CashappConfig;
use crate::handlers::{admin, api, app, auth, bai, recon};
use crate::middleware::auth::require_auth;
use crate::services::database::Database;
use crate::utils::password::Password;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use cashapp_core::error::AppError;
use cashapp_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;

/// CSV uploads can be tens of megabytes.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application: connect, migrate, seed the admin account
    /// and bind the listener (port 0 binds a random port for testing).
    pub async fn build(config: CashappConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let state = AppState::new(config.clone(), db);
        state
            .users
            .seed_admin(
                &config.bootstrap.admin_username,
                &Password::new(config.bootstrap.admin_password.clone()),
            )
            .await?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let router = build_router(state);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the process is stopped.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        info!("Starting cashapp-service on port {}", self.port);
        axum::serve(self.listener, self.router)
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Server error: {}", e)))?;
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.config.session.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            state.config.session.expiry_hours,
        )));

    let protected = Router::new()
        .route("/dashboard", get(app::dashboard))
        .route("/bai/transactions", get(bai::transactions))
        .route("/bai/balances", get(bai::balances))
        .route("/bai/reports/reconciliation", get(bai::reconciliation_report))
        .route("/bai/statements", get(bai::statements))
        .route("/bai/statements/pdf", get(bai::statement_pdf))
        .route("/bai/exports/status", get(bai::export_status))
        .route(
            "/bai/exports/config",
            get(bai::export_config_page).post(bai::export_config_submit),
        )
        .route("/bai/api/transaction-chart", get(api::transaction_chart))
        .route("/recon", get(recon::dashboard))
        .route("/recon/payments", get(recon::payments))
        .route("/recon/reconciliation", get(recon::reconciliation))
        .route("/recon/reports", get(recon::reports))
        .route(
            "/recon/import",
            get(recon::import_page).post(recon::import_submit),
        )
        .route("/recon/import/history", get(recon::import_history))
        .route("/recon/settings", get(recon::settings))
        .route("/recon/api/payment/:id/:paydate", get(api::payment_detail))
        .route("/recon/api/stats/daily/:days", get(api::daily_stats))
        .route("/recon/api/stats/brands/:days", get(api::brand_stats))
        .route("/admin/users", get(admin::users_list))
        .route(
            "/admin/users/new",
            get(admin::user_new).post(admin::user_create),
        )
        .route(
            "/admin/users/:id/edit",
            get(admin::user_edit).post(admin::user_update),
        )
        .route("/admin/users/:id/password", post(admin::user_change_password))
        .route("/admin/users/:id/delete", post(admin::user_delete))
        .route_layer(from_fn(require_auth));

    Router::new()
        .route("/", get(app::index))
        .route("/health", get(app::health_check))
        .route("/metrics", get(app::metrics))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .route("/logout", get(auth::logout_handler))
        .merge(protected)
        .nest_service("/static", ServeDir::new("cashapp-service/static"))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
