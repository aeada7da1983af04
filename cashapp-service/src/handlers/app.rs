use crate::handlers::{take_flash, Flash};
use crate::models::SessionUser;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use cashapp_core::metrics::gather_metrics;
use serde_json::json;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
}

/// The root route only dispatches: dashboard when logged in, login page
/// otherwise.
pub async fn index(session: Session) -> impl IntoResponse {
    let user: Option<SessionUser> = session
        .get(crate::middleware::auth::SESSION_USER_KEY)
        .await
        .unwrap_or(None);

    if user.is_some() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

pub async fn dashboard(
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> impl IntoResponse {
    let flashes = take_flash(&session).await;
    DashboardTemplate { user, flashes }
}

/// Health check endpoint for liveness probes. Reports the database state
/// without failing the probe on a degraded pool.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "unavailable",
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "cashapp-service",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
        })),
    )
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        gather_metrics(),
    )
}
