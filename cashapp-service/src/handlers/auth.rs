use crate::handlers::{flash, take_flash, Flash};
use crate::middleware::auth::SESSION_USER_KEY;
use crate::models::SessionUser;
use crate::utils::password::Password;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use cashapp_core::error::AppError;
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub flashes: Vec<Flash>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn login_page(session: Session) -> impl IntoResponse {
    let flashes = take_flash(&session).await;
    LoginTemplate { flashes }
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        flash(&session, "error", "Username and password are required").await;
        return Ok(Redirect::to("/login").into_response());
    }

    let password = Password::new(form.password);
    let verified = match state.users.verify_login(username, &password).await {
        Ok(verified) => verified,
        Err(e) => {
            tracing::error!(error = %e, "login verification failed");
            flash(&session, "error", "Login is temporarily unavailable").await;
            return Ok(Redirect::to("/login").into_response());
        }
    };
    match verified {
        Some(user) => {
            let session_user = SessionUser::from(&user);
            // New session id on privilege change
            session.cycle_id().await.map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Session error: {}", e))
            })?;
            session
                .insert(SESSION_USER_KEY, &session_user)
                .await
                .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session error: {}", e)))?;

            tracing::info!(user_id = user.id, username = %user.username, "user logged in");
            Ok(Redirect::to("/dashboard").into_response())
        }
        None => {
            flash(&session, "error", "Invalid username or password").await;
            Ok(Redirect::to("/login").into_response())
        }
    }
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = session.flush().await {
        tracing::warn!(error = %e, "could not flush session on logout");
    }
    Redirect::to("/login")
}
