//! Session-based authentication middleware.
//!
//! Protected routes require a `SessionUser` in the session store; anyone
//! without one is sent to the login page. The user is placed in request
//! extensions for handlers to extract.

use crate::models::SessionUser;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Session key holding the authenticated user.
pub const SESSION_USER_KEY: &str = "user";

pub async fn require_auth(
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user: Option<SessionUser> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => Ok(Redirect::to("/login").into_response()),
    }
}
