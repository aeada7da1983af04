//! Admin-only user management screens.

use crate::handlers::{flash, non_empty, page_data, require_access, take_flash, Flash};
use crate::models::{SessionUser, User};
use crate::services::policy::Resource;
use crate::services::users::{NewUser, UserUpdate};
use crate::utils::password::Password;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Extension, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use cashapp_core::error::AppError;
use serde::Deserialize;
use tower_sessions::Session;

pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub has_bai_access: bool,
    pub has_recon_access: bool,
    pub is_active: bool,
    pub last_login: String,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone().unwrap_or_default(),
            full_name: u.full_name.clone().unwrap_or_default(),
            is_admin: u.is_admin,
            has_bai_access: u.has_bai_access,
            has_recon_access: u.has_recon_access,
            is_active: u.is_active,
            last_login: u
                .last_login
                .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub users: Vec<UserView>,
}

#[derive(Template)]
#[template(path = "admin/user_form.html")]
pub struct UserFormTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    /// None for the create form, Some for editing.
    pub editing: Option<UserView>,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<String>,
    pub has_bai_access: Option<String>,
    pub has_recon_access: Option<String>,
    pub is_active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub password_confirm: String,
}

pub async fn users_list(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    let users = page_data(&session, "users", state.users.list().await, Vec::new()).await;
    let flashes = take_flash(&session).await;
    Ok(UsersTemplate {
        user,
        flashes,
        users: users.iter().map(UserView::from).collect(),
    }
    .into_response())
}

pub async fn user_new(
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    let flashes = take_flash(&session).await;
    Ok(UserFormTemplate {
        user,
        flashes,
        editing: None,
    }
    .into_response())
}

pub async fn user_create(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Form(form): Form<UserForm>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    let username = match non_empty(&form.username) {
        Some(u) => u,
        None => {
            flash(&session, "error", "Username is required").await;
            return Ok(Redirect::to("/admin/users/new").into_response());
        }
    };
    let password = match form.password.clone().filter(|p| !p.is_empty()) {
        Some(raw) => match Password::parse(raw) {
            Ok(password) => password,
            Err(reason) => {
                flash(&session, "error", reason).await;
                return Ok(Redirect::to("/admin/users/new").into_response());
            }
        },
        None => {
            flash(&session, "error", "Password is required").await;
            return Ok(Redirect::to("/admin/users/new").into_response());
        }
    };

    let input = NewUser {
        username: username.clone(),
        email: non_empty(&form.email),
        full_name: non_empty(&form.full_name),
        password,
        is_admin: form.is_admin.is_some(),
        has_bai_access: form.has_bai_access.is_some(),
        has_recon_access: form.has_recon_access.is_some(),
    };

    match state.users.create(&input).await {
        Ok(created) => {
            flash(&session, "success", format!("User '{}' created", created.username)).await;
            Ok(Redirect::to("/admin/users").into_response())
        }
        Err(AppError::Conflict(e)) => {
            flash(&session, "error", e.to_string()).await;
            Ok(Redirect::to("/admin/users/new").into_response())
        }
        Err(e) => {
            flash(&session, "error", format!("Could not create user: {e}")).await;
            Ok(Redirect::to("/admin/users/new").into_response())
        }
    }
}

pub async fn user_edit(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    let target = match state.users.get(id).await {
        Ok(target) => target,
        Err(e) => {
            flash(&session, "error", format!("Could not load user: {e}")).await;
            return Ok(Redirect::to("/admin/users").into_response());
        }
    };
    let flashes = take_flash(&session).await;
    Ok(UserFormTemplate {
        user,
        flashes,
        editing: Some(UserView::from(&target)),
    }
    .into_response())
}

pub async fn user_update(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<UserForm>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    // Admins cannot drop their own admin grant or lock themselves out.
    let (is_admin, is_active) = if id == user.user_id {
        (true, true)
    } else {
        (form.is_admin.is_some(), form.is_active.is_some())
    };

    let update = UserUpdate {
        email: non_empty(&form.email),
        full_name: non_empty(&form.full_name),
        is_admin,
        has_bai_access: form.has_bai_access.is_some(),
        has_recon_access: form.has_recon_access.is_some(),
        is_active,
    };

    match state.users.update(id, &update).await {
        Ok(updated) => {
            flash(&session, "success", format!("User '{}' updated", updated.username)).await
        }
        Err(e) => flash(&session, "error", format!("Could not update user: {e}")).await,
    }
    Ok(Redirect::to("/admin/users").into_response())
}

pub async fn user_change_password(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    if form.password != form.password_confirm {
        flash(&session, "error", "Passwords do not match").await;
        return Ok(Redirect::to(&format!("/admin/users/{id}/edit")).into_response());
    }
    let password = match Password::parse(form.password) {
        Ok(password) => password,
        Err(reason) => {
            flash(&session, "error", reason).await;
            return Ok(Redirect::to(&format!("/admin/users/{id}/edit")).into_response());
        }
    };

    match state.users.change_password(id, &password).await {
        Ok(()) => flash(&session, "success", "Password changed").await,
        Err(e) => flash(&session, "error", format!("Could not change password: {e}")).await,
    }
    Ok(Redirect::to("/admin/users").into_response())
}

pub async fn user_delete(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Admin).await {
        return Ok(denied);
    }

    if id == user.user_id {
        flash(&session, "error", "You cannot delete your own account").await;
        return Ok(Redirect::to("/admin/users").into_response());
    }

    match state.users.deactivate(id).await {
        Ok(()) => flash(&session, "success", "User deactivated").await,
        Err(e) => flash(&session, "error", format!("Could not deactivate user: {e}")).await,
    }
    Ok(Redirect::to("/admin/users").into_response())
}
