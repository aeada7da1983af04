//! User account storage and credential verification.

use crate::models::User;
use crate::utils::password::Password;
use cashapp_core::error::AppError;
use cashapp_core::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument, warn};

const USER_COLUMNS: &str = "id, username, email, full_name, is_admin, \
     has_bai_access, has_recon_access, is_active, created_at, last_login";

/// Input for creating a user. The password arrives in the clear and is
/// hashed here, never stored.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Password,
    pub is_admin: bool,
    pub has_bai_access: bool,
    pub has_recon_access: bool,
}

/// Editable user attributes. The username and password change through
/// dedicated operations.
#[derive(Debug)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub has_bai_access: bool,
    pub has_recon_access: bool,
    pub is_active: bool,
}

#[derive(FromRow)]
struct UserAuthRow {
    id: i32,
    username: String,
    email: Option<String>,
    full_name: Option<String>,
    password_hash: String,
    is_admin: bool,
    has_bai_access: bool,
    has_recon_access: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserAuthRow> for User {
    fn from(row: UserAuthRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            is_admin: row.is_admin,
            has_bai_access: row.has_bai_access,
            has_recon_access: row.has_recon_access,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login: row.last_login,
        }
    }
}

/// Repository for the users table.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Verify a login attempt. Returns the user on success, None when the
    /// username is unknown, inactive, or the password does not match.
    /// The caller cannot distinguish the three cases.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn verify_login(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["verify_login"])
            .start_timer();

        let row = sqlx::query_as::<_, UserAuthRow>(
            "SELECT id, username, email, full_name, password_hash, is_admin, \
             has_bai_access, has_recon_access, is_active, created_at, last_login \
             FROM users WHERE username = $1 AND is_active = TRUE",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if !password.matches(&row.password_hash) {
            warn!(username = %username, "failed login attempt");
            return Ok(None);
        }

        sqlx::query("UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(row.id)
            .execute(&self.pool)
            .await?;

        Ok(Some(row.into()))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User {} not found", id)))?;

        Ok(user)
    }

    /// All users, active and inactive, for the admin screen.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create(&self, input: &NewUser) -> Result<User, AppError> {
        let hash = input.password.hash()?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (username, email, full_name, password_hash, is_admin, has_bai_access, has_recon_access) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(hash.as_str())
        .bind(input.is_admin)
        .bind(input.has_bai_access)
        .bind(input.has_recon_access)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("Username '{}' already exists", input.username),
            ),
            _ => e.into(),
        })?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i32, update: &UserUpdate) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = $2, full_name = $3, is_admin = $4, \
             has_bai_access = $5, has_recon_access = $6, is_active = $7 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(update.is_admin)
        .bind(update.has_bai_access)
        .bind(update.has_recon_access)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User {} not found", id)))?;

        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn change_password(&self, id: i32, password: &Password) -> Result<(), AppError> {
        let hash = password.hash()?;

        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("User {} not found", id)));
        }

        info!(user_id = id, "password changed");
        Ok(())
    }

    /// Soft delete: the row stays for the audit trail, the login stops
    /// working.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("User {} not found", id)));
        }

        info!(user_id = id, "user deactivated");
        Ok(())
    }

    /// Ensure the bootstrap admin account exists. Run once at startup;
    /// a no-op when the username is already taken.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn seed_admin(&self, username: &str, password: &Password) -> Result<(), AppError> {
        let hash = password.hash()?;

        let result = sqlx::query(
            "INSERT INTO users \
             (username, full_name, password_hash, is_admin, has_bai_access, has_recon_access) \
             VALUES ($1, 'Administrator', $2, TRUE, TRUE, TRUE) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .bind(hash.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(username = %username, "bootstrap admin account created");
        }
        Ok(())
    }
}
