//! HTTP handlers, one module per application area.

pub mod admin;
pub mod api;
pub mod app;
pub mod auth;
pub mod bai;
pub mod recon;

use crate::models::SessionUser;
use crate::services::policy::{authorize, Resource};
use axum::response::{IntoResponse, Redirect, Response};
use cashapp_core::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "flash";

/// A one-shot message rendered on the next page view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: String,
    pub message: String,
}

/// Queue a flash message on the session.
pub async fn flash(session: &Session, kind: &str, message: impl Into<String>) {
    let mut queue: Vec<Flash> = session.get(FLASH_KEY).await.unwrap_or(None).unwrap_or_default();
    queue.push(Flash {
        kind: kind.to_string(),
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_KEY, queue).await {
        tracing::warn!(error = %e, "could not store flash message");
    }
}

/// Drain the flash queue for rendering.
pub async fn take_flash(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default()
}

/// Module-level access check for HTML pages. Denial becomes a flash plus
/// a redirect to the dashboard rather than a bare 403.
pub async fn require_access(
    session: &Session,
    user: &SessionUser,
    resource: Resource,
) -> Result<(), Response> {
    if authorize(user, resource).is_err() {
        flash(
            session,
            "error",
            format!("You do not have access to the {} module", resource.as_str()),
        )
        .await;
        return Err(Redirect::to("/dashboard").into_response());
    }
    Ok(())
}

/// Unwrap a page's query result. A failure becomes an error flash and the
/// fallback value, so HTML routes render an empty page instead of a JSON
/// error body.
pub async fn page_data<T>(
    session: &Session,
    what: &str,
    result: Result<T, AppError>,
    fallback: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "error loading {what}");
            flash(session, "error", format!("Error loading {what}: {err}")).await;
            fallback
        }
    }
}

/// Parse an ISO date from an HTML date input; empty or malformed values
/// are treated as absent.
pub fn parse_query_date(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Normalize an optional text input: trimmed, empty becomes None.
pub fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[tokio::test]
    async fn failed_page_query_flashes_and_renders_empty() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let rows: Vec<i32> = page_data(
            &session,
            "payments",
            Err(AppError::DatabaseError(anyhow::anyhow!("pool exhausted"))),
            Vec::new(),
        )
        .await;

        assert!(rows.is_empty());
        let flashes = take_flash(&session).await;
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].kind, "error");
        assert!(flashes[0].message.starts_with("Error loading payments"));
    }

    #[tokio::test]
    async fn successful_page_query_passes_through_without_flash() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let rows = page_data(&session, "payments", Ok(vec![1, 2]), Vec::new()).await;

        assert_eq!(rows, vec![1, 2]);
        assert!(take_flash(&session).await.is_empty());
    }

    #[test]
    fn query_dates_parse_iso_only() {
        assert_eq!(
            parse_query_date(&Some("2024-03-05".to_string())),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_query_date(&Some("".to_string())), None);
        assert_eq!(parse_query_date(&Some("05/03/2024".to_string())), None);
        assert_eq!(parse_query_date(&None), None);
    }

    #[test]
    fn non_empty_trims_and_drops_blanks() {
        assert_eq!(non_empty(&Some("  x ".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(&Some("   ".to_string())), None);
        assert_eq!(non_empty(&None), None);
    }
}
