//! cashapp-core: Shared infrastructure for the CashApp workspace.
pub mod error;
pub mod metrics;
pub mod middleware;

pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;
