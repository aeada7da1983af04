//! Account reference data.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct AccountInfo {
    pub iban: String,
    pub owner_name: Option<String>,
    pub currency: Option<String>,
}
