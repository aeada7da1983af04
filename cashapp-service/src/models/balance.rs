//! Balance snapshot models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::FromRow;

/// One balance snapshot row. `closingBooked` is the authoritative daily type.
#[derive(Debug, Clone, FromRow)]
pub struct BalanceRow {
    pub reference_date: NaiveDate,
    pub iban: String,
    pub balance_type: String,
    pub amount: Decimal,
    pub currency: Option<String>,
}
