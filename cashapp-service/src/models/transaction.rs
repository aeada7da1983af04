//! Bank transaction models (BAI side).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// A single booked bank transaction, as ingested by the upstream bank pipeline.
#[derive(Debug, Clone, FromRow)]
pub struct BankTransaction {
    pub booking_date: NaiveDate,
    pub iban: String,
    pub transaction_amount: Decimal,
    pub currency: Option<String>,
    pub creditor_iban: Option<String>,
    pub creditor_name: Option<String>,
    pub debtor_iban: Option<String>,
    pub debtor_name: Option<String>,
    pub description: Option<String>,
    pub transaction_type_code: Option<String>,
    pub transaction_type_name: Option<String>,
    pub entry_reference: Option<String>,
    pub end_to_end_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Per (day, iban) transaction aggregate for the dashboard and chart API.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionSummaryRow {
    pub date: NaiveDate,
    pub iban: String,
    pub transaction_count: i64,
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub net_amount: Decimal,
}

/// Filters for the transaction details view. All fields optional; `days`
/// only applies when no explicit from-date is given.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub days: i32,
    pub ibans: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub counterparty: Option<String>,
}

/// One line of a bank statement, ordered by entry reference.
#[derive(Debug, Clone, FromRow)]
pub struct StatementLine {
    pub value_date: Option<NaiveDate>,
    pub booking_date: NaiveDate,
    pub transaction_type_code: Option<String>,
    pub transaction_type_name: Option<String>,
    pub debtor_iban: Option<String>,
    pub debtor_name: Option<String>,
    pub creditor_iban: Option<String>,
    pub creditor_name: Option<String>,
    pub description: Option<String>,
    pub end_to_end_id: Option<String>,
    pub transaction_amount: Decimal,
}

/// Header block of a bank statement: account, period and balance totals.
#[derive(Debug, Clone, FromRow)]
pub struct StatementSummary {
    pub account_name: String,
    pub iban: String,
    pub currency: Option<String>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub total_debited: Decimal,
    pub total_credited: Decimal,
    pub transaction_count: i64,
}
