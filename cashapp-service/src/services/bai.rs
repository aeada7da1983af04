//! Queries for the bank-transaction monitoring module.

use crate::models::{
    AccountInfo, BalanceRow, BankTransaction, DailyAudit, ExportAuditRow, ExportConfigRow,
    ExportStatusCounts, ReconciliationReportSummary, StatementLine, StatementSummary,
    TransactionFilter, TransactionSummaryRow,
};
use crate::services::reconcile::{
    build_daily_audits, BalanceMap, DayTransactions, GridAccount, TransactionMap,
};
use cashapp_core::error::AppError;
use cashapp_core::metrics::DB_QUERY_DURATION;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, QueryBuilder};
use tracing::instrument;

/// The daily balance type the reconciliation treats as authoritative.
const CLOSING_BOOKED: &str = "closingBooked";

/// Hard cap on the transaction details view.
const TRANSACTION_LIMIT: i64 = 1000;

/// Filters for the export audit log view.
#[derive(Debug, Clone, Default)]
pub struct ExportAuditFilter {
    pub bank: Option<String>,
    pub iban: Option<String>,
    pub success: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Form input for creating an export configuration row.
#[derive(Debug, Clone)]
pub struct ExportConfigInput {
    pub enabled: bool,
    pub bank: String,
    pub iban: String,
    pub exportformat: Option<String>,
    pub destination: Option<String>,
    pub outputpath: Option<String>,
    pub fileprefix: Option<String>,
    pub fileextension: Option<String>,
    pub includedate: bool,
    pub dateformat: Option<String>,
}

#[derive(FromRow)]
struct GridAccountRow {
    iban: String,
    owner_name: Option<String>,
    currency: Option<String>,
}

#[derive(FromRow)]
struct DailyTxAggregate {
    iban: String,
    day: NaiveDate,
    tx_count: i64,
    tx_sum: Decimal,
    pos_sum: Decimal,
    pos_count: i64,
    neg_sum: Decimal,
    neg_count: i64,
    currency: Option<String>,
}

#[derive(FromRow)]
struct StatementTotals {
    total_debited: Decimal,
    total_credited: Decimal,
    transaction_count: i64,
}

/// Repository for the bank transaction, balance and export tables.
#[derive(Clone)]
pub struct BaiRepository {
    pool: PgPool,
}

impl BaiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every IBAN the module knows about: reference data plus anything
    /// seen in transactions or balances.
    #[instrument(skip(self))]
    pub async fn known_ibans(&self) -> Result<Vec<String>, AppError> {
        let ibans = sqlx::query_scalar::<_, String>(
            "SELECT iban FROM account_info \
             UNION SELECT DISTINCT iban FROM bank_transactions \
             UNION SELECT DISTINCT iban FROM bank_balances \
             ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ibans)
    }

    #[instrument(skip(self))]
    pub async fn accounts(&self) -> Result<Vec<AccountInfo>, AppError> {
        let accounts = sqlx::query_as::<_, AccountInfo>(
            "SELECT iban, owner_name, currency FROM account_info ORDER BY iban",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Per (day, iban) aggregates for the dashboard table and chart API.
    #[instrument(skip(self))]
    pub async fn transaction_summary(
        &self,
        days: i32,
        ibans: &[String],
    ) -> Result<Vec<TransactionSummaryRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transaction_summary"])
            .start_timer();

        let mut qb = QueryBuilder::new(
            "SELECT booking_date AS date, iban, COUNT(*) AS transaction_count, \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount > 0), 0) AS total_credit, \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount < 0), 0) AS total_debit, \
             COALESCE(SUM(transaction_amount), 0) AS net_amount \
             FROM bank_transactions \
             WHERE booking_date >= CURRENT_DATE - ",
        );
        qb.push_bind(days);
        if !ibans.is_empty() {
            qb.push(" AND iban = ANY(");
            qb.push_bind(ibans.to_vec());
            qb.push(")");
        }
        qb.push(" GROUP BY booking_date, iban ORDER BY booking_date DESC, iban");

        let rows = qb
            .build_query_as::<TransactionSummaryRow>()
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(rows)
    }

    /// Filtered transaction details. The trailing-days window only applies
    /// when no explicit from-date is given.
    #[instrument(skip(self, filter))]
    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<BankTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transactions"])
            .start_timer();

        let mut qb = QueryBuilder::new(
            "SELECT booking_date, iban, transaction_amount, currency, \
             creditor_iban, creditor_name, debtor_iban, debtor_name, description, \
             transaction_type_code, transaction_type_name, entry_reference, \
             end_to_end_id, created_at \
             FROM bank_transactions WHERE 1=1",
        );

        match filter.date_from {
            Some(from) => {
                qb.push(" AND booking_date >= ");
                qb.push_bind(from);
            }
            None => {
                qb.push(" AND booking_date >= CURRENT_DATE - ");
                qb.push_bind(filter.days);
            }
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND booking_date <= ");
            qb.push_bind(to);
        }
        if !filter.ibans.is_empty() {
            qb.push(" AND iban = ANY(");
            qb.push_bind(filter.ibans.to_vec());
            qb.push(")");
        }
        if let Some(min) = filter.amount_min {
            qb.push(" AND transaction_amount >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.amount_max {
            qb.push(" AND transaction_amount <= ");
            qb.push_bind(max);
        }
        if let Some(counterparty) = filter.counterparty.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{counterparty}%");
            qb.push(" AND (creditor_name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR debtor_name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        qb.push(" ORDER BY booking_date DESC, entry_reference DESC LIMIT ");
        qb.push_bind(TRANSACTION_LIMIT);

        let rows = qb
            .build_query_as::<BankTransaction>()
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(rows)
    }

    /// Raw balance snapshots for the balances view.
    #[instrument(skip(self))]
    pub async fn balances(
        &self,
        days: i32,
        ibans: &[String],
    ) -> Result<Vec<BalanceRow>, AppError> {
        let mut qb = QueryBuilder::new(
            "SELECT reference_date, iban, balance_type, amount, currency \
             FROM bank_balances WHERE reference_date >= CURRENT_DATE - ",
        );
        qb.push_bind(days);
        if !ibans.is_empty() {
            qb.push(" AND iban = ANY(");
            qb.push_bind(ibans.to_vec());
            qb.push(")");
        }
        qb.push(" ORDER BY reference_date DESC, iban, balance_type");

        let rows = qb
            .build_query_as::<BalanceRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// The daily reconciliation report over the trailing window
    /// [today - days, yesterday].
    #[instrument(skip(self))]
    pub async fn reconciliation_report(
        &self,
        days: i64,
        ibans: &[String],
    ) -> Result<(Vec<DailyAudit>, ReconciliationReportSummary), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconciliation_report"])
            .start_timer();

        let today = Utc::now().date_naive();
        let window_end = today - Duration::days(1);
        let window_start = today - Duration::days(days);
        // One extra day of balances: opening(day) is closing of day - 1.
        let balance_start = window_start - Duration::days(1);

        let mut account_rows = sqlx::query_as::<_, GridAccountRow>(
            "SELECT i.iban, a.owner_name, a.currency FROM ( \
                 SELECT iban FROM account_info \
                 UNION SELECT DISTINCT iban FROM bank_balances \
                 UNION SELECT DISTINCT iban FROM bank_transactions \
             ) i \
             LEFT JOIN account_info a ON a.iban = i.iban \
             ORDER BY i.iban",
        )
        .fetch_all(&self.pool)
        .await?;

        if !ibans.is_empty() {
            account_rows.retain(|a| ibans.contains(&a.iban));
        }
        let accounts: Vec<GridAccount> = account_rows
            .into_iter()
            .map(|a| GridAccount {
                iban: a.iban,
                owner_name: a.owner_name,
                currency: a.currency,
            })
            .collect();

        let balance_rows = sqlx::query_as::<_, BalanceRow>(
            "SELECT reference_date, iban, balance_type, amount, currency \
             FROM bank_balances \
             WHERE balance_type = $1 AND reference_date BETWEEN $2 AND $3",
        )
        .bind(CLOSING_BOOKED)
        .bind(balance_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        let mut balances = BalanceMap::new();
        for row in balance_rows {
            balances.insert((row.iban, row.reference_date), row.amount);
        }

        let aggregate_rows = sqlx::query_as::<_, DailyTxAggregate>(
            "SELECT iban, booking_date AS day, COUNT(*) AS tx_count, \
             COALESCE(SUM(transaction_amount), 0) AS tx_sum, \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount > 0), 0) AS pos_sum, \
             COUNT(*) FILTER (WHERE transaction_amount > 0) AS pos_count, \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount < 0), 0) AS neg_sum, \
             COUNT(*) FILTER (WHERE transaction_amount < 0) AS neg_count, \
             MAX(currency) AS currency \
             FROM bank_transactions \
             WHERE booking_date BETWEEN $1 AND $2 \
             GROUP BY iban, booking_date",
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        let mut transactions = TransactionMap::new();
        for row in aggregate_rows {
            transactions.insert(
                (row.iban, row.day),
                DayTransactions {
                    count: row.tx_count,
                    sum: row.tx_sum,
                    pos_count: row.pos_count,
                    pos_sum: row.pos_sum,
                    neg_count: row.neg_count,
                    neg_sum: row.neg_sum,
                    currency: row.currency,
                },
            );
        }

        let mut grid_days = Vec::new();
        let mut day = window_start;
        while day <= window_end {
            grid_days.push(day);
            day += Duration::days(1);
        }

        let rows = build_daily_audits(&accounts, &grid_days, &balances, &transactions);
        let summary = ReconciliationReportSummary::from_rows(&rows);

        timer.observe_duration();
        Ok((rows, summary))
    }

    /// Statement header and lines for one IBAN over a date range.
    #[instrument(skip(self))]
    pub async fn statement(
        &self,
        iban: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(StatementSummary, Vec<StatementLine>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["statement"])
            .start_timer();

        let account = sqlx::query_as::<_, AccountInfo>(
            "SELECT iban, owner_name, currency FROM account_info WHERE iban = $1",
        )
        .bind(iban)
        .fetch_optional(&self.pool)
        .await?;

        // Opening is the last closing balance before the period; closing
        // the last one inside it.
        let opening = self.closing_balance_at(iban, from - Duration::days(1)).await?;
        let closing = self.closing_balance_at(iban, to).await?;

        let totals = sqlx::query_as::<_, StatementTotals>(
            "SELECT \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount < 0), 0) AS total_debited, \
             COALESCE(SUM(transaction_amount) FILTER (WHERE transaction_amount > 0), 0) AS total_credited, \
             COUNT(*) AS transaction_count \
             FROM bank_transactions WHERE iban = $1 AND booking_date BETWEEN $2 AND $3",
        )
        .bind(iban)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let lines = sqlx::query_as::<_, StatementLine>(
            "SELECT value_date, booking_date, transaction_type_code, \
             transaction_type_name, debtor_iban, debtor_name, creditor_iban, \
             creditor_name, description, end_to_end_id, transaction_amount \
             FROM bank_transactions \
             WHERE iban = $1 AND booking_date BETWEEN $2 AND $3 \
             ORDER BY booking_date, entry_reference",
        )
        .bind(iban)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let (account_name, currency) = match account {
            Some(a) => (
                a.owner_name.unwrap_or_else(|| "Unknown".to_string()),
                a.currency,
            ),
            None => ("Unknown".to_string(), None),
        };

        let summary = StatementSummary {
            account_name,
            iban: iban.to_string(),
            currency,
            opening_balance: opening.unwrap_or_default(),
            closing_balance: closing.unwrap_or_default(),
            total_debited: totals.total_debited,
            total_credited: totals.total_credited,
            transaction_count: totals.transaction_count,
        };

        timer.observe_duration();
        Ok((summary, lines))
    }

    /// Latest closing-booked balance on or before a date.
    async fn closing_balance_at(
        &self,
        iban: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, AppError> {
        let amount = sqlx::query_scalar::<_, Decimal>(
            "SELECT amount FROM bank_balances \
             WHERE iban = $1 AND balance_type = $2 AND reference_date <= $3 \
             ORDER BY reference_date DESC LIMIT 1",
        )
        .bind(iban)
        .bind(CLOSING_BOOKED)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(amount)
    }

    /// Paginated export audit log with filters, plus overall counts.
    #[instrument(skip(self, filter))]
    pub async fn export_audit(
        &self,
        filter: &ExportAuditFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<ExportAuditRow>, i64, ExportStatusCounts), AppError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM export_audit_log WHERE 1=1");
        Self::push_export_filters(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new(
            "SELECT id, timestamp, bank, iban, destination, export_format, \
             closingdate, filename, record_count, success, error_message \
             FROM export_audit_log WHERE 1=1",
        );
        Self::push_export_filters(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC LIMIT ");
        qb.push_bind(per_page);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1).max(0) * per_page);

        let rows = qb
            .build_query_as::<ExportAuditRow>()
            .fetch_all(&self.pool)
            .await?;

        let counts = sqlx::query_as::<_, ExportStatusCounts>(
            "SELECT \
             COUNT(*) FILTER (WHERE success AND COALESCE(record_count, 0) > 0) AS success_count, \
             COUNT(*) FILTER (WHERE success AND COALESCE(record_count, 0) = 0) AS success_no_tx_count, \
             COUNT(*) FILTER (WHERE NOT success) AS failed_count \
             FROM export_audit_log",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total, counts))
    }

    fn push_export_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ExportAuditFilter) {
        if let Some(bank) = filter.bank.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND bank = ");
            qb.push_bind(bank.to_string());
        }
        if let Some(iban) = filter.iban.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND iban = ");
            qb.push_bind(iban.to_string());
        }
        if let Some(success) = filter.success {
            qb.push(" AND success = ");
            qb.push_bind(success);
        }
        if let Some(from) = filter.date_from {
            qb.push(" AND timestamp::date >= ");
            qb.push_bind(from);
        }
        if let Some(to) = filter.date_to {
            qb.push(" AND timestamp::date <= ");
            qb.push_bind(to);
        }
    }

    #[instrument(skip(self))]
    pub async fn export_configs(&self) -> Result<Vec<ExportConfigRow>, AppError> {
        let rows = sqlx::query_as::<_, ExportConfigRow>(
            "SELECT id, enabled, bank, iban, exportformat, exportformatversion, \
             destination, outputpath, fileprefix, fileextension, includedate, \
             dateformat, createdat, updatedat \
             FROM export_configs ORDER BY bank, iban",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self, input), fields(iban = %input.iban))]
    pub async fn create_export_config(&self, input: &ExportConfigInput) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO export_configs \
             (enabled, bank, iban, exportformat, destination, outputpath, \
              fileprefix, fileextension, includedate, dateformat) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(input.enabled)
        .bind(&input.bank)
        .bind(&input.iban)
        .bind(&input.exportformat)
        .bind(&input.destination)
        .bind(&input.outputpath)
        .bind(&input.fileprefix)
        .bind(&input.fileextension)
        .bind(input.includedate)
        .bind(&input.dateformat)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("Export config for {}/{} already exists", input.bank, input.iban),
            ),
            _ => e.into(),
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_export_config_enabled(&self, id: i32, enabled: bool) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE export_configs SET enabled = $2, updatedat = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Export config {} not found",
                id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_export_config(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM export_configs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Export config {} not found",
                id
            )));
        }
        Ok(())
    }
}
