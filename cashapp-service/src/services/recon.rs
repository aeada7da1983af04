//! Queries for the payment reconciliation module.

use crate::models::{
    BrandBreakdownRow, CountryBreakdownRow, DailyVolumeRow, DashboardStats, DataDateRange,
    DataSourceRow, ImportLogRow, ImportStats, MerchantBreakdownRow, PartitionInfoRow,
    PaymentFilter, PaymentListRow, ReconciliationExceptionRow, ReconciliationSummary,
    UnmatchedPaymentRow, WorldlinePayment,
};
use cashapp_core::error::AppError;
use cashapp_core::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use sqlx::{PgPool, QueryBuilder};
use tracing::instrument;

const PAYMENT_LIST_COLUMNS: &str = "id, ref_code, order_ref, status, paydate, facname, \
     country, total, currency, brand, merchref, owner";

/// The regex fallback only applies when the whole search matched nothing,
/// not when a page beyond the last one comes back empty.
fn retry_as_regex(term: &str, total: i64) -> bool {
    total == 0 && term.contains('_')
}

/// Repository for the Worldline payment tables.
#[derive(Clone)]
pub struct ReconRepository {
    pool: PgPool,
}

impl ReconRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Headline statistics over the trailing window for the dashboard.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self, days: i32) -> Result<DashboardStats, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_stats"])
            .start_timer();

        let stats = sqlx::query_as::<_, DashboardStats>(
            "SELECT COUNT(*) AS total_transactions, \
             COUNT(DISTINCT paydate) AS days_with_data, \
             COUNT(DISTINCT brand) AS unique_brands, \
             COUNT(DISTINCT merchref) AS unique_merchants, \
             SUM(total) AS total_amount, \
             AVG(total) AS avg_amount, \
             MIN(paydate) AS earliest_date, \
             MAX(paydate) AS latest_date \
             FROM worldline_payments WHERE paydate >= CURRENT_DATE - $1",
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(stats)
    }

    #[instrument(skip(self))]
    pub async fn daily_volume(&self, days: i32) -> Result<Vec<DailyVolumeRow>, AppError> {
        let rows = sqlx::query_as::<_, DailyVolumeRow>(
            "SELECT paydate AS date, COUNT(*) AS transaction_count, \
             SUM(total) AS total_amount, AVG(total) AS avg_amount, \
             COUNT(DISTINCT brand) AS unique_brands, \
             COUNT(DISTINCT merchref) AS unique_merchants \
             FROM worldline_payments WHERE paydate >= CURRENT_DATE - $1 \
             GROUP BY paydate ORDER BY paydate DESC",
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn brand_breakdown(&self, days: i32) -> Result<Vec<BrandBreakdownRow>, AppError> {
        let rows = sqlx::query_as::<_, BrandBreakdownRow>(
            "SELECT COALESCE(brand, 'Unknown') AS brand, COUNT(*) AS transaction_count, \
             SUM(total) AS total_amount, AVG(total) AS avg_amount, \
             COUNT(DISTINCT paydate) AS days_active \
             FROM worldline_payments WHERE paydate >= CURRENT_DATE - $1 \
             GROUP BY brand ORDER BY COUNT(*) DESC",
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn merchant_breakdown(
        &self,
        days: i32,
        limit: i64,
    ) -> Result<Vec<MerchantBreakdownRow>, AppError> {
        let rows = sqlx::query_as::<_, MerchantBreakdownRow>(
            "SELECT COALESCE(merchref, 'Unknown') AS merchref, COUNT(*) AS transaction_count, \
             SUM(total) AS total_amount, AVG(total) AS avg_amount, \
             MIN(paydate) AS first_transaction, MAX(paydate) AS last_transaction \
             FROM worldline_payments WHERE paydate >= CURRENT_DATE - $1 \
             GROUP BY merchref ORDER BY COUNT(*) DESC LIMIT $2",
        )
        .bind(days)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn country_breakdown(
        &self,
        days: i32,
    ) -> Result<Vec<CountryBreakdownRow>, AppError> {
        let rows = sqlx::query_as::<_, CountryBreakdownRow>(
            "SELECT COALESCE(country, 'Unknown') AS country, COUNT(*) AS transaction_count, \
             SUM(total) AS total_amount, AVG(total) AS avg_amount \
             FROM worldline_payments WHERE paydate >= CURRENT_DATE - $1 \
             GROUP BY country ORDER BY COUNT(*) DESC",
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn data_date_range(&self) -> Result<DataDateRange, AppError> {
        let range = sqlx::query_as::<_, DataDateRange>(
            "SELECT MIN(paydate) AS earliest_date, MAX(paydate) AS latest_date, \
             COUNT(DISTINCT paydate) AS unique_dates FROM worldline_payments",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(range)
    }

    /// Filtered, paginated payment list. Free-text search takes precedence
    /// over the field filters; when it matches nothing and contains
    /// underscores the search is retried as a regex with `_` treated as
    /// any-character, since Worldline references often embed underscores.
    #[instrument(skip(self, filter))]
    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<PaymentListRow>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let result = if let Some(term) = search {
            let (rows, total) = self
                .search_payments(&format!("%{term}%"), false, page, per_page)
                .await?;
            if retry_as_regex(term, total) {
                let pattern = term.replace('_', ".");
                self.search_payments(&pattern, true, page, per_page).await?
            } else {
                (rows, total)
            }
        } else {
            self.filter_payments(filter, page, per_page).await?
        };

        timer.observe_duration();
        Ok(result)
    }

    async fn search_payments(
        &self,
        pattern: &str,
        regex: bool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<PaymentListRow>, i64), AppError> {
        let operator = if regex { "~*" } else { "ILIKE" };
        let where_sql = format!(
            "WHERE id {operator} $1 OR ref_code {operator} $1 \
             OR order_ref {operator} $1 OR merchref {operator} $1"
        );

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM worldline_payments {where_sql}"
        ))
        .bind(pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PaymentListRow>(&format!(
            "SELECT {PAYMENT_LIST_COLUMNS} FROM worldline_payments {where_sql} \
             ORDER BY paydate DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(pattern)
        .bind(per_page)
        .bind((page - 1).max(0) * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn filter_payments(
        &self,
        filter: &PaymentFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<PaymentListRow>, i64), AppError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM worldline_payments WHERE 1=1");
        Self::push_payment_filters(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {PAYMENT_LIST_COLUMNS} FROM worldline_payments WHERE 1=1"
        ));
        Self::push_payment_filters(&mut qb, filter);
        qb.push(" ORDER BY paydate DESC, id LIMIT ");
        qb.push_bind(per_page);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1).max(0) * per_page);

        let rows = qb
            .build_query_as::<PaymentListRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    fn push_payment_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &PaymentFilter) {
        if let Some(start) = filter.start_date {
            qb.push(" AND paydate >= ");
            qb.push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND paydate <= ");
            qb.push_bind(end);
        }
        let like_fields = [
            ("brand", &filter.brand),
            ("merchref", &filter.merchref),
            ("ref_code", &filter.ref_code),
            ("status", &filter.status),
            ("id", &filter.payment_id),
            ("order_ref", &filter.order_ref),
            ("owner", &filter.owner),
            ("country", &filter.country),
        ];
        for (column, value) in like_fields {
            if let Some(v) = value.as_deref().filter(|s| !s.is_empty()) {
                qb.push(format!(" AND {column} ILIKE "));
                qb.push_bind(format!("%{v}%"));
            }
        }
        if let Some(min) = filter.amount_min {
            qb.push(" AND total >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.amount_max {
            qb.push(" AND total <= ");
            qb.push_bind(max);
        }
    }

    /// One payment in full, for the detail modal.
    #[instrument(skip(self))]
    pub async fn payment_detail(
        &self,
        id: &str,
        paydate: NaiveDate,
    ) -> Result<Option<WorldlinePayment>, AppError> {
        let payment = sqlx::query_as::<_, WorldlinePayment>(
            "SELECT id, ref_code, order_ref, status, lib, accept_code, paydate, cie, \
             facname, country, total, currency, method, brand, card, expdate, uid, \
             action, ticket, description, ship, tax, merchref, refid, batchref, owner, \
             alias, fraud_type, paydatetime, orderdatetime, subbrand, source_file \
             FROM worldline_payments WHERE id = $1 AND paydate = $2",
        )
        .bind(id)
        .bind(paydate)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Match/exception tallies for a date window.
    #[instrument(skip(self))]
    pub async fn reconciliation_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReconciliationSummary, AppError> {
        let summary = sqlx::query_as::<_, ReconciliationSummary>(
            "SELECT \
             (SELECT COUNT(*) FROM worldline_payments WHERE paydate BETWEEN $1 AND $2) AS total_worldline, \
             (SELECT COUNT(*) FROM reconciliation_matches WHERE match_date BETWEEN $1 AND $2) AS total_matched, \
             (SELECT COUNT(*) FROM reconciliation_exceptions \
              WHERE exception_date BETWEEN $1 AND $2 AND status = 'OPEN') AS open_exceptions, \
             (SELECT COUNT(*) FROM reconciliation_exceptions \
              WHERE exception_date BETWEEN $1 AND $2 AND status = 'RESOLVED') AS resolved_exceptions",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Payments in the window with no match record yet.
    #[instrument(skip(self))]
    pub async fn unmatched_payments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<UnmatchedPaymentRow>, AppError> {
        let rows = sqlx::query_as::<_, UnmatchedPaymentRow>(
            "SELECT p.id, p.ref_code, p.paydate, p.total, p.brand, p.merchref, p.owner \
             FROM worldline_payments p \
             LEFT JOIN reconciliation_matches m \
               ON m.worldline_id = p.id AND m.worldline_paydate = p.paydate \
             WHERE p.paydate BETWEEN $1 AND $2 AND m.match_id IS NULL \
             ORDER BY p.paydate DESC, p.id LIMIT $3",
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn open_exceptions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReconciliationExceptionRow>, AppError> {
        let rows = sqlx::query_as::<_, ReconciliationExceptionRow>(
            "SELECT e.exception_id, COALESCE(s.source_name, 'Unknown') AS source_name, \
             e.record_id, e.exception_type, e.exception_date, e.status, e.notes, e.created_at \
             FROM reconciliation_exceptions e \
             LEFT JOIN data_sources s ON s.source_id = e.source_id \
             WHERE e.exception_date BETWEEN $1 AND $2 AND e.status = 'OPEN' \
             ORDER BY e.exception_date DESC, e.exception_id",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn import_history(&self, limit: i64) -> Result<Vec<ImportLogRow>, AppError> {
        let rows = sqlx::query_as::<_, ImportLogRow>(
            "SELECT l.import_id, COALESCE(s.source_name, 'Unknown') AS source_name, \
             l.filename, l.file_size_bytes, l.records_total, l.records_imported, \
             l.records_failed, l.records_duplicate, l.import_status, l.error_message, \
             l.started_at, l.completed_at, l.imported_by \
             FROM file_import_log l \
             LEFT JOIN data_sources s ON s.source_id = l.source_id \
             ORDER BY l.started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn import_stats(&self) -> Result<ImportStats, AppError> {
        let stats = sqlx::query_as::<_, ImportStats>(
            "SELECT COUNT(*) AS total_imports, \
             SUM(records_imported)::bigint AS total_records_imported, \
             SUM(records_failed)::bigint AS total_records_failed, \
             SUM(records_duplicate)::bigint AS total_duplicates, \
             COUNT(*) FILTER (WHERE import_status = 'SUCCESS') AS successful_imports, \
             COUNT(*) FILTER (WHERE import_status = 'FAILED') AS failed_imports, \
             MAX(completed_at) AS last_import \
             FROM file_import_log",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    #[instrument(skip(self))]
    pub async fn data_sources(&self) -> Result<Vec<DataSourceRow>, AppError> {
        let rows = sqlx::query_as::<_, DataSourceRow>(
            "SELECT source_id, source_name, source_type, is_active \
             FROM data_sources ORDER BY source_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Payment table partitions and their on-disk size.
    #[instrument(skip(self))]
    pub async fn partition_info(&self) -> Result<Vec<PartitionInfoRow>, AppError> {
        let rows = sqlx::query_as::<_, PartitionInfoRow>(
            "SELECT tablename, \
             pg_size_pretty(pg_total_relation_size(quote_ident(tablename)::regclass)) AS size \
             FROM pg_tables \
             WHERE schemaname = current_schema() AND tablename LIKE 'worldline_payments_%' \
             ORDER BY tablename DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_retry_fires_only_when_nothing_matched() {
        assert!(retry_as_regex("SHOP_1", 0));
        assert!(!retry_as_regex("SHOP1", 0));
    }

    #[test]
    fn empty_page_of_a_matching_search_keeps_its_results() {
        // Paging past the end leaves rows empty while total stays positive.
        assert!(!retry_as_regex("SHOP_1", 2));
    }
}
