//! Handlers for the payment reconciliation screens.

use crate::handlers::{
    flash, non_empty, page_data, parse_query_date, require_access, take_flash, Flash,
};
use crate::models::{
    DashboardStats, DataDateRange, ImportStats, ImportStatus, PaymentFilter,
    ReconciliationSummary, SessionUser,
};
use crate::services::policy::Resource;
use crate::utils::locale::{format_amount, format_date, format_datetime, parse_decimal};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Extension, Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use cashapp_core::error::AppError;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tower_sessions::Session;

const DEFAULT_WINDOW_DAYS: i32 = 30;
const PAYMENT_PAGE_SIZE: i64 = 50;
const MERCHANT_LIMIT: i64 = 25;
const UNMATCHED_LIMIT: i64 = 100;
const IMPORT_HISTORY_LIMIT: i64 = 100;
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

pub struct StatView {
    pub label: &'static str,
    pub value: String,
}

pub struct DailyVolumeView {
    pub date: String,
    pub transaction_count: i64,
    pub total_amount: String,
    pub avg_amount: String,
    pub unique_brands: i64,
    pub unique_merchants: i64,
}

pub struct BrandView {
    pub brand: String,
    pub transaction_count: i64,
    pub total_amount: String,
    pub avg_amount: String,
    pub days_active: i64,
}

pub struct MerchantView {
    pub merchref: String,
    pub transaction_count: i64,
    pub total_amount: String,
    pub avg_amount: String,
    pub first_transaction: String,
    pub last_transaction: String,
}

pub struct CountryView {
    pub country: String,
    pub transaction_count: i64,
    pub total_amount: String,
    pub avg_amount: String,
}

pub struct PaymentView {
    pub id: String,
    pub ref_code: String,
    pub order_ref: String,
    pub status: String,
    pub paydate: String,
    pub paydate_iso: String,
    pub facname: String,
    pub country: String,
    pub total: String,
    pub currency: String,
    pub brand: String,
    pub merchref: String,
    pub owner: String,
}

pub struct UnmatchedView {
    pub id: String,
    pub ref_code: String,
    pub paydate: String,
    pub total: String,
    pub brand: String,
    pub merchref: String,
    pub owner: String,
}

pub struct ExceptionView {
    pub exception_id: i32,
    pub source_name: String,
    pub record_id: String,
    pub exception_type: String,
    pub exception_date: String,
    pub notes: String,
}

pub struct ImportLogView {
    pub filename: String,
    pub source_name: String,
    pub file_size: String,
    pub records_total: i32,
    pub records_imported: i32,
    pub records_failed: i32,
    pub records_duplicate: i32,
    pub import_status: String,
    pub error_message: String,
    pub started_at: String,
    pub imported_by: String,
}

pub struct DataSourceView {
    pub source_id: i32,
    pub source_name: String,
    pub source_type: String,
    pub is_active: bool,
}

pub struct PartitionView {
    pub tablename: String,
    pub size: String,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "recon/dashboard.html")]
pub struct ReconDashboardTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub stats: Vec<StatView>,
    pub daily_volume: Vec<DailyVolumeView>,
    pub brands: Vec<BrandView>,
    pub import_stats: Vec<StatView>,
    pub data_range: String,
    pub days: i32,
}

#[derive(Template)]
#[template(path = "recon/payments.html")]
pub struct PaymentsTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub rows: Vec<PaymentView>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub search: String,
    pub filter_start_date: String,
    pub filter_end_date: String,
    pub filter_brand: String,
    pub filter_merchref: String,
    pub filter_status: String,
    pub filter_owner: String,
    pub filter_country: String,
    pub filter_amount_min: String,
    pub filter_amount_max: String,
}

#[derive(Template)]
#[template(path = "recon/reconciliation.html")]
pub struct ReconReconciliationTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub total_worldline: i64,
    pub total_matched: i64,
    pub open_exception_count: i64,
    pub resolved_exceptions: i64,
    pub unmatched: Vec<UnmatchedView>,
    pub exceptions: Vec<ExceptionView>,
    pub date_from: String,
    pub date_to: String,
}

#[derive(Template)]
#[template(path = "recon/reports.html")]
pub struct ReconReportsTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub merchants: Vec<MerchantView>,
    pub countries: Vec<CountryView>,
    pub brands: Vec<BrandView>,
    pub days: i32,
}

#[derive(Template)]
#[template(path = "recon/import.html")]
pub struct ImportTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub recent_imports: Vec<ImportLogView>,
}

#[derive(Template)]
#[template(path = "recon/import_history.html")]
pub struct ImportHistoryTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub rows: Vec<ImportLogView>,
}

#[derive(Template)]
#[template(path = "recon/settings.html")]
pub struct SettingsTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub sources: Vec<DataSourceView>,
    pub partitions: Vec<PartitionView>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub brand: Option<String>,
    pub merchref: Option<String>,
    pub ref_code: Option<String>,
    pub status: Option<String>,
    pub payment_id: Option<String>,
    pub order_ref: Option<String>,
    pub owner: Option<String>,
    pub country: Option<String>,
    pub amount_min: Option<String>,
    pub amount_max: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

fn clamp_days(days: Option<i32>) -> i32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, 365)
}

fn amount(value: Option<rust_decimal::Decimal>) -> String {
    value.map(format_amount).unwrap_or_default()
}

fn human_size(bytes: Option<i64>) -> String {
    match bytes {
        None => String::new(),
        Some(b) if b < 1024 => format!("{b} B"),
        Some(b) if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        Some(b) => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}

fn import_log_views(rows: &[crate::models::ImportLogRow]) -> Vec<ImportLogView> {
    rows.iter()
        .map(|r| ImportLogView {
            filename: r.filename.clone(),
            source_name: r.source_name.clone(),
            file_size: human_size(r.file_size_bytes),
            records_total: r.records_total,
            records_imported: r.records_imported,
            records_failed: r.records_failed,
            records_duplicate: r.records_duplicate,
            import_status: r.import_status.clone(),
            error_message: r.error_message.clone().unwrap_or_default(),
            started_at: r.started_at.format("%d/%m/%Y %H:%M").to_string(),
            imported_by: r.imported_by.clone().unwrap_or_default(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<DaysQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let days = clamp_days(query.days);
    let data = async {
        Ok::<_, AppError>((
            state.recon.dashboard_stats(days).await?,
            state.recon.daily_volume(days).await?,
            state.recon.brand_breakdown(days).await?,
            state.recon.import_stats().await?,
            state.recon.data_date_range().await?,
        ))
    }
    .await;
    let (stats, daily, brands, import_stats, range) = page_data(
        &session,
        "the dashboard",
        data,
        (
            DashboardStats::default(),
            Vec::new(),
            Vec::new(),
            ImportStats::default(),
            DataDateRange::default(),
        ),
    )
    .await;

    let stat_views = vec![
        StatView {
            label: "Transactions",
            value: stats.total_transactions.to_string(),
        },
        StatView {
            label: "Days with data",
            value: stats.days_with_data.to_string(),
        },
        StatView {
            label: "Brands",
            value: stats.unique_brands.to_string(),
        },
        StatView {
            label: "Merchants",
            value: stats.unique_merchants.to_string(),
        },
        StatView {
            label: "Total amount",
            value: amount(stats.total_amount),
        },
        StatView {
            label: "Average amount",
            value: amount(stats.avg_amount),
        },
    ];

    let import_stat_views = vec![
        StatView {
            label: "Imports",
            value: import_stats.total_imports.to_string(),
        },
        StatView {
            label: "Records imported",
            value: import_stats.total_records_imported.unwrap_or(0).to_string(),
        },
        StatView {
            label: "Duplicates",
            value: import_stats.total_duplicates.unwrap_or(0).to_string(),
        },
        StatView {
            label: "Failed imports",
            value: import_stats.failed_imports.to_string(),
        },
        StatView {
            label: "Last import",
            value: import_stats
                .last_import
                .map(format_datetime)
                .unwrap_or_else(|| "never".to_string()),
        },
    ];

    let data_range = match (range.earliest_date, range.latest_date) {
        (Some(earliest), Some(latest)) => format!(
            "{} - {} ({} days with data)",
            format_date(earliest),
            format_date(latest),
            range.unique_dates
        ),
        _ => "no data".to_string(),
    };

    let daily_views = daily
        .iter()
        .map(|d| DailyVolumeView {
            date: format_date(d.date),
            transaction_count: d.transaction_count,
            total_amount: amount(d.total_amount),
            avg_amount: amount(d.avg_amount),
            unique_brands: d.unique_brands,
            unique_merchants: d.unique_merchants,
        })
        .collect();
    let brand_views = brands
        .iter()
        .map(|b| BrandView {
            brand: b.brand.clone(),
            transaction_count: b.transaction_count,
            total_amount: amount(b.total_amount),
            avg_amount: amount(b.avg_amount),
            days_active: b.days_active,
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(ReconDashboardTemplate {
        user,
        flashes,
        stats: stat_views,
        daily_volume: daily_views,
        brands: brand_views,
        import_stats: import_stat_views,
        data_range,
        days,
    }
    .into_response())
}

pub async fn payments(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<PaymentsQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let filter = PaymentFilter {
        start_date: parse_query_date(&query.start_date),
        end_date: parse_query_date(&query.end_date),
        brand: non_empty(&query.brand),
        merchref: non_empty(&query.merchref),
        ref_code: non_empty(&query.ref_code),
        status: non_empty(&query.status),
        payment_id: non_empty(&query.payment_id),
        order_ref: non_empty(&query.order_ref),
        owner: non_empty(&query.owner),
        country: non_empty(&query.country),
        amount_min: query.amount_min.as_deref().and_then(parse_decimal),
        amount_max: query.amount_max.as_deref().and_then(parse_decimal),
    };
    let page = query.page.unwrap_or(1).max(1);

    let (rows, total) = page_data(
        &session,
        "payments",
        state
            .recon
            .list_payments(&filter, query.search.as_deref(), page, PAYMENT_PAGE_SIZE)
            .await,
        (Vec::new(), 0),
    )
    .await;
    let total_pages = (total + PAYMENT_PAGE_SIZE - 1) / PAYMENT_PAGE_SIZE;

    let views = rows
        .iter()
        .map(|p| PaymentView {
            id: p.id.clone(),
            ref_code: p.ref_code.clone().unwrap_or_default(),
            order_ref: p.order_ref.clone().unwrap_or_default(),
            status: p.status.clone().unwrap_or_default(),
            paydate: format_date(p.paydate),
            paydate_iso: p.paydate.format("%Y-%m-%d").to_string(),
            facname: p.facname.clone().unwrap_or_default(),
            country: p.country.clone().unwrap_or_default(),
            total: amount(p.total),
            currency: p.currency.clone().unwrap_or_default(),
            brand: p.brand.clone().unwrap_or_default(),
            merchref: p.merchref.clone().unwrap_or_default(),
            owner: p.owner.clone().unwrap_or_default(),
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(PaymentsTemplate {
        user,
        flashes,
        rows: views,
        total,
        page,
        total_pages,
        search: query.search.unwrap_or_default(),
        filter_start_date: query.start_date.unwrap_or_default(),
        filter_end_date: query.end_date.unwrap_or_default(),
        filter_brand: query.brand.unwrap_or_default(),
        filter_merchref: query.merchref.unwrap_or_default(),
        filter_status: query.status.unwrap_or_default(),
        filter_owner: query.owner.unwrap_or_default(),
        filter_country: query.country.unwrap_or_default(),
        filter_amount_min: query.amount_min.unwrap_or_default(),
        filter_amount_max: query.amount_max.unwrap_or_default(),
    }
    .into_response())
}

pub async fn reconciliation(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<DateRangeQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let today = Utc::now().date_naive();
    let from = parse_query_date(&query.date_from)
        .unwrap_or(today - Duration::days(DEFAULT_WINDOW_DAYS as i64));
    let to = parse_query_date(&query.date_to).unwrap_or(today);

    let data = async {
        Ok::<_, AppError>((
            state.recon.reconciliation_summary(from, to).await?,
            state.recon.unmatched_payments(from, to, UNMATCHED_LIMIT).await?,
            state.recon.open_exceptions(from, to).await?,
        ))
    }
    .await;
    let (summary, unmatched, exceptions) = page_data(
        &session,
        "reconciliation data",
        data,
        (ReconciliationSummary::default(), Vec::new(), Vec::new()),
    )
    .await;

    let unmatched_views = unmatched
        .iter()
        .map(|p| UnmatchedView {
            id: p.id.clone(),
            ref_code: p.ref_code.clone().unwrap_or_default(),
            paydate: format_date(p.paydate),
            total: amount(p.total),
            brand: p.brand.clone().unwrap_or_default(),
            merchref: p.merchref.clone().unwrap_or_default(),
            owner: p.owner.clone().unwrap_or_default(),
        })
        .collect();
    let exception_views = exceptions
        .iter()
        .map(|e| ExceptionView {
            exception_id: e.exception_id,
            source_name: e.source_name.clone(),
            record_id: e.record_id.clone(),
            exception_type: e.exception_type.clone(),
            exception_date: format_date(e.exception_date),
            notes: e.notes.clone().unwrap_or_default(),
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(ReconReconciliationTemplate {
        user,
        flashes,
        total_worldline: summary.total_worldline,
        total_matched: summary.total_matched,
        open_exception_count: summary.open_exceptions,
        resolved_exceptions: summary.resolved_exceptions,
        unmatched: unmatched_views,
        exceptions: exception_views,
        date_from: from.format("%Y-%m-%d").to_string(),
        date_to: to.format("%Y-%m-%d").to_string(),
    }
    .into_response())
}

pub async fn reports(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<DaysQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let days = clamp_days(query.days);
    let data = async {
        Ok::<_, AppError>((
            state.recon.merchant_breakdown(days, MERCHANT_LIMIT).await?,
            state.recon.country_breakdown(days).await?,
            state.recon.brand_breakdown(days).await?,
        ))
    }
    .await;
    let (merchants, countries, brands) = page_data(
        &session,
        "reports",
        data,
        (Vec::new(), Vec::new(), Vec::new()),
    )
    .await;

    let merchant_views = merchants
        .iter()
        .map(|m| MerchantView {
            merchref: m.merchref.clone(),
            transaction_count: m.transaction_count,
            total_amount: amount(m.total_amount),
            avg_amount: amount(m.avg_amount),
            first_transaction: m.first_transaction.map(format_date).unwrap_or_default(),
            last_transaction: m.last_transaction.map(format_date).unwrap_or_default(),
        })
        .collect();
    let country_views = countries
        .iter()
        .map(|c| CountryView {
            country: c.country.clone(),
            transaction_count: c.transaction_count,
            total_amount: amount(c.total_amount),
            avg_amount: amount(c.avg_amount),
        })
        .collect();
    let brand_views = brands
        .iter()
        .map(|b| BrandView {
            brand: b.brand.clone(),
            transaction_count: b.transaction_count,
            total_amount: amount(b.total_amount),
            avg_amount: amount(b.avg_amount),
            days_active: b.days_active,
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(ReconReportsTemplate {
        user,
        flashes,
        merchants: merchant_views,
        countries: country_views,
        brands: brand_views,
        days,
    }
    .into_response())
}

pub async fn import_page(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let recent = page_data(
        &session,
        "recent imports",
        state.recon.import_history(10).await,
        Vec::new(),
    )
    .await;
    let flashes = take_flash(&session).await;
    Ok(ImportTemplate {
        user,
        flashes,
        recent_imports: import_log_views(&recent),
    }
    .into_response())
}

pub async fn import_submit(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Invalid multipart request: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read upload: {}", e))
        })?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = match upload {
        Some(upload) => upload,
        None => {
            flash(&session, "error", "No file selected").await;
            return Ok(Redirect::to("/recon/import").into_response());
        }
    };

    if !filename.to_lowercase().ends_with(".csv") {
        flash(&session, "error", "Only .csv files can be imported").await;
        return Ok(Redirect::to("/recon/import").into_response());
    }
    if data.is_empty() {
        flash(&session, "error", "The uploaded file is empty").await;
        return Ok(Redirect::to("/recon/import").into_response());
    }
    if data.len() > MAX_UPLOAD_BYTES {
        flash(&session, "error", "The uploaded file is too large").await;
        return Ok(Redirect::to("/recon/import").into_response());
    }

    let outcome = match state
        .importer
        .import_file(&filename, &data, Some(&user.username))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            flash(&session, "error", format!("Import failed: {e}")).await;
            return Ok(Redirect::to("/recon/import").into_response());
        }
    };

    let message = format!(
        "{}: {} imported, {} duplicates, {} failed ({} records, {:.1}s)",
        outcome.status.as_str(),
        outcome.imported,
        outcome.duplicates,
        outcome.failed,
        outcome.total_records,
        outcome.duration.as_secs_f64()
    );
    let kind = match outcome.status {
        ImportStatus::Success => "success",
        ImportStatus::Partial => "warning",
        ImportStatus::Failed => "error",
    };
    flash(&session, kind, message).await;

    for error in outcome.errors.iter().take(5) {
        flash(&session, "warning", error.clone()).await;
    }

    Ok(Redirect::to("/recon/import").into_response())
}

pub async fn import_history(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let rows = page_data(
        &session,
        "the import history",
        state.recon.import_history(IMPORT_HISTORY_LIMIT).await,
        Vec::new(),
    )
    .await;
    let flashes = take_flash(&session).await;
    Ok(ImportHistoryTemplate {
        user,
        flashes,
        rows: import_log_views(&rows),
    }
    .into_response())
}

pub async fn settings(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Recon).await {
        return Ok(denied);
    }

    let data = async {
        Ok::<_, AppError>((
            state.recon.data_sources().await?,
            state.recon.partition_info().await?,
        ))
    }
    .await;
    let (sources, partitions) =
        page_data(&session, "settings", data, (Vec::new(), Vec::new())).await;

    let source_views = sources
        .iter()
        .map(|s| DataSourceView {
            source_id: s.source_id,
            source_name: s.source_name.clone(),
            source_type: s.source_type.clone().unwrap_or_default(),
            is_active: s.is_active,
        })
        .collect();
    let partition_views = partitions
        .iter()
        .map(|p| PartitionView {
            tablename: p.tablename.clone(),
            size: p.size.clone(),
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(SettingsTemplate {
        user,
        flashes,
        sources: source_views,
        partitions: partition_views,
    }
    .into_response())
}
