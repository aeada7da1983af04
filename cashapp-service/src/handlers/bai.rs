//! Handlers for the bank-transaction monitoring screens.

use crate::handlers::{
    flash, non_empty, page_data, parse_query_date, require_access, take_flash, Flash,
};
use crate::models::{DailyAudit, ExportStatusCounts, ReconciliationReportSummary, SessionUser};
use crate::services::bai::{ExportAuditFilter, ExportConfigInput};
use crate::services::policy::Resource;
use crate::services::statement_pdf::{render_statement, statement_filename};
use crate::utils::locale::{format_amount, format_date, parse_decimal};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Extension, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use cashapp_core::error::AppError;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;

const DEFAULT_WINDOW_DAYS: i32 = 30;
const EXPORT_PAGE_SIZE: i64 = 50;

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

pub struct TransactionView {
    pub booking_date: String,
    pub iban: String,
    pub amount: String,
    pub is_debit: bool,
    pub counterparty: String,
    pub description: String,
    pub tx_type: String,
}

pub struct BalanceView {
    pub reference_date: String,
    pub iban: String,
    pub balance_type: String,
    pub amount: String,
    pub currency: String,
}

pub struct AuditView {
    pub iban: String,
    pub owner_name: String,
    pub day: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub opening_balance: String,
    pub sum_transactions: String,
    pub transaction_count: i64,
    pub closing_balance: String,
    pub expected_closing: String,
    pub difference: String,
    pub currency: String,
}

pub struct ReportSummaryView {
    pub total_rows: usize,
    pub perfect_matches: usize,
    pub minor_diffs: usize,
    pub major_diffs: usize,
    pub missing_data: usize,
    pub match_percentage: String,
}

pub struct StatementLineView {
    pub booking_date: String,
    pub tx_type: String,
    pub counterparty: String,
    pub description: String,
    pub amount: String,
    pub is_debit: bool,
}

pub struct StatementSummaryView {
    pub account_name: String,
    pub iban: String,
    pub currency: String,
    pub opening_balance: String,
    pub closing_balance: String,
    pub total_debited: String,
    pub total_credited: String,
    pub transaction_count: i64,
}

pub struct ExportAuditView {
    pub timestamp: String,
    pub bank: String,
    pub iban: String,
    pub destination: String,
    pub export_format: String,
    pub closingdate: String,
    pub filename: String,
    pub record_count: String,
    pub success: bool,
    pub error_message: String,
}

pub struct ExportConfigView {
    pub id: i32,
    pub enabled: bool,
    pub bank: String,
    pub iban: String,
    pub exportformat: String,
    pub destination: String,
    pub outputpath: String,
}

impl From<&DailyAudit> for AuditView {
    fn from(row: &DailyAudit) -> Self {
        let status_class = match row.status.as_str() {
            "PERFECT_MATCH" => "status-perfect",
            "MINOR_DIFF" => "status-minor",
            "MAJOR_DIFF" => "status-major",
            _ => "status-missing",
        };
        Self {
            iban: row.iban.clone(),
            owner_name: row.owner_name.clone(),
            day: format_date(row.day),
            status: row.status.as_str(),
            status_class,
            opening_balance: format_amount(row.opening_balance),
            sum_transactions: format_amount(row.sum_transactions),
            transaction_count: row.transaction_count,
            closing_balance: format_amount(row.closing_balance),
            expected_closing: format_amount(row.expected_closing),
            difference: format_amount(row.difference),
            currency: row.currency.clone(),
        }
    }
}

impl From<&ReconciliationReportSummary> for ReportSummaryView {
    fn from(s: &ReconciliationReportSummary) -> Self {
        Self {
            total_rows: s.total_rows,
            perfect_matches: s.perfect_matches,
            minor_diffs: s.minor_diffs,
            major_diffs: s.major_diffs,
            missing_data: s.missing_data,
            match_percentage: format!("{:.1}", s.match_percentage),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "bai/transactions.html")]
pub struct TransactionsTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub rows: Vec<TransactionView>,
    pub known_ibans: Vec<String>,
    pub selected_ibans: Vec<String>,
    pub days: i32,
    pub date_from: String,
    pub date_to: String,
    pub amount_min: String,
    pub amount_max: String,
    pub counterparty: String,
}

#[derive(Template)]
#[template(path = "bai/balances.html")]
pub struct BalancesTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub balances: Vec<BalanceView>,
    pub audits: Vec<AuditView>,
    pub known_ibans: Vec<String>,
    pub selected_ibans: Vec<String>,
    pub days: i32,
}

#[derive(Template)]
#[template(path = "bai/reconciliation_report.html")]
pub struct ReconciliationReportTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub summary: ReportSummaryView,
    pub rows: Vec<AuditView>,
    pub known_ibans: Vec<String>,
    pub selected_ibans: Vec<String>,
    pub days: i32,
}

#[derive(Template)]
#[template(path = "bai/statements.html")]
pub struct StatementsTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub known_ibans: Vec<String>,
    pub selected_iban: String,
    pub date_from: String,
    pub date_to: String,
    pub summary: Option<StatementSummaryView>,
    pub lines: Vec<StatementLineView>,
}

#[derive(Template)]
#[template(path = "bai/export_status.html")]
pub struct ExportStatusTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub rows: Vec<ExportAuditView>,
    pub success_count: i64,
    pub success_no_tx_count: i64,
    pub failed_count: i64,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub filter_bank: String,
    pub filter_iban: String,
    pub filter_success: String,
    pub filter_date_from: String,
    pub filter_date_to: String,
}

#[derive(Template)]
#[template(path = "bai/export_config.html")]
pub struct ExportConfigTemplate {
    pub user: SessionUser,
    pub flashes: Vec<Flash>,
    pub configs: Vec<ExportConfigView>,
}

// ---------------------------------------------------------------------------
// Queries and forms
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub days: Option<i32>,
    /// Comma-separated IBAN selection.
    pub ibans: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub amount_min: Option<String>,
    pub amount_max: Option<String>,
    pub counterparty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i32>,
    pub ibans: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub iban: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportStatusQuery {
    pub bank: Option<String>,
    pub iban: Option<String>,
    pub success: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExportConfigForm {
    pub action: String,
    pub id: Option<i32>,
    pub enabled: Option<String>,
    pub bank: Option<String>,
    pub iban: Option<String>,
    pub exportformat: Option<String>,
    pub destination: Option<String>,
    pub outputpath: Option<String>,
    pub fileprefix: Option<String>,
    pub fileextension: Option<String>,
    pub includedate: Option<String>,
    pub dateformat: Option<String>,
}

fn split_ibans(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clamp_days(days: Option<i32>) -> i32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, 365)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn transactions(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<TransactionQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let selected_ibans = split_ibans(&query.ibans);
    let days = clamp_days(query.days);
    let filter = crate::models::TransactionFilter {
        days,
        ibans: selected_ibans.clone(),
        date_from: parse_query_date(&query.date_from),
        date_to: parse_query_date(&query.date_to),
        amount_min: query.amount_min.as_deref().and_then(parse_decimal),
        amount_max: query.amount_max.as_deref().and_then(parse_decimal),
        counterparty: non_empty(&query.counterparty),
    };

    let data = async {
        Ok::<_, AppError>((
            state.bai.transactions(&filter).await?,
            state.bai.known_ibans().await?,
        ))
    }
    .await;
    let (transactions, known_ibans) =
        page_data(&session, "transactions", data, (Vec::new(), Vec::new())).await;

    let rows = transactions
        .iter()
        .map(|t| {
            // Outgoing money names the creditor, incoming the debtor.
            let counterparty = if t.transaction_amount.is_sign_negative() {
                t.creditor_name.as_deref()
            } else {
                t.debtor_name.as_deref()
            }
            .unwrap_or("")
            .to_string();

            TransactionView {
                booking_date: format_date(t.booking_date),
                iban: t.iban.clone(),
                amount: format_amount(t.transaction_amount),
                is_debit: t.transaction_amount.is_sign_negative(),
                counterparty,
                description: t.description.clone().unwrap_or_default(),
                tx_type: t.transaction_type_name.clone().unwrap_or_default(),
            }
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(TransactionsTemplate {
        user,
        flashes,
        rows,
        known_ibans,
        selected_ibans,
        days,
        date_from: query.date_from.unwrap_or_default(),
        date_to: query.date_to.unwrap_or_default(),
        amount_min: query.amount_min.unwrap_or_default(),
        amount_max: query.amount_max.unwrap_or_default(),
        counterparty: query.counterparty.unwrap_or_default(),
    }
    .into_response())
}

pub async fn balances(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<WindowQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let selected_ibans = split_ibans(&query.ibans);
    let days = clamp_days(query.days);

    let data = async {
        let balances = state.bai.balances(days, &selected_ibans).await?;
        let (audits, _) = state
            .bai
            .reconciliation_report(days as i64, &selected_ibans)
            .await?;
        let known = state.bai.known_ibans().await?;
        Ok::<_, AppError>((balances, audits, known))
    }
    .await;
    let (balance_rows, audit_rows, known_ibans) = page_data(
        &session,
        "balances",
        data,
        (Vec::new(), Vec::new(), Vec::new()),
    )
    .await;

    let balances = balance_rows
        .iter()
        .map(|b| BalanceView {
            reference_date: format_date(b.reference_date),
            iban: b.iban.clone(),
            balance_type: b.balance_type.clone(),
            amount: format_amount(b.amount),
            currency: b.currency.clone().unwrap_or_default(),
        })
        .collect();
    let audits = audit_rows.iter().map(AuditView::from).collect();

    let flashes = take_flash(&session).await;
    Ok(BalancesTemplate {
        user,
        flashes,
        balances,
        audits,
        known_ibans,
        selected_ibans,
        days,
    }
    .into_response())
}

pub async fn reconciliation_report(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<WindowQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let selected_ibans = split_ibans(&query.ibans);
    let days = clamp_days(query.days);

    let data = async {
        Ok::<_, AppError>((
            state
                .bai
                .reconciliation_report(days as i64, &selected_ibans)
                .await?,
            state.bai.known_ibans().await?,
        ))
    }
    .await;
    let ((rows, summary), known_ibans) = page_data(
        &session,
        "the reconciliation report",
        data,
        (
            (Vec::new(), ReconciliationReportSummary::default()),
            Vec::new(),
        ),
    )
    .await;

    let flashes = take_flash(&session).await;
    Ok(ReconciliationReportTemplate {
        user,
        flashes,
        summary: ReportSummaryView::from(&summary),
        rows: rows.iter().map(AuditView::from).collect(),
        known_ibans,
        selected_ibans,
        days,
    }
    .into_response())
}

fn statement_period(query: &StatementQuery) -> (NaiveDate, NaiveDate) {
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let from = parse_query_date(&query.date_from).unwrap_or(yesterday);
    let to = parse_query_date(&query.date_to).unwrap_or(yesterday);
    if from <= to {
        (from, to)
    } else {
        (to, from)
    }
}

pub async fn statements(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<StatementQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let (from, to) = statement_period(&query);
    let selected_iban = non_empty(&query.iban).unwrap_or_default();

    let data = async {
        let known = state.bai.known_ibans().await?;
        let statement = if selected_iban.is_empty() {
            None
        } else {
            Some(state.bai.statement(&selected_iban, from, to).await?)
        };
        Ok::<_, AppError>((known, statement))
    }
    .await;
    let (known_ibans, statement) =
        page_data(&session, "the statement", data, (Vec::new(), None)).await;

    let (summary, lines) = if let Some((summary, lines)) = statement {
        let line_views = lines
            .iter()
            .map(|l| {
                let counterparty = if l.transaction_amount.is_sign_negative() {
                    l.creditor_name.as_deref()
                } else {
                    l.debtor_name.as_deref()
                }
                .unwrap_or("")
                .to_string();
                StatementLineView {
                    booking_date: format_date(l.booking_date),
                    tx_type: l.transaction_type_name.clone().unwrap_or_default(),
                    counterparty,
                    description: l.description.clone().unwrap_or_default(),
                    amount: format_amount(l.transaction_amount),
                    is_debit: l.transaction_amount.is_sign_negative(),
                }
            })
            .collect();
        let summary_view = StatementSummaryView {
            account_name: summary.account_name,
            iban: summary.iban,
            currency: summary.currency.unwrap_or_else(|| "EUR".to_string()),
            opening_balance: format_amount(summary.opening_balance),
            closing_balance: format_amount(summary.closing_balance),
            total_debited: format_amount(summary.total_debited),
            total_credited: format_amount(summary.total_credited),
            transaction_count: summary.transaction_count,
        };
        (Some(summary_view), line_views)
    } else {
        (None, Vec::new())
    };

    let flashes = take_flash(&session).await;
    Ok(StatementsTemplate {
        user,
        flashes,
        known_ibans,
        selected_iban,
        date_from: from.format("%Y-%m-%d").to_string(),
        date_to: to.format("%Y-%m-%d").to_string(),
        summary,
        lines,
    }
    .into_response())
}

pub async fn statement_pdf(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<StatementQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let iban = match non_empty(&query.iban) {
        Some(iban) => iban,
        None => {
            flash(&session, "error", "Select an account first").await;
            return Ok(Redirect::to("/bai/statements").into_response());
        }
    };

    let (from, to) = statement_period(&query);
    let (summary, lines) = match state.bai.statement(&iban, from, to).await {
        Ok(statement) => statement,
        Err(e) => {
            flash(&session, "error", format!("Error loading the statement: {e}")).await;
            return Ok(Redirect::to("/bai/statements").into_response());
        }
    };
    let pdf = match render_statement(&summary, &lines, from, to) {
        Ok(pdf) => pdf,
        Err(e) => {
            flash(&session, "error", format!("Could not generate the PDF: {e}")).await;
            return Ok(Redirect::to("/bai/statements").into_response());
        }
    };
    let filename = statement_filename(&iban, from, to);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        pdf,
    )
        .into_response())
}

pub async fn export_status(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Query(query): Query<ExportStatusQuery>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let filter = ExportAuditFilter {
        bank: non_empty(&query.bank),
        iban: non_empty(&query.iban),
        success: match query.success.as_deref() {
            Some("1") => Some(true),
            Some("0") => Some(false),
            _ => None,
        },
        date_from: parse_query_date(&query.date_from),
        date_to: parse_query_date(&query.date_to),
    };
    let page = query.page.unwrap_or(1).max(1);

    let (rows, total, counts) = page_data(
        &session,
        "the export history",
        state.bai.export_audit(&filter, page, EXPORT_PAGE_SIZE).await,
        (Vec::new(), 0, ExportStatusCounts::default()),
    )
    .await;
    let total_pages = (total + EXPORT_PAGE_SIZE - 1) / EXPORT_PAGE_SIZE;

    let views = rows
        .iter()
        .map(|r| ExportAuditView {
            timestamp: r.timestamp.format("%d/%m/%Y %H:%M").to_string(),
            bank: r.bank.clone().unwrap_or_default(),
            iban: r.iban.clone().unwrap_or_default(),
            destination: r.destination.clone().unwrap_or_default(),
            export_format: r.export_format.clone().unwrap_or_default(),
            closingdate: r.closingdate.map(format_date).unwrap_or_default(),
            filename: r.filename.clone().unwrap_or_default(),
            record_count: r.record_count.map(|c| c.to_string()).unwrap_or_default(),
            success: r.success,
            error_message: r.error_message.clone().unwrap_or_default(),
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(ExportStatusTemplate {
        user,
        flashes,
        rows: views,
        success_count: counts.success_count.unwrap_or(0),
        success_no_tx_count: counts.success_no_tx_count.unwrap_or(0),
        failed_count: counts.failed_count.unwrap_or(0),
        page,
        total_pages,
        total,
        filter_bank: query.bank.unwrap_or_default(),
        filter_iban: query.iban.unwrap_or_default(),
        filter_success: query.success.unwrap_or_default(),
        filter_date_from: query.date_from.unwrap_or_default(),
        filter_date_to: query.date_to.unwrap_or_default(),
    }
    .into_response())
}

pub async fn export_config_page(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    let config_rows = page_data(
        &session,
        "export configurations",
        state.bai.export_configs().await,
        Vec::new(),
    )
    .await;
    let configs = config_rows
        .iter()
        .map(|c| ExportConfigView {
            id: c.id,
            enabled: c.enabled,
            bank: c.bank.clone(),
            iban: c.iban.clone(),
            exportformat: c.exportformat.clone().unwrap_or_default(),
            destination: c.destination.clone().unwrap_or_default(),
            outputpath: c.outputpath.clone().unwrap_or_default(),
        })
        .collect();

    let flashes = take_flash(&session).await;
    Ok(ExportConfigTemplate {
        user,
        flashes,
        configs,
    }
    .into_response())
}

pub async fn export_config_submit(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    session: Session,
    Form(form): Form<ExportConfigForm>,
) -> Result<Response, AppError> {
    if let Err(denied) = require_access(&session, &user, Resource::Bai).await {
        return Ok(denied);
    }

    match form.action.as_str() {
        "create" => {
            let bank = non_empty(&form.bank);
            let iban = non_empty(&form.iban);
            let (bank, iban) = match (bank, iban) {
                (Some(bank), Some(iban)) => (bank, iban),
                _ => {
                    flash(&session, "error", "Bank and IBAN are required").await;
                    return Ok(Redirect::to("/bai/exports/config").into_response());
                }
            };
            let input = ExportConfigInput {
                enabled: form.enabled.is_some(),
                bank,
                iban,
                exportformat: non_empty(&form.exportformat),
                destination: non_empty(&form.destination),
                outputpath: non_empty(&form.outputpath),
                fileprefix: non_empty(&form.fileprefix),
                fileextension: non_empty(&form.fileextension),
                includedate: form.includedate.is_some(),
                dateformat: non_empty(&form.dateformat),
            };
            match state.bai.create_export_config(&input).await {
                Ok(()) => flash(&session, "success", "Export configuration created").await,
                Err(AppError::Conflict(e)) => flash(&session, "error", e.to_string()).await,
                Err(e) => {
                    flash(
                        &session,
                        "error",
                        format!("Could not create export configuration: {e}"),
                    )
                    .await
                }
            }
        }
        "enable" | "disable" => {
            let id = match form.id {
                Some(id) => id,
                None => {
                    flash(&session, "error", "Missing export config id").await;
                    return Ok(Redirect::to("/bai/exports/config").into_response());
                }
            };
            match state
                .bai
                .set_export_config_enabled(id, form.action == "enable")
                .await
            {
                Ok(()) => flash(&session, "success", "Export configuration updated").await,
                Err(e) => {
                    flash(
                        &session,
                        "error",
                        format!("Could not update export configuration: {e}"),
                    )
                    .await
                }
            }
        }
        "delete" => {
            let id = match form.id {
                Some(id) => id,
                None => {
                    flash(&session, "error", "Missing export config id").await;
                    return Ok(Redirect::to("/bai/exports/config").into_response());
                }
            };
            match state.bai.delete_export_config(id).await {
                Ok(()) => flash(&session, "success", "Export configuration deleted").await,
                Err(e) => {
                    flash(
                        &session,
                        "error",
                        format!("Could not delete export configuration: {e}"),
                    )
                    .await
                }
            }
        }
        other => {
            flash(&session, "error", format!("Unknown action '{other}'")).await;
        }
    }

    Ok(Redirect::to("/bai/exports/config").into_response())
}
