//! Bank statement rendering to PDF.
//!
//! One A4 document per statement: a header block with account and balance
//! totals, then one line per transaction, flowing onto continuation pages
//! as needed.

use crate::models::{StatementLine, StatementSummary};
use crate::utils::locale::{format_amount, format_date};
use cashapp_core::error::AppError;
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use tracing::instrument;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const LINE_HEIGHT_MM: f32 = 5.0;
const BODY_SIZE: f32 = 8.0;
const HEADER_SIZE: f32 = 14.0;
const LABEL_SIZE: f32 = 9.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Render a statement to PDF bytes.
#[instrument(skip(summary, lines), fields(iban = %summary.iban, lines = lines.len()))]
pub fn render_statement(
    summary: &StatementSummary,
    lines: &[StatementLine],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Bank statement {}", summary.iban),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    layer.use_text("Bank Statement", HEADER_SIZE, Mm(MARGIN_MM), Mm(y), &fonts.bold);
    y -= 2.0 * LINE_HEIGHT_MM;

    let currency = summary.currency.as_deref().unwrap_or("EUR");
    let header_rows = [
        ("Account", summary.account_name.clone()),
        ("IBAN", summary.iban.clone()),
        (
            "Period",
            format!("{} - {}", format_date(from), format_date(to)),
        ),
        (
            "Opening balance",
            format!("{} {}", currency, format_amount(summary.opening_balance)),
        ),
        (
            "Closing balance",
            format!("{} {}", currency, format_amount(summary.closing_balance)),
        ),
        (
            "Total debited",
            format!("{} {}", currency, format_amount(summary.total_debited)),
        ),
        (
            "Total credited",
            format!("{} {}", currency, format_amount(summary.total_credited)),
        ),
        ("Transactions", summary.transaction_count.to_string()),
    ];
    for (label, value) in header_rows {
        layer.use_text(label, LABEL_SIZE, Mm(MARGIN_MM), Mm(y), &fonts.bold);
        layer.use_text(value, LABEL_SIZE, Mm(MARGIN_MM + 45.0), Mm(y), &fonts.regular);
        y -= LINE_HEIGHT_MM;
    }
    y -= LINE_HEIGHT_MM;

    write_column_headers(&layer, &fonts, y);
    y -= LINE_HEIGHT_MM;

    for line in lines {
        if y < MARGIN_MM + LINE_HEIGHT_MM {
            let (next_page, next_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
            write_column_headers(&layer, &fonts, y);
            y -= LINE_HEIGHT_MM;
        }

        write_line(&layer, &fonts, y, line);
        y -= LINE_HEIGHT_MM;
    }

    finish(doc)
}

fn write_column_headers(layer: &PdfLayerReference, fonts: &Fonts, y: f32) {
    layer.use_text("Date", BODY_SIZE, Mm(MARGIN_MM), Mm(y), &fonts.bold);
    layer.use_text("Type", BODY_SIZE, Mm(MARGIN_MM + 22.0), Mm(y), &fonts.bold);
    layer.use_text("Counterparty", BODY_SIZE, Mm(MARGIN_MM + 50.0), Mm(y), &fonts.bold);
    layer.use_text("Description", BODY_SIZE, Mm(MARGIN_MM + 95.0), Mm(y), &fonts.bold);
    layer.use_text("Amount", BODY_SIZE, Mm(MARGIN_MM + 155.0), Mm(y), &fonts.bold);
}

fn write_line(layer: &PdfLayerReference, fonts: &Fonts, y: f32, line: &StatementLine) {
    // Outgoing money names the creditor, incoming the debtor.
    let counterparty = if line.transaction_amount.is_sign_negative() {
        line.creditor_name.as_deref()
    } else {
        line.debtor_name.as_deref()
    }
    .unwrap_or("");

    layer.use_text(
        format_date(line.booking_date),
        BODY_SIZE,
        Mm(MARGIN_MM),
        Mm(y),
        &fonts.regular,
    );
    layer.use_text(
        truncate(line.transaction_type_name.as_deref().unwrap_or(""), 18),
        BODY_SIZE,
        Mm(MARGIN_MM + 22.0),
        Mm(y),
        &fonts.regular,
    );
    layer.use_text(
        truncate(counterparty, 28),
        BODY_SIZE,
        Mm(MARGIN_MM + 50.0),
        Mm(y),
        &fonts.regular,
    );
    layer.use_text(
        truncate(line.description.as_deref().unwrap_or(""), 38),
        BODY_SIZE,
        Mm(MARGIN_MM + 95.0),
        Mm(y),
        &fonts.regular,
    );
    layer.use_text(
        format_amount(line.transaction_amount),
        BODY_SIZE,
        Mm(MARGIN_MM + 155.0),
        Mm(y),
        &fonts.regular,
    );
}

fn finish(doc: PdfDocumentReference) -> Result<Vec<u8>, AppError> {
    doc.save_to_bytes().map_err(pdf_error)
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}~")
    }
}

fn pdf_error(e: printpdf::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Failed to render PDF: {}", e))
}

/// Content-Disposition filename for a statement download.
pub fn statement_filename(iban: &str, from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "bank_statement_{}_{}_{}.pdf",
        iban,
        from.format("%Y%m%d"),
        to.format("%Y%m%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn summary() -> StatementSummary {
        StatementSummary {
            account_name: "Test BV".to_string(),
            iban: "NL91ABNA0417164300".to_string(),
            currency: Some("EUR".to_string()),
            opening_balance: Decimal::from_str("100.00").unwrap(),
            closing_balance: Decimal::from_str("130.00").unwrap(),
            total_debited: Decimal::from_str("-20.00").unwrap(),
            total_credited: Decimal::from_str("50.00").unwrap(),
            transaction_count: 2,
        }
    }

    fn line(amount: &str) -> StatementLine {
        StatementLine {
            value_date: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            transaction_type_code: Some("TRF".to_string()),
            transaction_type_name: Some("Transfer".to_string()),
            debtor_iban: Some("NL20INGB0001234567".to_string()),
            debtor_name: Some("Acme Corp".to_string()),
            creditor_iban: Some("NL91ABNA0417164300".to_string()),
            creditor_name: Some("Test BV".to_string()),
            description: Some("Invoice 2024-001".to_string()),
            end_to_end_id: None,
            transaction_amount: Decimal::from_str(amount).unwrap(),
        }
    }

    #[test]
    fn renders_a_nonempty_pdf() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let bytes =
            render_statement(&summary(), &[line("50.00"), line("-20.00")], from, to).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn many_lines_flow_onto_continuation_pages() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let lines: Vec<StatementLine> = (0..200).map(|_| line("10.00")).collect();

        let bytes = render_statement(&summary(), &lines, from, to).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn filename_embeds_iban_and_period() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            statement_filename("NL91ABNA0417164300", from, to),
            "bank_statement_NL91ABNA0417164300_20240301_20240305.pdf"
        );
    }

    #[test]
    fn truncation_keeps_short_strings_intact() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-description", 10), "a-very-lo~");
    }
}
