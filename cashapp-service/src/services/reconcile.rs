//! Daily balance reconciliation.
//!
//! For each (iban, day) cell of the report grid the closing balance must
//! equal the previous day's closing balance plus the day's signed
//! transaction sum, within tolerance. Deviations are classified, never
//! silently accepted; missing data is itself a classification.

use crate::models::{AuditStatus, DailyAudit};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Differences strictly below this are a perfect match: 0.01.
fn perfect_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Differences strictly below this (but at or above the perfect
/// tolerance) are minor: 1.00.
fn minor_tolerance() -> Decimal {
    Decimal::ONE
}

/// Classify one (iban, day) cell. First matching rule wins:
///
/// 1. no opening balance        -> MissingOpening
/// 2. no closing balance        -> MissingClosing
/// 3. |difference| < 0.01       -> PerfectMatch
/// 4. |difference| < 1.00       -> MinorDiff
/// 5. otherwise                 -> MajorDiff
///
/// where difference = closing - (opening + tx_sum). Both boundaries are
/// strict: a difference of exactly 0.01 is minor, exactly 1.00 is major.
pub fn classify(
    opening: Option<Decimal>,
    closing: Option<Decimal>,
    tx_sum: Decimal,
) -> AuditStatus {
    let opening = match opening {
        Some(o) => o,
        None => return AuditStatus::MissingOpening,
    };
    let closing = match closing {
        Some(c) => c,
        None => return AuditStatus::MissingClosing,
    };

    let difference = (closing - (opening + tx_sum)).abs();
    if difference < perfect_tolerance() {
        AuditStatus::PerfectMatch
    } else if difference < minor_tolerance() {
        AuditStatus::MinorDiff
    } else {
        AuditStatus::MajorDiff
    }
}

/// Signed transaction aggregates for one (iban, day).
#[derive(Debug, Clone, Default)]
pub struct DayTransactions {
    pub count: i64,
    pub sum: Decimal,
    pub pos_count: i64,
    pub pos_sum: Decimal,
    pub neg_count: i64,
    pub neg_sum: Decimal,
    pub currency: Option<String>,
}

/// An account participating in the report grid.
#[derive(Debug, Clone)]
pub struct GridAccount {
    pub iban: String,
    pub owner_name: Option<String>,
    pub currency: Option<String>,
}

/// Closing-booked balances keyed by (iban, reference date).
pub type BalanceMap = HashMap<(String, NaiveDate), Decimal>;

/// Transaction aggregates keyed by (iban, booking date).
pub type TransactionMap = HashMap<(String, NaiveDate), DayTransactions>;

/// Assemble the full reconciliation grid: accounts x days, ordered by
/// iban ascending then day descending. The opening balance of a day is
/// the closing-booked balance of the previous day.
pub fn build_daily_audits(
    accounts: &[GridAccount],
    days: &[NaiveDate],
    balances: &BalanceMap,
    transactions: &TransactionMap,
) -> Vec<DailyAudit> {
    let mut rows = Vec::with_capacity(accounts.len() * days.len());

    for account in accounts {
        let mut days_desc: Vec<NaiveDate> = days.to_vec();
        days_desc.sort_unstable_by(|a, b| b.cmp(a));

        for day in days_desc {
            let key = (account.iban.clone(), day);
            let opening = day
                .pred_opt()
                .and_then(|prev| balances.get(&(account.iban.clone(), prev)))
                .copied();
            let closing = balances.get(&key).copied();
            let tx = transactions.get(&key).cloned().unwrap_or_default();

            let status = classify(opening, closing, tx.sum);

            let opening = opening.unwrap_or_default();
            let closing = closing.unwrap_or_default();
            let expected_closing = (opening + tx.sum).round_dp(2);
            let difference = (closing - (opening + tx.sum)).round_dp(2);

            let currency = tx
                .currency
                .clone()
                .or_else(|| account.currency.clone())
                .unwrap_or_default();

            rows.push(DailyAudit {
                iban: account.iban.clone(),
                owner_name: account.owner_name.clone().unwrap_or_default(),
                day,
                status,
                currency,
                opening_balance: opening.round_dp(2),
                sum_transactions: tx.sum.round_dp(2),
                transaction_count: tx.count,
                pos_tx_sum: tx.pos_sum.round_dp(2),
                pos_tx_count: tx.pos_count,
                neg_tx_sum: tx.neg_sum.round_dp(2),
                neg_tx_count: tx.neg_count,
                closing_balance: closing.round_dp(2),
                expected_closing,
                difference,
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReconciliationReportSummary;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn missing_opening_wins_over_everything() {
        // No opening balance row: MissingOpening regardless of other values.
        assert_eq!(
            classify(None, Some(dec("130.00")), dec("30.00")),
            AuditStatus::MissingOpening
        );
        assert_eq!(classify(None, None, dec("0")), AuditStatus::MissingOpening);
    }

    #[test]
    fn missing_closing_is_second_in_the_ladder() {
        assert_eq!(
            classify(Some(dec("100.00")), None, dec("30.00")),
            AuditStatus::MissingClosing
        );
    }

    #[test]
    fn exact_match_is_perfect() {
        // opening 100.00, transactions +50.00 and -20.00, closing 130.00
        let tx_sum = dec("50.00") + dec("-20.00");
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("130.00")), tx_sum),
            AuditStatus::PerfectMatch
        );
    }

    #[test]
    fn boundary_at_perfect_tolerance_is_exclusive() {
        // |difference| strictly below 0.01 is perfect; exactly 0.01 is minor.
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("100.009")), dec("0")),
            AuditStatus::PerfectMatch
        );
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("100.01")), dec("0")),
            AuditStatus::MinorDiff
        );
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("99.99")), dec("0")),
            AuditStatus::MinorDiff
        );
    }

    #[test]
    fn boundary_at_minor_tolerance_is_exclusive() {
        // |difference| strictly below 1.00 is minor; exactly 1.00 is major.
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("100.99")), dec("0")),
            AuditStatus::MinorDiff
        );
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("101.00")), dec("0")),
            AuditStatus::MajorDiff
        );
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("99.00")), dec("0")),
            AuditStatus::MajorDiff
        );
    }

    #[test]
    fn large_deviation_is_major() {
        // opening 100.00, tx sum +30.00, closing 131.50: difference 1.50
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("131.50")), dec("30.00")),
            AuditStatus::MajorDiff
        );
    }

    #[test]
    fn no_transactions_means_zero_sum() {
        assert_eq!(
            classify(Some(dec("100.00")), Some(dec("100.00")), Decimal::ZERO),
            AuditStatus::PerfectMatch
        );
    }

    #[test]
    fn grid_uses_previous_day_closing_as_opening() {
        let accounts = vec![GridAccount {
            iban: "NL91ABNA0417164300".to_string(),
            owner_name: Some("Test BV".to_string()),
            currency: Some("EUR".to_string()),
        }];
        let days = vec![date("2024-03-05")];

        let mut balances = BalanceMap::new();
        balances.insert(
            ("NL91ABNA0417164300".to_string(), date("2024-03-04")),
            dec("100.00"),
        );
        balances.insert(
            ("NL91ABNA0417164300".to_string(), date("2024-03-05")),
            dec("130.00"),
        );

        let mut transactions = TransactionMap::new();
        transactions.insert(
            ("NL91ABNA0417164300".to_string(), date("2024-03-05")),
            DayTransactions {
                count: 2,
                sum: dec("30.00"),
                pos_count: 1,
                pos_sum: dec("50.00"),
                neg_count: 1,
                neg_sum: dec("-20.00"),
                currency: Some("EUR".to_string()),
            },
        );

        let rows = build_daily_audits(&accounts, &days, &balances, &transactions);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.status, AuditStatus::PerfectMatch);
        assert_eq!(row.opening_balance, dec("100.00"));
        assert_eq!(row.closing_balance, dec("130.00"));
        assert_eq!(row.expected_closing, dec("130.00"));
        assert_eq!(row.difference, dec("0.00"));
        assert_eq!(row.pos_tx_count, 1);
        assert_eq!(row.neg_tx_count, 1);
        assert_eq!(row.owner_name, "Test BV");
        assert_eq!(row.currency, "EUR");
    }

    #[test]
    fn grid_orders_days_descending_per_iban() {
        let accounts = vec![GridAccount {
            iban: "NL91ABNA0417164300".to_string(),
            owner_name: None,
            currency: None,
        }];
        let days = vec![date("2024-03-04"), date("2024-03-05"), date("2024-03-03")];

        let rows = build_daily_audits(
            &accounts,
            &days,
            &BalanceMap::new(),
            &TransactionMap::new(),
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].day, date("2024-03-05"));
        assert_eq!(rows[1].day, date("2024-03-04"));
        assert_eq!(rows[2].day, date("2024-03-03"));
        // No balance data anywhere: every cell is MissingOpening.
        assert!(rows.iter().all(|r| r.status == AuditStatus::MissingOpening));
    }

    #[test]
    fn summary_counts_each_class() {
        let accounts = vec![GridAccount {
            iban: "NL91ABNA0417164300".to_string(),
            owner_name: None,
            currency: None,
        }];
        let days = vec![date("2024-03-05")];
        let mut balances = BalanceMap::new();
        balances.insert(
            ("NL91ABNA0417164300".to_string(), date("2024-03-04")),
            dec("100.00"),
        );
        balances.insert(
            ("NL91ABNA0417164300".to_string(), date("2024-03-05")),
            dec("100.00"),
        );

        let rows =
            build_daily_audits(&accounts, &days, &balances, &TransactionMap::new());
        let summary = ReconciliationReportSummary::from_rows(&rows);
        assert_eq!(summary.total_rows, 1);
        assert_eq!(summary.perfect_matches, 1);
        assert_eq!(summary.match_percentage, 100.0);
    }
}
