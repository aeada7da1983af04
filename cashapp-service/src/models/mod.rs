//! Domain models for cashapp-service.

pub mod account;
pub mod balance;
pub mod export;
pub mod import_log;
pub mod payment;
pub mod reconciliation;
pub mod transaction;
pub mod user;

pub use account::AccountInfo;
pub use balance::BalanceRow;
pub use export::{ExportAuditRow, ExportConfigRow, ExportStatusCounts};
pub use import_log::{ImportLogRow, ImportOutcome, ImportStats, ImportStatus};
pub use payment::{
    BrandBreakdownRow, CountryBreakdownRow, DailyVolumeRow, DataDateRange, DashboardStats,
    DataSourceRow, MerchantBreakdownRow, PartitionInfoRow, PaymentFilter, PaymentListRow,
    ReconciliationExceptionRow, ReconciliationSummary, UnmatchedPaymentRow, WorldlinePayment,
};
pub use reconciliation::{AuditStatus, DailyAudit, ReconciliationReportSummary};
pub use transaction::{
    BankTransaction, StatementLine, StatementSummary, TransactionFilter, TransactionSummaryRow,
};
pub use user::{SessionUser, User};
