pub mod bai;
pub mod database;
pub mod import;
pub mod policy;
pub mod recon;
pub mod reconcile;
pub mod statement_pdf;
pub mod users;
