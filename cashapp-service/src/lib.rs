pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::CashappConfig;
use services::{
    bai::BaiRepository, database::Database, import::WorldlineCsvImporter, recon::ReconRepository,
    users::UserRepository,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: CashappConfig,
    pub db: Database,
    pub users: UserRepository,
    pub bai: BaiRepository,
    pub recon: ReconRepository,
    pub importer: WorldlineCsvImporter,
}

impl AppState {
    pub fn new(config: CashappConfig, db: Database) -> Self {
        let pool = db.pool().clone();
        Self {
            users: UserRepository::new(pool.clone()),
            bai: BaiRepository::new(pool.clone()),
            recon: ReconRepository::new(pool.clone()),
            importer: WorldlineCsvImporter::new(pool, config.import.batch_size),
            config,
            db,
        }
    }
}
