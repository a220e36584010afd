pub mod api;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod query;
pub mod views;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::query::QueryExecutor;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub executor: QueryExecutor,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let executor = QueryExecutor::new(Arc::new(db.clone()));
        Self {
            config,
            db,
            executor,
        }
    }
}
