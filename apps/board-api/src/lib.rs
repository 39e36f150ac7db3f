pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use board_common::SnowflakeGenerator;
use config::Config;
use db::pool::DbPool;
use gateway::Gateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub gateway: Arc<Gateway>,
}
