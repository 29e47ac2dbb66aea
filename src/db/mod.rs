mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::TokenKeys;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all handlers.
///
/// The payment gateway is injected behind a trait object so tests can swap
/// in a double; there is no global gateway configuration.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub tokens: TokenKeys,
    /// Where the gateway redirects users after checkout/onboarding.
    pub frontend_url: String,
    /// Joining creates a `booked` participation pending host acceptance
    /// instead of confirming straight from the checkout webhook.
    pub require_host_approval: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
