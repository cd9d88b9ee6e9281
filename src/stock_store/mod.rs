//! Storage for dashboard stock records.

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::Stock;
pub use store::SqliteStockStore;
pub use trait_def::StockStore;
