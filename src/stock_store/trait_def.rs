//! StockStore trait definition.

use super::models::Stock;
use anyhow::Result;
use std::time::Duration;

/// Trait for stock storage backends.
pub trait StockStore: Send + Sync {
    /// All stocks, in store order.
    fn list_stocks(&self) -> Result<Vec<Stock>>;

    /// Codes of all stocks, in store order.
    fn list_codes(&self) -> Result<Vec<String>>;

    /// Look up one stock by code.
    fn get_stock(&self, code: &str) -> Result<Option<Stock>>;

    /// Insert a stock, or update its name if the code already exists.
    fn upsert_stock(&self, code: &str, name: &str) -> Result<()>;

    /// Update the user's buy price. Returns false if the code is unknown.
    fn set_buy_price(&self, code: &str, price: f64) -> Result<bool>;

    /// Update the user's sell price. Returns false if the code is unknown.
    fn set_sell_price(&self, code: &str, price: f64) -> Result<bool>;

    /// Update the held share count. Returns false if the code is unknown.
    fn set_shares(&self, code: &str, shares: i64) -> Result<bool>;

    /// Toggle the favorite flag. Returns false if the code is unknown.
    fn set_favorite(&self, code: &str, favorite: bool) -> Result<bool>;

    /// Record the analyzer's output for a stock: the current price and,
    /// when computed, the RSI. Returns false if the code is unknown.
    fn set_analysis(&self, code: &str, price: f64, rsi: Option<f64>) -> Result<bool>;

    /// Codes of stocks due for re-analysis: last mutated strictly more than
    /// `threshold` before `now` (epoch seconds), or never priced. Evaluated
    /// as a single query; ordering is whatever the store returns and is only
    /// stable within one call.
    fn find_stale(&self, now: i64, threshold: Duration) -> Result<Vec<String>>;
}
