use serde::Serialize;

/// One listed instrument.
///
/// `code` is the globally unique identifier and never changes after the
/// record is created. `updated_at` is maintained by the store on every
/// mutation; `price` stays NULL until the external analyzer populates it.
#[derive(Debug, Clone, Serialize)]
pub struct Stock {
    pub code: String,
    pub name: String,
    /// Latest analyzed price; NULL means never analyzed (or analysis
    /// failed to populate it).
    pub price: Option<f64>,
    /// Latest analyzed RSI.
    pub rsi: Option<f64>,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub shares: Option<i64>,
    pub favorite: bool,
    /// Epoch seconds of the last mutation, set by the store.
    pub updated_at: i64,
    pub created_at: i64,
}
