//! Stock read and field-update HTTP routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::server::state::{GuardedStockStore, ServerState};

#[derive(Debug, Deserialize)]
pub struct UpsertStockBody {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceBody {
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct SharesBody {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteBody {
    pub value: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisBody {
    pub price: f64,
    #[serde(default)]
    pub rsi: Option<f64>,
}

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/stocks", get(list_stocks).post(upsert_stock))
        .route("/stocks/{code}", get(get_stock))
        .route("/stocks/{code}/update-buy-price", post(update_buy_price))
        .route("/stocks/{code}/update-sell-price", post(update_sell_price))
        .route("/stocks/{code}/update-shares", post(update_shares))
        .route("/stocks/{code}/update-favorite", post(update_favorite))
        .route("/stocks/{code}/update-analysis", post(update_analysis))
}

/// GET /stocks - All stocks as JSON.
async fn list_stocks(State(store): State<GuardedStockStore>) -> impl IntoResponse {
    match store.list_stocks() {
        Ok(stocks) => Json(stocks).into_response(),
        Err(e) => {
            warn!("Failed to list stocks: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list stocks").into_response()
        }
    }
}

/// GET /stocks/{code}
async fn get_stock(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
) -> impl IntoResponse {
    match store.get_stock(&code) {
        Ok(Some(stock)) => Json(stock).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Unknown stock code").into_response(),
        Err(e) => {
            warn!("Failed to get stock {}: {}", code, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get stock").into_response()
        }
    }
}

/// POST /stocks - Create or rename a stock.
async fn upsert_stock(
    State(store): State<GuardedStockStore>,
    Json(body): Json<UpsertStockBody>,
) -> impl IntoResponse {
    match store.upsert_stock(&body.code, &body.name) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => {
            warn!("Failed to upsert stock {}: {}", body.code, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save stock").into_response()
        }
    }
}

fn update_response(result: anyhow::Result<bool>, code: &str, field: &str) -> axum::response::Response {
    match result {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Unknown stock code").into_response(),
        Err(e) => {
            warn!("Failed to update {} for {}: {}", field, code, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update stock").into_response()
        }
    }
}

/// POST /stocks/{code}/update-buy-price
async fn update_buy_price(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
    Json(body): Json<PriceBody>,
) -> impl IntoResponse {
    update_response(store.set_buy_price(&code, body.value), &code, "buy_price")
}

/// POST /stocks/{code}/update-sell-price
async fn update_sell_price(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
    Json(body): Json<PriceBody>,
) -> impl IntoResponse {
    update_response(store.set_sell_price(&code, body.value), &code, "sell_price")
}

/// POST /stocks/{code}/update-shares
async fn update_shares(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
    Json(body): Json<SharesBody>,
) -> impl IntoResponse {
    update_response(store.set_shares(&code, body.value), &code, "shares")
}

/// POST /stocks/{code}/update-analysis - Analyzer writeback of price and RSI.
async fn update_analysis(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
    Json(body): Json<AnalysisBody>,
) -> impl IntoResponse {
    update_response(
        store.set_analysis(&code, body.price, body.rsi),
        &code,
        "analysis",
    )
}

/// POST /stocks/{code}/update-favorite
async fn update_favorite(
    Path(code): Path<String>,
    State(store): State<GuardedStockStore>,
    Json(body): Json<FavoriteBody>,
) -> impl IntoResponse {
    update_response(store.set_favorite(&code, body.value), &code, "favorite")
}
