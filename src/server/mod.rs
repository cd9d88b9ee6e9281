//! HTTP surface. Thin adapters over the store, dispatcher, and
//! orchestrator; all domain decisions live below this layer.

mod refresh_routes;
mod state;
mod stock_routes;

pub use state::ServerState;

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .merge(stock_routes::routes())
        .merge(refresh_routes::routes())
        .with_state(state)
}

/// Serve until the shutdown token fires; in-flight requests drain.
pub async fn run_server(
    port: u16,
    state: ServerState,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        AnalysisRunner, AnalyzerError, JobDispatcher, JobJournal,
    };
    use crate::audit::StatementAuditLog;
    use crate::refresh::{RefreshOrchestrator, RefreshSettings};
    use crate::stock_store::{SqliteStockStore, StockStore};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoRunner;

    #[async_trait]
    impl AnalysisRunner for EchoRunner {
        async fn run(&self, code: &str) -> Result<String, AnalyzerError> {
            if code == "bad" {
                Err(AnalyzerError::Failed {
                    stderr: "analyzer rejected code".to_string(),
                })
            } else {
                Ok(format!("analyzed {}", code))
            }
        }
    }

    fn test_router() -> (Router, Arc<dyn StockStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let audit = Arc::new(StatementAuditLog::new(dir.path().join("audit")).unwrap());
        let store: Arc<dyn StockStore> = Arc::new(SqliteStockStore::in_memory(audit).unwrap());
        let journal = Arc::new(JobJournal::new());
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::new(EchoRunner),
            journal.clone(),
            4,
            CancellationToken::new(),
        ));
        let orchestrator = Arc::new(RefreshOrchestrator::new(
            store.clone(),
            dispatcher.clone(),
            RefreshSettings::default(),
        ));
        let router = build_router(ServerState {
            stock_store: store.clone(),
            dispatcher,
            orchestrator,
            journal,
        });
        (router, store, dir)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_list_stocks_empty() {
        let (router, _store, _dir) = test_router();

        let response = router.oneshot(empty_request("GET", "/stocks")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_upsert_then_get_stock() {
        let (router, _store, _dir) = test_router();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/stocks",
                json!({"code": "7203", "name": "Toyota"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .oneshot(empty_request("GET", "/stocks/7203"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stock = body_json(response).await;
        assert_eq!(stock["code"], "7203");
        assert_eq!(stock["name"], "Toyota");
        assert_eq!(stock["price"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_unknown_stock_is_404() {
        let (router, _store, _dir) = test_router();

        let response = router
            .oneshot(empty_request("GET", "/stocks/0000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_field_update_routes() {
        let (router, store, _dir) = test_router();
        store.upsert_stock("7203", "Toyota").unwrap();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/stocks/7203/update-buy-price",
                json!({"value": 1500.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/stocks/7203/update-favorite",
                json!({"value": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/stocks/7203/update-analysis",
                json!({"price": 1650.0, "rsi": 55.2}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let stock = store.get_stock("7203").unwrap().unwrap();
        assert_eq!(stock.buy_price, Some(1500.0));
        assert!(stock.favorite);
        assert_eq!(stock.price, Some(1650.0));
        assert_eq!(stock.rsi, Some(55.2));

        // Unknown code reports 404, not a silent no-op.
        let response = router
            .oneshot(json_request(
                "POST",
                "/stocks/0000/update-shares",
                json!({"value": 100}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_routes_answer_accepted() {
        let (router, store, _dir) = test_router();
        store.upsert_stock("7203", "Toyota").unwrap();
        store.upsert_stock("9984", "SoftBank").unwrap();

        let response = router
            .clone()
            .oneshot(empty_request("POST", "/refresh/all"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await, json!({"accepted": 2}));

        // Both records are unpriced, so any threshold finds them stale.
        let response = router
            .oneshot(empty_request("POST", "/refresh/stale?hours=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await, json!({"accepted": 2}));
    }

    #[tokio::test]
    async fn test_refresh_stale_rejects_out_of_range_hours() {
        let (router, store, _dir) = test_router();
        store.upsert_stock("7203", "Toyota").unwrap();

        let response = router
            .oneshot(empty_request(
                "POST",
                "/refresh/stale?hours=18446744073709551615",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_one_success_and_failure() {
        let (router, _store, _dir) = test_router();

        let response = router
            .clone()
            .oneshot(empty_request("POST", "/analyze/7203"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "analyzed 7203");

        let response = router
            .oneshot(empty_request("POST", "/analyze/bad"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(response).await, "analyzer rejected code");
    }

    #[tokio::test]
    async fn test_jobs_snapshot() {
        let (router, _store, _dir) = test_router();

        router
            .clone()
            .oneshot(empty_request("POST", "/analyze/7203"))
            .await
            .unwrap();

        let response = router.oneshot(empty_request("GET", "/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let jobs = body_json(response).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        assert_eq!(jobs[0]["code"], "7203");
        assert_eq!(jobs[0]["state"], "succeeded");
    }
}
