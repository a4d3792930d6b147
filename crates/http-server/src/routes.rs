//! Read API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use ticker_core::{normalize_symbol, SymbolQuery};
use ticker_price_feed::AggregationRegistry;

use crate::responses::{
    snapshot_body, ErrorResponse, HealthResponse, SnapshotResponse, TickerResponse,
};

pub type AppState = Arc<AggregationRegistry>;

pub fn router(registry: AppState) -> Router {
    Router::new()
        .route("/", get(all_tickers))
        .route("/ticker/:symbol", get(get_ticker))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn get_ticker(State(registry): State<AppState>, Path(symbol): Path<String>) -> Response {
    let normalized = normalize_symbol(&symbol);

    match registry.query(&normalized) {
        SymbolQuery::Found(averages) => {
            (StatusCode::OK, Json(TickerResponse::found(normalized, &averages))).into_response()
        }
        SymbolQuery::NoData => {
            debug!("No fresh samples for {}", normalized);
            (StatusCode::OK, Json(TickerResponse::no_data(normalized))).into_response()
        }
        SymbolQuery::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Symbol {} not found on any source", symbol),
            }),
        )
            .into_response(),
    }
}

async fn all_tickers(State(registry): State<AppState>) -> Json<SnapshotResponse> {
    Json(snapshot_body(&registry.snapshot_all()))
}

async fn health(State(registry): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_sources(&registry.source_health()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use ticker_core::SourceConfig;
    use ticker_price_feed::{build_source, Source, StoreConfig};

    /// wex knows BTCUSD and DOGEUSD without data; binance has DOGEUSD
    fn registry() -> AppState {
        let mut registry = AggregationRegistry::new();

        for config in [SourceConfig::wex(), SourceConfig::binance()] {
            let adapter = build_source(&config).unwrap();
            let source = Source::new(config, adapter, StoreConfig::default());
            source.store().initialize(["BTCUSD", "DOGEUSD"]);
            registry.register(source).unwrap();
        }

        registry
            .source("binance")
            .unwrap()
            .store()
            .record_sample("DOGEUSD", Decimal::new(1, 1), Utc::now())
            .unwrap();

        Arc::new(registry)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(registry())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_ticker_found_on_single_source() {
        let (status, json) = get_json("/ticker/doge_usd").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({
                "symbol": "DOGEUSD",
                "status": "ok",
                "sources": [{"source": "binance", "average": "0.1000"}]
            })
        );
    }

    #[tokio::test]
    async fn test_ticker_without_samples_is_no_data() {
        let (status, json) = get_json("/ticker/BTCUSD").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "no_data");
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_found() {
        let (status, json) = get_json("/ticker/XRPUSD").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("XRPUSD"));
    }

    #[tokio::test]
    async fn test_snapshot_lists_all_symbols() {
        let (status, json) = get_json("/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["BTCUSD"], serde_json::json!([]));
        assert_eq!(json["DOGEUSD"][0]["source"], "binance");
        assert_eq!(json["DOGEUSD"][0]["average"], "0.1000");
    }

    #[tokio::test]
    async fn test_health_reports_every_source() {
        let (status, json) = get_json("/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        let sources = json["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0]["name"], "binance");
        assert_eq!(sources[0]["state"], "idle");
        assert_eq!(sources[0]["symbols_with_data"], 1);
    }
}
