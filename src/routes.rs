//! HTTP routes
//!
//! | Method | Path                 | Operation      |
//! |--------|----------------------|----------------|
//! | GET    | `/health`            | health check   |
//! | GET    | `/api/library/check` | lookup         |
//! | POST   | `/check-library`     | lookup (JSON)  |
//! | DELETE | `/api/library/cache` | clear cache    |
//! | GET    | `/api/library/stats` | counters       |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ServiceResult;
use crate::lookup::LookupResponse;
use crate::service::{CacheCleared, HealthStatus, HoldingService, LookupQuery};
use crate::stats::StatsSnapshot;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    service: Arc<HoldingService>,
}

impl AppState {
    pub fn new(service: Arc<HoldingService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &HoldingService {
        &self.service
    }
}

/// Full application router with CORS and request tracing
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/library/check", get(check_by_query))
        .route("/check-library", post(check_by_body))
        .route("/api/library/cache", delete(clear_cache))
        .route("/api/library/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service().health_check())
}

/// GET /api/library/check?isbn=9788966262281
async fn check_by_query(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ServiceResult<Json<LookupResponse>> {
    Ok(Json(state.service().check_holding(&query).await?))
}

/// POST /check-library {"isbn": "...", "title": "..."}
async fn check_by_body(
    State(state): State<AppState>,
    Json(query): Json<LookupQuery>,
) -> ServiceResult<Json<LookupResponse>> {
    Ok(Json(state.service().check_holding(&query).await?))
}

async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    Json(state.service().clear_cache().await)
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.service().stats().await)
}
