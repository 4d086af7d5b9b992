use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::service::{ProfileService, ScoreRequest, ScoreResponse, StrategyView};
use crate::error::AppError;

/// Router exposing report scoring and strategy lookup.
pub fn profile_router(service: Arc<ProfileService>) -> Router {
    Router::new()
        .route("/api/v1/profile/score", post(score_handler))
        .route("/api/v1/strategies", get(strategy_list_handler))
        .route("/api/v1/strategies/:key", get(strategy_handler))
        .with_state(service)
}

pub(crate) async fn score_handler(
    State(service): State<Arc<ProfileService>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    Ok(Json(service.score(request)?))
}

pub(crate) async fn strategy_handler(
    State(service): State<Arc<ProfileService>>,
    Path(key): Path<String>,
) -> Result<Json<StrategyView>, AppError> {
    Ok(Json(service.strategy(&key)?))
}

pub(crate) async fn strategy_list_handler(
    State(service): State<Arc<ProfileService>>,
) -> Json<Value> {
    Json(json!({
        "strategies": service.strategy_keys(),
        "default": service.defaults().strategy,
    }))
}
