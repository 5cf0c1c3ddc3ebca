//! Prediction service probe.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::prediction::ServiceHealth;

/// `GET /api/service/health`: relays the prediction service's own
/// `/health`. A failed probe is a 502 carrying the failure message.
pub async fn health(State(ctx): State<ApiContext>) -> Result<Json<ServiceHealth>, ApiError> {
    let predictor = ctx.core.predictor();
    let health = tokio::task::spawn_blocking(move || predictor.health()).await??;
    Ok(Json(health))
}
