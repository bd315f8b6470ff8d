//! Command endpoints
//!
//! One POST route per host command. Bodies use the same camelCase field names
//! as the Plan/Track documents.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use dcmp_common::{ApiKey, Instrument, Plan, Track};

use crate::error::ApiResult;
use crate::AppState;

/// Body of `validate_api_key` and `set_api_key`
#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub key: String,
}

/// Body of `generate_plan`
#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    /// Free-form user request
    pub content: String,
    /// Current plan when revising
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Tracks generated so far
    #[serde(default)]
    pub tracks: Option<Vec<Track>>,
}

/// Body of `generate_track`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTrackRequest {
    pub plan: Plan,
    #[serde(default)]
    pub existing_tracks: Vec<Track>,
    pub instrument_to_generate: Instrument,
}

/// POST /commands/validate_api_key
///
/// Always 200; the body is `true` only when the provider accepted the key.
pub async fn validate_api_key(
    State(state): State<AppState>,
    Json(request): Json<ApiKeyRequest>,
) -> Json<bool> {
    Json(state.composer.validate_api_key(&request.key).await)
}

/// POST /commands/set_api_key
///
/// Stores the key exactly as sent and always answers `true`.
pub async fn set_api_key(
    State(state): State<AppState>,
    Json(request): Json<ApiKeyRequest>,
) -> Json<bool> {
    Json(state.composer.set_api_key(ApiKey::from_raw(&request.key)).await)
}

/// POST /commands/generate_plan
pub async fn generate_plan(
    State(state): State<AppState>,
    Json(request): Json<GeneratePlanRequest>,
) -> ApiResult<Json<Plan>> {
    let tracks = request.tracks.unwrap_or_default();

    let plan = state
        .composer
        .produce_plan(&request.content, request.plan.as_ref(), &tracks)
        .await?;

    Ok(Json(plan))
}

/// POST /commands/generate_track
pub async fn generate_track(
    State(state): State<AppState>,
    Json(request): Json<GenerateTrackRequest>,
) -> ApiResult<Json<Track>> {
    let target = &request.instrument_to_generate;
    if request.plan.instrument(&target.instrument_name).is_none() {
        info!(
            instrument = %target.instrument_name,
            "Requested instrument is not part of the plan's instrumentation"
        );
    }

    let track = state
        .composer
        .produce_track(&request.plan, &request.existing_tracks, target)
        .await?;

    Ok(Json(track))
}

/// Build command routes
pub fn command_routes() -> Router<AppState> {
    Router::new()
        .route("/commands/validate_api_key", post(validate_api_key))
        .route("/commands/set_api_key", post(set_api_key))
        .route("/commands/generate_plan", post(generate_plan))
        .route("/commands/generate_track", post(generate_track))
}
