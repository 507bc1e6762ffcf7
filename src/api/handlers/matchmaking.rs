use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::api::handlers::ApiError;
use crate::api::models::QueueRequest;
use crate::api::state::AppState;
use crate::domain::models::{MatchStatus, PlayerId};
use crate::domain::position::START_FEN;

pub async fn join_queue(
    State(state): State<AppState>,
    Json(payload): Json<QueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .repository()
        .join_queue(payload.player_id)
        .await?;
    info!(player_id = payload.player_id, "player looking for a game");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_queue(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.repository().leave_queue(player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Polled by queued players until it reports a game.
pub async fn check_match(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<MatchStatus>, ApiError> {
    let requester_is_white = rand::random::<bool>();
    let status = state
        .service
        .repository()
        .check_match(player_id, START_FEN, requester_is_white)
        .await?;
    Ok(Json(status))
}
