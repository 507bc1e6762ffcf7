use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::api::handlers::ApiError;
use crate::api::models::{
    GameView, HistoryQuery, MatchHistoryResponse, NewGameRequest, NewGameResponse,
    NewPlayerRequest,
};
use crate::api::state::AppState;
use crate::domain::models::{GameStatus, PlayerId};
use crate::domain::position::{Position, START_FEN};
use crate::domain::rules::Rules;
use crate::domain::services::MATCH_HISTORY_LIMIT;

pub async fn create_player(
    State(state): State<AppState>,
    Json(payload): Json<NewPlayerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }
    let player = state.service.repository().create_player(username).await?;
    info!(player_id = player.id, username, "player registered");
    Ok((StatusCode::CREATED, Json(player)))
}

pub async fn match_history(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repository = state.service.repository();
    if repository.load_player(player_id).await?.is_none() {
        return Err(ApiError::not_found(format!("player {player_id} not found")));
    }
    let limit = query
        .limit
        .unwrap_or(MATCH_HISTORY_LIMIT)
        .clamp(1, MATCH_HISTORY_LIMIT);
    let games = repository.match_history(player_id, limit).await?;
    Ok(Json(MatchHistoryResponse { player_id, games }))
}

pub async fn create_game(
    State(state): State<AppState>,
    Json(payload): Json<NewGameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let initial_fen = match payload.initial_fen.as_deref() {
        Some(fen) => {
            let position =
                Position::from_fen(fen).map_err(|e| ApiError::bad_request(e.to_string()))?;
            if let Some(kind) = Rules::classify(&position) {
                return Err(ApiError::bad_request(format!(
                    "initial position is already over ({kind:?})"
                )));
            }
            position.to_fen()
        }
        None => START_FEN.to_string(),
    };

    let game_id = state
        .service
        .repository()
        .create_game(payload.white_player_id, payload.black_player_id, &initial_fen)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(NewGameResponse {
            game_id,
            status: GameStatus::Active,
        }),
    ))
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .service
        .repository()
        .load_game(&game_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("game {game_id} not found")))?;
    let live = state.service.snapshot(&record.game_id).await;
    Ok(Json(GameView { record, live }))
}
