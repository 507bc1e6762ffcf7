use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::game::{create_game, create_player, get_game, match_history};
use crate::api::handlers::matchmaking::{check_match, join_queue, leave_queue};
use crate::api::handlers::ws::game_socket;
use crate::api::state::AppState;

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/players", post(create_player))
        .route("/players/:id/games", get(match_history))
        .route("/games", post(create_game))
        .route("/games/:id", get(get_game))
        .route("/queue", post(join_queue))
        .route("/queue/:player_id", delete(leave_queue))
        .route("/queue/:player_id/match", post(check_match));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(game_socket))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
