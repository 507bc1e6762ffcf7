use crate::domain::models::{GameId, GameStatus, PlayerId, Role, TerminalKind};
use serde::Serialize;

/// Events fanned out to every connection bound to a game.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameJoined {
        game_id: GameId,
        color: Role,
        fen: String,
        is_white_turn: bool,
    },
    MoveMade {
        game_id: GameId,
        #[serde(rename = "move")]
        notation: String,
        fen: String,
        is_white_turn: bool,
        is_check: bool,
    },
    GameOver {
        game_id: GameId,
        status: GameStatus,
        reason: TerminalKind,
        winner_id: Option<PlayerId>,
    },
}
