use crate::application::game_service::{Durability, MoveReceipt};
use crate::domain::game::SessionSnapshot;
use crate::domain::models::{
    GameId, GameRecord, GameStatus, MatchHistoryEntry, PlayerId, Role,
};
use serde::{Deserialize, Serialize};

/// Game ids arrive either as JSON strings or as bare numbers.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum GameIdParam {
    Text(String),
    Number(i64),
}

impl GameIdParam {
    pub fn into_game_id(self) -> GameId {
        match self {
            GameIdParam::Text(id) => id.trim().to_string(),
            GameIdParam::Number(id) => id.to_string(),
        }
    }
}

/// Messages a client sends over the game socket.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinGame {
        game_id: GameIdParam,
        color: Role,
    },
    GetLegalMoves {
        #[serde(default)]
        square: Option<String>,
    },
    MakeMove {
        #[serde(rename = "move")]
        notation: String,
    },
    Leave,
}

/// Answers sent only to the connection that asked.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    LegalMoves {
        legal_moves: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    MoveResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl Reply {
    pub fn legal_moves(legal_moves: Vec<String>) -> Self {
        Reply::LegalMoves {
            legal_moves,
            status: Some("ok".to_string()),
            error: None,
        }
    }

    pub fn legal_moves_error(error: impl ToString) -> Self {
        Reply::LegalMoves {
            legal_moves: Vec::new(),
            status: None,
            error: Some(error.to_string()),
        }
    }

    pub fn move_accepted(receipt: &MoveReceipt) -> Self {
        let warning = match &receipt.durability {
            Durability::Recorded => None,
            Durability::Pending { reason } => {
                Some(format!("move applied but not yet saved: {reason}"))
            }
        };
        Reply::MoveResult {
            success: true,
            warning,
            error: None,
        }
    }

    pub fn move_rejected(error: impl ToString) -> Self {
        Reply::MoveResult {
            success: false,
            warning: None,
            error: Some(error.to_string()),
        }
    }

    pub fn error(message: impl ToString) -> Self {
        Reply::Error {
            message: message.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct NewPlayerRequest {
    pub username: String,
}

#[derive(Deserialize, Debug)]
pub struct NewGameRequest {
    pub white_player_id: PlayerId,
    pub black_player_id: PlayerId,
    pub initial_fen: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct NewGameResponse {
    pub game_id: GameId,
    pub status: GameStatus,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize, Debug)]
pub struct MatchHistoryResponse {
    pub player_id: PlayerId,
    pub games: Vec<MatchHistoryEntry>,
}

#[derive(Deserialize, Debug)]
pub struct QueueRequest {
    pub player_id: PlayerId,
}

#[derive(Serialize, Debug)]
pub struct GameView {
    #[serde(flatten)]
    pub record: GameRecord,
    pub live: Option<SessionSnapshot>,
}
