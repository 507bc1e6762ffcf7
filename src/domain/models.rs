use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a game by the persistence layer.
pub type GameId = String;

/// Durable identity of a player, supplied by the caller.
pub type PlayerId = i64;

/// Identifier of one live transport connection.
pub type ConnectionId = uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
}

impl Role {
    pub fn opponent(&self) -> Self {
        match self {
            Role::White => Role::Black,
            Role::Black => Role::White,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::White => "white",
            Role::Black => "black",
        }
    }
}

impl From<chess::Color> for Role {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Role::White,
            chess::Color::Black => Role::Black,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a game. `Completed` and `Draw` are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Completed,
    Draw,
}

impl GameStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }

    /// Text stored in the `games.status` column.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            GameStatus::Active => "ongoing",
            GameStatus::Completed => "completed",
            GameStatus::Draw => "draw",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(GameStatus::Active),
            "completed" => Some(GameStatus::Completed),
            "draw" => Some(GameStatus::Draw),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoveRule,
    FivefoldRepetition,
}

impl TerminalKind {
    pub fn is_decisive(&self) -> bool {
        matches!(self, TerminalKind::Checkmate)
    }
}

/// How a game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub status: GameStatus,
    pub reason: TerminalKind,
    pub winner: Option<Role>,
}

impl Outcome {
    /// `side_to_move` is the side to move in the terminal position; when it is
    /// mated, the other side won.
    pub fn from_terminal(reason: TerminalKind, side_to_move: Role) -> Self {
        if reason.is_decisive() {
            Outcome {
                status: GameStatus::Completed,
                reason,
                winner: Some(side_to_move.opponent()),
            }
        } else {
            Outcome {
                status: GameStatus::Draw,
                reason,
                winner: None,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    pub white: PlayerId,
    pub black: PlayerId,
}

impl Players {
    pub fn id_for(&self, role: Role) -> PlayerId {
        match role {
            Role::White => self.white,
            Role::Black => self.black,
        }
    }

    /// The side `player_id` plays, if it plays in this game at all.
    pub fn role_of(&self, player_id: PlayerId) -> Option<Role> {
        if self.white == player_id {
            Some(Role::White)
        } else if self.black == player_id {
            Some(Role::Black)
        } else {
            None
        }
    }
}

/// The durable counterpart of a game as the store returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub current_position: String,
    pub moves_history: Vec<String>,
    pub status: GameStatus,
    pub players: Players,
    pub winner_id: Option<PlayerId>,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub username: String,
    pub elo_rating: f64,
}

/// A game as it appears in a player's history, with both sides named.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchHistoryEntry {
    #[serde(flatten)]
    pub game: GameRecord,
    pub white: PlayerRecord,
    pub black: PlayerRecord,
}

/// Answer to a matchmaking poll.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    Searching,
    Matched {
        game_id: GameId,
        opponent: PlayerRecord,
        is_white: bool,
        fen: String,
    },
}

/// Game ids are decimal row ids; `"01"` and `" 1"` name the same game as `"1"`.
pub fn canonical_game_id(raw: &str) -> Option<GameId> {
    raw.trim().parse::<i64>().ok().map(|id| id.to_string())
}

/// Splits the space separated move log kept in storage.
pub fn parse_move_log(log: &str) -> Vec<String> {
    log.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkmate_credits_the_side_that_delivered_it() {
        let outcome = Outcome::from_terminal(TerminalKind::Checkmate, Role::White);
        assert_eq!(outcome.status, GameStatus::Completed);
        assert_eq!(outcome.winner, Some(Role::Black));
    }

    #[test]
    fn non_checkmate_terminals_are_draws() {
        for reason in [
            TerminalKind::Stalemate,
            TerminalKind::InsufficientMaterial,
            TerminalKind::SeventyFiveMoveRule,
            TerminalKind::FivefoldRepetition,
        ] {
            let outcome = Outcome::from_terminal(reason, Role::Black);
            assert_eq!(outcome.status, GameStatus::Draw);
            assert_eq!(outcome.winner, None);
        }
    }

    #[test]
    fn status_db_text() {
        assert_eq!(GameStatus::Active.as_db_str(), "ongoing");
        assert_eq!(GameStatus::from_db_str("draw"), Some(GameStatus::Draw));
        assert_eq!(GameStatus::from_db_str("abandoned"), None);
    }

    #[test]
    fn players_know_their_sides() {
        let players = Players { white: 3, black: 8 };
        assert_eq!(players.role_of(3), Some(Role::White));
        assert_eq!(players.role_of(8), Some(Role::Black));
        assert_eq!(players.role_of(5), None);
        assert_eq!(players.id_for(Role::Black.opponent()), 3);
    }

    #[test]
    fn game_ids_are_normalised() {
        assert_eq!(canonical_game_id("01").as_deref(), Some("1"));
        assert_eq!(canonical_game_id(" 42 ").as_deref(), Some("42"));
        assert_eq!(canonical_game_id("abc"), None);
        assert_eq!(canonical_game_id(""), None);
    }

    #[test]
    fn move_log_ignores_trailing_separator() {
        assert_eq!(parse_move_log("e2e4 e7e5 "), vec!["e2e4", "e7e5"]);
        assert!(parse_move_log("").is_empty());
    }
}
