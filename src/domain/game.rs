use crate::domain::error::{GameError, PersistenceError};
use crate::domain::models::{
    ConnectionId, GameId, GameRecord, GameStatus, Outcome, Players, Role,
};
use crate::domain::position::Position;
use crate::domain::rules::Rules;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Result of a move the session accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedMove {
    pub notation: String,
    pub fen: String,
    pub is_white_turn: bool,
    pub is_check: bool,
    pub outcome: Option<Outcome>,
}

/// Who is sitting at the board right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Seats {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
}

impl Seats {
    pub fn get(&self, role: Role) -> Option<ConnectionId> {
        match role {
            Role::White => self.white,
            Role::Black => self.black,
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<ConnectionId> {
        match role {
            Role::White => &mut self.white,
            Role::Black => &mut self.black,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }
}

/// Read-only view of a live session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub game_id: GameId,
    pub fen: String,
    pub moves: Vec<String>,
    pub status: GameStatus,
    pub is_white_turn: bool,
    pub white_connected: bool,
    pub black_connected: bool,
}

/// The live, authoritative record of one game.
///
/// The position is the single source of truth for whose turn it is; seats
/// only say which connection may speak for a side.
pub struct GameSession {
    game_id: GameId,
    position: Position,
    move_history: Vec<String>,
    status: GameStatus,
    players: Players,
    seats: Seats,
    evicted: bool,
    last_activity: Instant,
}

impl GameSession {
    pub fn new(game_id: GameId, position: Position, players: Players) -> Self {
        Self {
            game_id,
            position,
            move_history: Vec::new(),
            status: GameStatus::Active,
            players,
            seats: Seats::default(),
            evicted: false,
            last_activity: Instant::now(),
        }
    }

    /// Builds a session from its durable record. Only ongoing games hydrate,
    /// and a stored position that is already over counts as finished even
    /// when its status was never flipped.
    pub fn hydrate(record: GameRecord) -> Result<Self, GameError> {
        if record.status.is_final() {
            return Err(GameError::GameAlreadyFinished(record.game_id));
        }
        let position = Position::from_fen(&record.current_position)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        if Rules::classify(&position).is_some() {
            return Err(GameError::GameAlreadyFinished(record.game_id));
        }
        Ok(Self::new(record.game_id, position, record.players))
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn move_history(&self) -> &[String] {
        &self.move_history
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn players(&self) -> Players {
        self.players
    }

    pub fn seats(&self) -> &Seats {
        &self.seats
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn is_seated(&self, role: Role, connection_id: ConnectionId) -> bool {
        self.seats.get(role) == Some(connection_id)
    }

    /// Puts `connection_id` in the `role` seat, returning the connection it
    /// displaced, if any.
    pub fn seat(&mut self, role: Role, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.last_activity = Instant::now();
        let previous = self.seats.slot(role).replace(connection_id);
        previous.filter(|&old| old != connection_id)
    }

    /// Frees `role` if `connection_id` still holds it.
    pub fn vacate(&mut self, role: Role, connection_id: ConnectionId) -> bool {
        let slot = self.seats.slot(role);
        if *slot == Some(connection_id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Turn check, validation and mutation for one move. Nothing changes on
    /// any error path.
    pub fn play_move(&mut self, role: Role, notation: &str) -> Result<AcceptedMove, GameError> {
        if self.status.is_final() {
            return Err(GameError::SessionTerminated);
        }

        let to_move = self.position.side_to_move();
        if role != to_move {
            return Err(GameError::WrongTurn { expected: to_move });
        }

        let applied = Rules::try_apply_move(&self.position, notation)?;

        self.move_history.push(applied.notation.clone());
        self.position = applied.position;
        self.last_activity = Instant::now();

        let outcome = applied
            .terminal
            .map(|kind| Outcome::from_terminal(kind, self.position.side_to_move()));
        if let Some(outcome) = outcome {
            self.status = outcome.status;
        }

        Ok(AcceptedMove {
            notation: applied.notation,
            fen: self.position.to_fen(),
            is_white_turn: self.position.is_white_turn(),
            is_check: applied.is_check,
            outcome,
        })
    }

    /// Legal moves for `role`, gated on it being that side's turn.
    pub fn legal_moves_for(&self, role: Role, square: Option<&str>) -> Result<Vec<String>, GameError> {
        if self.status.is_final() {
            return Err(GameError::SessionTerminated);
        }
        let to_move = self.position.side_to_move();
        if role != to_move {
            return Err(GameError::WrongTurn { expected: to_move });
        }
        let from = match square {
            Some(text) => Some(
                Rules::parse_square(text).ok_or_else(|| GameError::InvalidSquare(text.to_string()))?,
            ),
            None => None,
        };
        Ok(Rules::legal_moves_from(&self.position, from))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            game_id: self.game_id.clone(),
            fen: self.position.to_fen(),
            moves: self.move_history.clone(),
            status: self.status,
            is_white_turn: self.position.is_white_turn(),
            white_connected: self.seats.get(Role::White).is_some(),
            black_connected: self.seats.get(Role::Black).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::InvalidMove;
    use crate::domain::models::TerminalKind;
    use uuid::Uuid;

    fn session() -> GameSession {
        GameSession::new(
            "1".to_string(),
            Position::default(),
            Players { white: 10, black: 20 },
        )
    }

    #[test]
    fn wrong_side_is_rejected_without_mutation() {
        let mut game = session();
        let before = game.snapshot();
        assert_eq!(
            game.play_move(Role::Black, "e7e5"),
            Err(GameError::WrongTurn {
                expected: Role::White
            })
        );
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn illegal_and_malformed_moves_do_not_append() {
        let mut game = session();
        assert!(matches!(
            game.play_move(Role::White, "e2e5"),
            Err(GameError::IllegalMove(InvalidMove::NotLegalHere(_)))
        ));
        assert!(matches!(
            game.play_move(Role::White, "hello"),
            Err(GameError::IllegalMove(InvalidMove::Malformed(_)))
        ));
        assert!(game.move_history().is_empty());
    }

    #[test]
    fn checkmate_finalises_the_session() {
        let mut game = session();
        for (role, mv) in [
            (Role::White, "f2f3"),
            (Role::Black, "e7e5"),
            (Role::White, "g2g4"),
        ] {
            assert_eq!(game.play_move(role, mv).unwrap().outcome, None);
        }
        let mate = game.play_move(Role::Black, "d8h4").unwrap();
        assert_eq!(
            mate.outcome,
            Some(Outcome {
                status: GameStatus::Completed,
                reason: TerminalKind::Checkmate,
                winner: Some(Role::Black),
            })
        );
        assert_eq!(game.status(), GameStatus::Completed);
        assert_eq!(game.play_move(Role::White, "e2e3"), Err(GameError::SessionTerminated));
        assert_eq!(game.move_history().len(), 4);
    }

    #[test]
    fn seats_are_last_writer_wins() {
        let mut game = session();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(game.seat(Role::White, first), None);
        assert_eq!(game.seat(Role::White, first), None);
        assert_eq!(game.seat(Role::White, second), Some(first));
        assert!(!game.vacate(Role::White, first));
        assert!(game.is_seated(Role::White, second));
        assert!(game.vacate(Role::White, second));
        assert!(game.seats().is_empty());
    }

    #[test]
    fn legal_moves_respect_turn_and_square() {
        let game = session();
        assert_eq!(
            game.legal_moves_for(Role::White, Some("g1")).unwrap(),
            vec!["g1f3", "g1h3"]
        );
        assert_eq!(
            game.legal_moves_for(Role::Black, Some("g8")),
            Err(GameError::WrongTurn {
                expected: Role::White
            })
        );
        assert_eq!(
            game.legal_moves_for(Role::White, Some("k9")),
            Err(GameError::InvalidSquare("k9".to_string()))
        );
    }

    #[test]
    fn finished_records_do_not_hydrate() {
        let record = GameRecord {
            game_id: "3".to_string(),
            current_position: Position::default().to_fen(),
            moves_history: Vec::new(),
            status: GameStatus::Draw,
            players: Players { white: 1, black: 2 },
            winner_id: None,
            started_at: None,
            ended_at: None,
        };
        assert!(matches!(
            GameSession::hydrate(record),
            Err(GameError::GameAlreadyFinished(id)) if id == "3"
        ));
    }

    #[test]
    fn terminal_positions_do_not_hydrate() {
        let mated = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let stalemated = "k7/8/1Q6/8/8/8/8/7K b - - 1 1";
        for (id, fen) in [("5", mated), ("6", stalemated)] {
            let record = GameRecord {
                game_id: id.to_string(),
                current_position: fen.to_string(),
                moves_history: Vec::new(),
                status: GameStatus::Active,
                players: Players { white: 1, black: 2 },
                winner_id: None,
                started_at: None,
                ended_at: None,
            };
            assert!(matches!(
                GameSession::hydrate(record),
                Err(GameError::GameAlreadyFinished(found)) if found == id
            ));
        }
    }

    #[test]
    fn corrupt_position_is_a_persistence_error() {
        let record = GameRecord {
            game_id: "4".to_string(),
            current_position: "garbage".to_string(),
            moves_history: Vec::new(),
            status: GameStatus::Active,
            players: Players { white: 1, black: 2 },
            winner_id: None,
            started_at: None,
            ended_at: None,
        };
        assert!(matches!(
            GameSession::hydrate(record),
            Err(GameError::Persistence(PersistenceError::Corrupt(_)))
        ));
    }
}
