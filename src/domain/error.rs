use crate::domain::models::{GameId, Role};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMove {
    #[error("malformed move notation: {0:?}")]
    Malformed(String),
    #[error("move {0} is not legal in this position")]
    NotLegalHere(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("no such record")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error("storage did not answer in time")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("connection is not bound to any game")]
    UnknownConnection,
    #[error("no live session for game {0}")]
    SessionNotFound(GameId),
    #[error("game is already over")]
    SessionTerminated,
    #[error("not your turn: {expected} to move")]
    WrongTurn { expected: Role },
    #[error("illegal move: {0}")]
    IllegalMove(#[from] InvalidMove),
    #[error("invalid square: {0:?}")]
    InvalidSquare(String),
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("game {0} is already finished")]
    GameAlreadyFinished(GameId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
