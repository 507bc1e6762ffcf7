use crate::domain::error::PersistenceError;
use crate::domain::models::{
    GameId, GameRecord, GameStatus, MatchHistoryEntry, MatchStatus, PlayerId, PlayerRecord,
};
use async_trait::async_trait;

pub const MATCH_HISTORY_LIMIT: usize = 50;

/// Widest rating gap the matchmaking queue will pair across.
pub const MATCH_RATING_WINDOW: f64 = 100.0;

/// Durable storage for games and players.
///
/// Implementations must be usable from any task; every call is independent of
/// the transport and of the in-memory session state.
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn load_game(&self, game_id: &str) -> Result<Option<GameRecord>, PersistenceError>;

    /// Stores the position reached by `notation` and appends it to the move log.
    async fn record_move(
        &self,
        game_id: &str,
        fen: &str,
        notation: &str,
    ) -> Result<(), PersistenceError>;

    /// Flips the durable status. Finishing an already finished game is a no-op.
    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner_id: Option<PlayerId>,
    ) -> Result<(), PersistenceError>;

    async fn create_player(&self, username: &str) -> Result<PlayerRecord, PersistenceError>;

    async fn load_player(&self, player_id: PlayerId)
    -> Result<Option<PlayerRecord>, PersistenceError>;

    async fn create_game(
        &self,
        white: PlayerId,
        black: PlayerId,
        initial_fen: &str,
    ) -> Result<GameId, PersistenceError>;

    /// Games `player_id` took part in, most recent first.
    async fn match_history(
        &self,
        player_id: PlayerId,
        limit: usize,
    ) -> Result<Vec<MatchHistoryEntry>, PersistenceError>;

    /// Queues `player_id` at its current rating. Re-queueing replaces the old
    /// entry and moves the player to the back.
    async fn join_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError>;

    async fn leave_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError>;

    /// Reports the player's ongoing game if there is one. Otherwise pairs a
    /// queued player with the longest waiting opponent within
    /// [`MATCH_RATING_WINDOW`], creating the game and dequeuing both in one
    /// step.
    async fn check_match(
        &self,
        player_id: PlayerId,
        initial_fen: &str,
        requester_is_white: bool,
    ) -> Result<MatchStatus, PersistenceError>;
}
