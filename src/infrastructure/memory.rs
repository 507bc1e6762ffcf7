use crate::domain::error::PersistenceError;
use crate::domain::models::{
    GameId, GameRecord, GameStatus, MatchHistoryEntry, MatchStatus, PlayerId, PlayerRecord,
    Players, Role,
};
use crate::domain::rating::{INITIAL_RATING, elo_update};
use crate::domain::services::{GameRepository, MATCH_RATING_WINDOW};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    elo: f64,
    ticket: u64,
}

/// Process-local repository. Backs the `memory` database backend and the
/// integration tests, which can make it refuse or stall writes.
pub struct MemoryGameRepository {
    games: DashMap<i64, GameRecord>,
    players: DashMap<PlayerId, PlayerRecord>,
    queue: DashMap<PlayerId, QueueEntry>,
    // Held across a whole pairing so two polls cannot claim the same entry.
    pairing: Mutex<()>,
    next_game: AtomicI64,
    next_player: AtomicI64,
    next_ticket: AtomicU64,
    available: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl Default for MemoryGameRepository {
    fn default() -> Self {
        Self {
            games: DashMap::new(),
            players: DashMap::new(),
            queue: DashMap::new(),
            pairing: Mutex::new(()),
            next_game: AtomicI64::new(1),
            next_player: AtomicI64::new(1),
            next_ticket: AtomicU64::new(0),
            available: AtomicBool::new(true),
            write_delay_ms: AtomicU64::new(0),
        }
    }
}

impl MemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every write fails with `Unavailable`. Reads still
    /// succeed.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delays every write by `delay` before it is applied.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    async fn before_write(&self) -> Result<(), PersistenceError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    fn key(game_id: &str) -> Option<i64> {
        game_id.trim().parse().ok()
    }

    fn insert_game(&self, white: PlayerId, black: PlayerId, initial_fen: &str) -> GameId {
        let id = self.next_game.fetch_add(1, Ordering::SeqCst);
        self.games.insert(
            id,
            GameRecord {
                game_id: id.to_string(),
                current_position: initial_fen.to_string(),
                moves_history: Vec::new(),
                status: GameStatus::Active,
                players: Players { white, black },
                winner_id: None,
                started_at: Some(Utc::now().naive_utc()),
                ended_at: None,
            },
        );
        id.to_string()
    }

    fn player(&self, player_id: PlayerId) -> Result<PlayerRecord, PersistenceError> {
        self.players
            .get(&player_id)
            .map(|p| p.clone())
            .ok_or(PersistenceError::NotFound)
    }

    fn ongoing_game(&self, player_id: PlayerId) -> Option<GameRecord> {
        self.games
            .iter()
            .filter(|g| g.status == GameStatus::Active && g.players.role_of(player_id).is_some())
            .max_by_key(|g| *g.key())
            .map(|g| g.value().clone())
    }
}

#[async_trait]
impl GameRepository for MemoryGameRepository {
    async fn load_game(&self, game_id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        Ok(Self::key(game_id).and_then(|id| self.games.get(&id).map(|game| game.clone())))
    }

    async fn record_move(
        &self,
        game_id: &str,
        fen: &str,
        notation: &str,
    ) -> Result<(), PersistenceError> {
        self.before_write().await?;
        let id = Self::key(game_id).ok_or(PersistenceError::NotFound)?;
        let mut game = self
            .games
            .get_mut(&id)
            .filter(|game| game.status == GameStatus::Active)
            .ok_or(PersistenceError::NotFound)?;
        game.current_position = fen.to_string();
        game.moves_history.push(notation.to_string());
        Ok(())
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner_id: Option<PlayerId>,
    ) -> Result<(), PersistenceError> {
        self.before_write().await?;
        let id = Self::key(game_id).ok_or(PersistenceError::NotFound)?;
        let players = {
            let mut game = self.games.get_mut(&id).ok_or(PersistenceError::NotFound)?;
            if game.status.is_final() {
                debug!(game_id, "game already finished");
                return Ok(());
            }
            game.status = status;
            game.winner_id = winner_id;
            game.ended_at = Some(Utc::now().naive_utc());
            game.players
        };

        if let (GameStatus::Completed, Some(winner)) = (status, winner_id) {
            let loser = if winner == players.white {
                players.black
            } else {
                players.white
            };
            let rating = |player| {
                self.players
                    .get(&player)
                    .map(|p| p.elo_rating)
                    .unwrap_or(INITIAL_RATING)
            };
            let (new_winner, new_loser) = elo_update(rating(winner), rating(loser));
            for (player, elo) in [(winner, new_winner), (loser, new_loser)] {
                if let Some(mut record) = self.players.get_mut(&player) {
                    record.elo_rating = elo;
                }
            }
        }
        Ok(())
    }

    async fn create_player(&self, username: &str) -> Result<PlayerRecord, PersistenceError> {
        self.before_write().await?;
        if self.players.iter().any(|p| p.username == username) {
            return Err(PersistenceError::Conflict(format!(
                "username {username:?} is taken"
            )));
        }
        let id = self.next_player.fetch_add(1, Ordering::SeqCst);
        let record = PlayerRecord {
            id,
            username: username.to_string(),
            elo_rating: INITIAL_RATING,
        };
        self.players.insert(id, record.clone());
        Ok(record)
    }

    async fn load_player(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<PlayerRecord>, PersistenceError> {
        Ok(self.players.get(&player_id).map(|p| p.clone()))
    }

    async fn create_game(
        &self,
        white: PlayerId,
        black: PlayerId,
        initial_fen: &str,
    ) -> Result<GameId, PersistenceError> {
        self.before_write().await?;
        if !self.players.contains_key(&white) || !self.players.contains_key(&black) {
            return Err(PersistenceError::NotFound);
        }
        Ok(self.insert_game(white, black, initial_fen))
    }

    async fn match_history(
        &self,
        player_id: PlayerId,
        limit: usize,
    ) -> Result<Vec<MatchHistoryEntry>, PersistenceError> {
        let mut games: Vec<(i64, GameRecord)> = self
            .games
            .iter()
            .filter(|g| g.players.white == player_id || g.players.black == player_id)
            .map(|g| (*g.key(), g.value().clone()))
            .collect();
        games.sort_by(|a, b| b.0.cmp(&a.0));
        games
            .into_iter()
            .take(limit)
            .map(|(_, game)| {
                Ok(MatchHistoryEntry {
                    white: self.player(game.players.white)?,
                    black: self.player(game.players.black)?,
                    game,
                })
            })
            .collect()
    }

    async fn join_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError> {
        self.before_write().await?;
        let elo = self.player(player_id)?.elo_rating;
        let _pairing = self.pairing.lock().await;
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.queue.insert(player_id, QueueEntry { elo, ticket });
        debug!(player_id, elo, "player queued");
        Ok(())
    }

    async fn leave_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError> {
        self.before_write().await?;
        let _pairing = self.pairing.lock().await;
        self.queue.remove(&player_id);
        Ok(())
    }

    async fn check_match(
        &self,
        player_id: PlayerId,
        initial_fen: &str,
        requester_is_white: bool,
    ) -> Result<MatchStatus, PersistenceError> {
        let _pairing = self.pairing.lock().await;
        self.player(player_id)?;

        if let Some(game) = self.ongoing_game(player_id) {
            let role = game.players.role_of(player_id).ok_or(PersistenceError::NotFound)?;
            return Ok(MatchStatus::Matched {
                game_id: game.game_id,
                opponent: self.player(game.players.id_for(role.opponent()))?,
                is_white: role == Role::White,
                fen: game.current_position,
            });
        }

        let Some(mine) = self.queue.get(&player_id).map(|entry| *entry) else {
            return Ok(MatchStatus::Searching);
        };
        let opponent = self
            .queue
            .iter()
            .filter(|entry| {
                *entry.key() != player_id && (entry.elo - mine.elo).abs() <= MATCH_RATING_WINDOW
            })
            .min_by_key(|entry| entry.ticket)
            .map(|entry| *entry.key());
        let Some(opponent) = opponent else {
            return Ok(MatchStatus::Searching);
        };

        self.before_write().await?;
        let (white, black) = if requester_is_white {
            (player_id, opponent)
        } else {
            (opponent, player_id)
        };
        let game_id = self.insert_game(white, black, initial_fen);
        self.queue.remove(&player_id);
        self.queue.remove(&opponent);
        info!(%game_id, white, black, "players paired");

        Ok(MatchStatus::Matched {
            game_id,
            opponent: self.player(opponent)?,
            is_white: requester_is_white,
            fen: initial_fen.to_string(),
        })
    }
}
