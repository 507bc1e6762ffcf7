use crate::domain::error::GameError;
use crate::domain::game::GameSession;
use crate::domain::models::GameId;
use crate::domain::services::GameRepository;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// One live game: its state plus the sequencer that serializes every
/// join / move / leave sequence touching it.
///
/// Moves hold the sequencer for the whole check, mutate, persist, broadcast
/// run but drop the state lock as soon as the mutation is in, so readers see
/// the new position while storage and fan-out are still in flight.
pub struct SessionCell {
    pub state: RwLock<GameSession>,
    pub sequencer: Mutex<()>,
}

impl SessionCell {
    pub fn new(session: GameSession) -> Self {
        Self {
            state: RwLock::new(session),
            sequencer: Mutex::new(()),
        }
    }
}

pub type SessionHandle = Arc<SessionCell>;

/// Maps game ids to live sessions. Constructed once at startup and shared by
/// every connection handler.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GameId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_id: &str) -> Option<SessionHandle> {
        self.sessions.get(game_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Returns the live session for `game_id`, loading it from storage first
    /// if needed. Concurrent first joins may both load the record, but only
    /// one cell is ever inserted and every caller gets that one.
    pub async fn get_or_hydrate(
        &self,
        game_id: &str,
        repository: &dyn GameRepository,
    ) -> Result<SessionHandle, GameError> {
        if let Some(handle) = self.get(game_id) {
            return Ok(handle);
        }

        let record = repository
            .load_game(game_id)
            .await?
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;
        let session = GameSession::hydrate(record)?;

        let entry = self
            .sessions
            .entry(session.game_id().to_string())
            .or_insert_with(|| {
                info!(game_id = session.game_id(), "session hydrated");
                Arc::new(SessionCell::new(session))
            });
        Ok(Arc::clone(entry.value()))
    }

    pub fn insert(&self, session: GameSession) -> SessionHandle {
        let game_id = session.game_id().to_string();
        let handle = Arc::new(SessionCell::new(session));
        self.sessions.insert(game_id, Arc::clone(&handle));
        handle
    }

    /// Removes `handle` from the map if it is still the live cell for
    /// `game_id`. The caller marks the session evicted under its lock first.
    pub fn evict(&self, game_id: &str, handle: &SessionHandle) -> bool {
        let removed = self
            .sessions
            .remove_if(game_id, |_, live| Arc::ptr_eq(live, handle))
            .is_some();
        if removed {
            debug!(game_id, "session evicted");
        }
        removed
    }
}
