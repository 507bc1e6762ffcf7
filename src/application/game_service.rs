use crate::application::broadcast::{BroadcastGateway, EventReceiver};
use crate::application::connections::ConnectionTable;
use crate::application::registry::{SessionHandle, SessionRegistry};
use crate::domain::error::{GameError, PersistenceError};
use crate::domain::events::GameEvent;
use crate::domain::game::SessionSnapshot;
use crate::domain::models::{
    ConnectionId, GameId, GameStatus, Outcome, PlayerId, Players, Role, canonical_game_id,
};
use crate::domain::services::GameRepository;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Upper bound on a single storage write made on behalf of a move.
    pub persistence_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persistence_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Whether storage confirmed an accepted move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Durability {
    Recorded,
    /// The move stands in memory and was broadcast, but storage did not
    /// confirm it.
    Pending { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameOverNotice {
    pub status: GameStatus,
    pub winner_id: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReceipt {
    pub game_id: GameId,
    pub notation: String,
    pub fen: String,
    pub is_white_turn: bool,
    pub durability: Durability,
    pub game_over: Option<GameOverNotice>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinReceipt {
    pub game_id: GameId,
    pub role: Role,
    pub fen: String,
    pub is_white_turn: bool,
}

/// Turn coordination and connection lifecycle for every live game.
pub struct GameService {
    registry: SessionRegistry,
    connections: ConnectionTable,
    gateway: BroadcastGateway,
    repository: Arc<dyn GameRepository>,
    settings: SessionSettings,
}

impl GameService {
    pub fn new(repository: Arc<dyn GameRepository>, settings: SessionSettings) -> Self {
        Self {
            registry: SessionRegistry::new(),
            connections: ConnectionTable::new(),
            gateway: BroadcastGateway::new(),
            repository,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn gateway(&self) -> &BroadcastGateway {
        &self.gateway
    }

    pub fn repository(&self) -> &Arc<dyn GameRepository> {
        &self.repository
    }

    /// Registers a transport connection; events for its games arrive on the
    /// returned queue.
    pub fn connect(&self, connection_id: ConnectionId) -> EventReceiver {
        debug!(%connection_id, "connection attached");
        self.gateway.attach(connection_id)
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.leave(connection_id).await;
        self.gateway.detach(connection_id);
        debug!(%connection_id, "connection detached");
    }

    /// Seats `connection_id` as `role` in `game_id`, loading the game from
    /// storage when it is not live yet. A connection already sitting at a
    /// different seat leaves it first.
    pub async fn join(
        &self,
        game_id: &str,
        connection_id: ConnectionId,
        role: Role,
    ) -> Result<JoinReceipt, GameError> {
        let canonical = canonical_game_id(game_id)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;
        let game_id = canonical.as_str();

        if let Some(current) = self.connections.resolve(connection_id) {
            if current.game_id != game_id || current.role != role {
                self.leave(connection_id).await;
            }
        }

        loop {
            let handle = self
                .registry
                .get_or_hydrate(game_id, self.repository.as_ref())
                .await?;
            let _turn = handle.sequencer.lock().await;
            let mut session = handle.state.write().await;

            if session.is_evicted() {
                // Lost a race with eviction; hydrate a fresh cell.
                continue;
            }
            if session.status().is_final() {
                return Err(GameError::GameAlreadyFinished(game_id.to_string()));
            }

            let displaced = session.seat(role, connection_id);
            self.connections.bind(connection_id, game_id, role);
            if let Some(previous) = displaced {
                self.connections.unbind_if(previous, game_id, role);
                self.gateway.leave_room(game_id, previous);
                warn!(game_id, %role, %previous, %connection_id, "seat taken over by new connection");
            }
            self.gateway.join_room(game_id, connection_id);

            let receipt = JoinReceipt {
                game_id: game_id.to_string(),
                role,
                fen: session.position().to_fen(),
                is_white_turn: session.position().is_white_turn(),
            };
            drop(session);

            info!(game_id, %role, %connection_id, "player joined");
            self.gateway.broadcast(
                game_id,
                GameEvent::GameJoined {
                    game_id: receipt.game_id.clone(),
                    color: role,
                    fen: receipt.fen.clone(),
                    is_white_turn: receipt.is_white_turn,
                },
            );
            return Ok(receipt);
        }
    }

    /// Drops the connection's binding. The last participant leaving evicts
    /// the in-memory session; the durable record stays as it is. Leaving never
    /// ends the game.
    pub async fn leave(&self, connection_id: ConnectionId) {
        let Some(binding) = self.connections.unbind(connection_id) else {
            return;
        };
        self.gateway.leave_room(&binding.game_id, connection_id);

        let Some(handle) = self.registry.get(&binding.game_id) else {
            return;
        };
        let _turn = handle.sequencer.lock().await;
        let mut session = handle.state.write().await;
        if session.is_evicted() {
            return;
        }
        session.vacate(binding.role, connection_id);
        info!(game_id = %binding.game_id, role = %binding.role, %connection_id, "player left");

        if session.seats().is_empty() {
            session.mark_evicted();
            self.registry.evict(&binding.game_id, &handle);
            self.gateway.close_room(&binding.game_id);
            info!(game_id = %binding.game_id, "last participant left, session released");
        }
    }

    /// Validates and applies a move for the seat `connection_id` holds.
    ///
    /// The in-memory mutation is the commit point: a storage failure after it
    /// does not undo the move, it only downgrades the receipt's durability.
    pub async fn submit_move(
        &self,
        connection_id: ConnectionId,
        notation: &str,
    ) -> Result<MoveReceipt, GameError> {
        let binding = self
            .connections
            .resolve(connection_id)
            .ok_or(GameError::UnknownConnection)?;
        let game_id = binding.game_id.as_str();
        let handle = self
            .registry
            .get(game_id)
            .ok_or_else(|| GameError::SessionNotFound(binding.game_id.clone()))?;

        let _turn = handle.sequencer.lock().await;
        let (accepted, players) = {
            let mut session = handle.state.write().await;
            if session.is_evicted() {
                return Err(GameError::SessionNotFound(binding.game_id.clone()));
            }
            if !session.is_seated(binding.role, connection_id) {
                return Err(GameError::UnknownConnection);
            }
            match session.play_move(binding.role, notation) {
                Ok(accepted) => (accepted, session.players()),
                Err(e) => {
                    debug!(game_id, role = %binding.role, notation, error = %e, "move rejected");
                    return Err(e);
                }
            }
        };
        info!(game_id, role = %binding.role, notation = %accepted.notation, "move accepted");

        let durability = match self
            .bounded(
                self.repository
                    .record_move(game_id, &accepted.fen, &accepted.notation),
            )
            .await
        {
            Ok(()) => Durability::Recorded,
            Err(e) => {
                warn!(game_id, notation = %accepted.notation, error = %e, "move not persisted");
                Durability::Pending {
                    reason: e.to_string(),
                }
            }
        };

        self.gateway.broadcast(
            game_id,
            GameEvent::MoveMade {
                game_id: binding.game_id.clone(),
                notation: accepted.notation.clone(),
                fen: accepted.fen.clone(),
                is_white_turn: accepted.is_white_turn,
                is_check: accepted.is_check,
            },
        );

        let game_over = match accepted.outcome {
            Some(outcome) => Some(self.conclude(&handle, game_id, outcome, players).await),
            None => None,
        };

        Ok(MoveReceipt {
            game_id: binding.game_id.clone(),
            notation: accepted.notation,
            fen: accepted.fen,
            is_white_turn: accepted.is_white_turn,
            durability,
            game_over,
        })
    }

    /// Legal moves for the requester's side, optionally from one square.
    /// Answered only when it is the requester's turn.
    pub async fn legal_moves(
        &self,
        connection_id: ConnectionId,
        square: Option<&str>,
    ) -> Result<Vec<String>, GameError> {
        let binding = self
            .connections
            .resolve(connection_id)
            .ok_or(GameError::UnknownConnection)?;
        let handle = self
            .registry
            .get(&binding.game_id)
            .ok_or_else(|| GameError::SessionNotFound(binding.game_id.clone()))?;

        let session = handle.state.read().await;
        if session.is_evicted() {
            return Err(GameError::SessionNotFound(binding.game_id.clone()));
        }
        if !session.is_seated(binding.role, connection_id) {
            return Err(GameError::UnknownConnection);
        }
        session.legal_moves_for(binding.role, square)
    }

    pub async fn snapshot(&self, game_id: &str) -> Option<SessionSnapshot> {
        let handle = self.registry.get(&canonical_game_id(game_id)?)?;
        let session = handle.state.read().await;
        (!session.is_evicted()).then(|| session.snapshot())
    }

    /// Evicts sessions with no join or accepted move for `max_idle`. Returns
    /// how many were released.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut released = 0;
        for handle in self.registry.handles() {
            let _turn = handle.sequencer.lock().await;
            let mut session = handle.state.write().await;
            if session.is_evicted() || session.idle_for() < max_idle {
                continue;
            }

            let game_id = session.game_id().to_string();
            for role in [Role::White, Role::Black] {
                if let Some(connection_id) = session.seats().get(role) {
                    self.connections.unbind_if(connection_id, &game_id, role);
                }
            }
            session.mark_evicted();
            self.registry.evict(&game_id, &handle);
            self.gateway.close_room(&game_id);
            info!(game_id, "idle session released");
            released += 1;
        }
        released
    }

    pub fn idle_timeout(&self) -> Duration {
        self.settings.idle_timeout
    }

    /// Finishes the game durably, announces the result once and retires the
    /// session. The caller still holds the sequencer, so no other move or
    /// join for this game runs in between.
    async fn conclude(
        &self,
        handle: &SessionHandle,
        game_id: &str,
        outcome: Outcome,
        players: Players,
    ) -> GameOverNotice {
        let winner_id = outcome.winner.map(|role| players.id_for(role));

        if let Err(e) = self
            .bounded(
                self.repository
                    .finish_game(game_id, outcome.status, winner_id),
            )
            .await
        {
            warn!(game_id, error = %e, "game result not persisted");
        }

        self.gateway.broadcast(
            game_id,
            GameEvent::GameOver {
                game_id: game_id.to_string(),
                status: outcome.status,
                reason: outcome.reason,
                winner_id,
            },
        );
        info!(game_id, status = ?outcome.status, reason = ?outcome.reason, ?winner_id, "game over");

        handle.state.write().await.mark_evicted();
        self.registry.evict(game_id, handle);
        self.gateway.close_room(game_id);

        GameOverNotice {
            status: outcome.status,
            winner_id,
        }
    }

    async fn bounded<F>(&self, write: F) -> Result<(), PersistenceError>
    where
        F: Future<Output = Result<(), PersistenceError>>,
    {
        match tokio::time::timeout(self.settings.persistence_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::Timeout),
        }
    }
}
