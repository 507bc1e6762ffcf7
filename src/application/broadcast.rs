use crate::domain::events::GameEvent;
use crate::domain::models::{ConnectionId, GameId};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type EventSender = mpsc::UnboundedSender<GameEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<GameEvent>;

/// Fans events out to every connection in a game's room.
///
/// Each connection owns an unbounded queue drained by its transport task, so
/// enqueueing never blocks. A failed enqueue is logged and skipped. Callers
/// issue events for one game from under that game's sequencer, which keeps
/// per-room order identical for every recipient.
#[derive(Default)]
pub struct BroadcastGateway {
    outboxes: DashMap<ConnectionId, EventSender>,
    rooms: DashMap<GameId, FxHashSet<ConnectionId>>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and hands back the queue its transport drains.
    pub fn attach(&self, connection_id: ConnectionId) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(connection_id, tx);
        rx
    }

    pub fn detach(&self, connection_id: ConnectionId) {
        self.outboxes.remove(&connection_id);
    }

    pub fn join_room(&self, game_id: &str, connection_id: ConnectionId) {
        self.rooms
            .entry(game_id.to_string())
            .or_default()
            .insert(connection_id);
    }

    pub fn leave_room(&self, game_id: &str, connection_id: ConnectionId) {
        self.rooms.remove_if_mut(game_id, |_, members| {
            members.remove(&connection_id);
            members.is_empty()
        });
    }

    pub fn close_room(&self, game_id: &str) {
        self.rooms.remove(game_id);
    }

    pub fn members(&self, game_id: &str) -> SmallVec<[ConnectionId; 2]> {
        self.rooms
            .get(game_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Delivers `event` to each member of its room; returns how many queues
    /// accepted it.
    pub fn broadcast(&self, game_id: &str, event: GameEvent) -> usize {
        let members = self.members(game_id);
        let delivered = members
            .iter()
            .filter(|&&connection_id| self.send_to(connection_id, event.clone()))
            .count();
        debug!(game_id, delivered, members = members.len(), "broadcast");
        delivered
    }

    pub fn send_to(&self, connection_id: ConnectionId, event: GameEvent) -> bool {
        let Some(outbox) = self.outboxes.get(&connection_id) else {
            debug!(%connection_id, "no outbox for connection");
            return false;
        };
        if outbox.send(event).is_err() {
            warn!(%connection_id, "outbox closed, event dropped");
            return false;
        }
        true
    }
}
