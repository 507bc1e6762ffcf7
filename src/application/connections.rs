use crate::domain::models::{ConnectionId, GameId, Role};
use dashmap::DashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionBinding {
    pub game_id: GameId,
    pub role: Role,
}

/// Which game and seat each live connection occupies. At most one binding
/// per connection.
#[derive(Default)]
pub struct ConnectionTable {
    bindings: DashMap<ConnectionId, ConnectionBinding>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, connection_id: ConnectionId, game_id: &str, role: Role) {
        self.bindings.insert(
            connection_id,
            ConnectionBinding {
                game_id: game_id.to_string(),
                role,
            },
        );
    }

    pub fn resolve(&self, connection_id: ConnectionId) -> Option<ConnectionBinding> {
        self.bindings
            .get(&connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn unbind(&self, connection_id: ConnectionId) -> Option<ConnectionBinding> {
        self.bindings
            .remove(&connection_id)
            .map(|(_, binding)| binding)
    }

    /// Drops the binding only if it still points at `game_id`/`role`, so a
    /// connection that already moved on keeps its new seat.
    pub fn unbind_if(&self, connection_id: ConnectionId, game_id: &str, role: Role) -> bool {
        self.bindings
            .remove_if(&connection_id, |_, binding| {
                binding.game_id == game_id && binding.role == role
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn conditional_unbind_leaves_newer_bindings() {
        let table = ConnectionTable::new();
        let conn = Uuid::new_v4();

        table.bind(conn, "1", Role::White);
        table.bind(conn, "2", Role::Black);
        assert!(!table.unbind_if(conn, "1", Role::White));
        assert_eq!(
            table.resolve(conn),
            Some(ConnectionBinding {
                game_id: "2".to_string(),
                role: Role::Black
            })
        );
        assert!(table.unbind_if(conn, "2", Role::Black));
        assert!(table.is_empty());
    }
}
