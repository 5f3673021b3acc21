//! Connection registry: live WebSocket peers and group fan-out.
//!
//! Connections hand the registry an unbounded sender; the registry never
//! awaits a peer. A failed send marks the connection dead and reaps it, so
//! one stuck observer cannot stall a broadcast.

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::RegistryError;
use crate::protocol::ServerMessage;

/// Delivery group a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionGroup {
    /// Sends chat turns, receives responses.
    Participant,
    /// Read-only; receives subtitle fan-out.
    Observer,
}

struct Connection {
    group: ConnectionGroup,
    sender: UnboundedSender<ServerMessage>,
}

/// Internally synchronized map of live connections. Shared by handle.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection under a fresh id.
    pub fn register(
        &self,
        group: ConnectionGroup,
        sender: UnboundedSender<ServerMessage>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(id, Connection { group, sender });
        tracing::info!(target: "botan::registry", %id, ?group, total = self.connections.len(), "connection registered");
        id
    }

    /// Registers under a caller-supplied id. Fails if the id is live.
    pub fn register_with_id(
        &self,
        id: Uuid,
        group: ConnectionGroup,
        sender: UnboundedSender<ServerMessage>,
    ) -> Result<(), RegistryError> {
        if self.connections.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }
        self.connections.insert(id, Connection { group, sender });
        Ok(())
    }

    /// Removes a connection. Idempotent: unregistering an unknown id is a
    /// no-op, since a send failure may already have reaped it.
    pub fn unregister(&self, id: Uuid) {
        if self.connections.remove(&id).is_some() {
            tracing::info!(target: "botan::registry", %id, total = self.connections.len(), "connection unregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn count(&self, group: ConnectionGroup) -> usize {
        self.connections.iter().filter(|c| c.group == group).count()
    }

    /// Sends to one connection, reaping it on failure.
    pub fn send_to(&self, id: Uuid, message: ServerMessage) -> Result<(), RegistryError> {
        let failed = match self.connections.get(&id) {
            Some(conn) => conn.sender.send(message).is_err(),
            None => return Err(RegistryError::DeadConnection(id)),
        };
        if failed {
            self.connections.remove(&id);
            tracing::warn!(target: "botan::registry", %id, "send failed, connection reaped");
            return Err(RegistryError::DeadConnection(id));
        }
        Ok(())
    }

    /// Fans a message out to every connection in a group. Dead connections
    /// are reaped along the way. Returns the number of successful deliveries.
    pub fn broadcast(&self, group: ConnectionGroup, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            if entry.group != group {
                continue;
            }
            if entry.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for id in dead {
            self.connections.remove(&id);
            tracing::warn!(target: "botan::registry", %id, "broadcast send failed, connection reaped");
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_broadcast_reaches_every_observer() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.register(ConnectionGroup::Observer, tx);
            receivers.push(rx);
        }

        let delivered = registry.broadcast(
            ConnectionGroup::Observer,
            &ServerMessage::subtitle("やっほ〜！", "botan"),
        );
        assert_eq!(delivered, 3);
        for rx in &mut receivers {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[test]
    fn test_broadcast_skips_participants() {
        let registry = ConnectionRegistry::new();
        let (obs_tx, mut obs_rx) = mpsc::unbounded_channel();
        let (part_tx, mut part_rx) = mpsc::unbounded_channel();
        registry.register(ConnectionGroup::Observer, obs_tx);
        registry.register(ConnectionGroup::Participant, part_tx);

        let delivered = registry.broadcast(
            ConnectionGroup::Observer,
            &ServerMessage::subtitle("やっほ〜！", "botan"),
        );
        assert_eq!(delivered, 1);
        assert!(obs_rx.try_recv().is_ok());
        assert!(part_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_reaped_and_others_still_delivered() {
        let registry = ConnectionRegistry::new();
        let mut live = Vec::new();
        for _ in 0..2 {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.register(ConnectionGroup::Observer, tx);
            live.push(rx);
        }
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        registry.register(ConnectionGroup::Observer, dead_tx);
        drop(dead_rx);

        let delivered = registry.broadcast(
            ConnectionGroup::Observer,
            &ServerMessage::subtitle("こんにちは", "botan"),
        );
        assert_eq!(delivered, 2);
        for rx in &mut live {
            assert!(rx.try_recv().is_ok());
        }
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_id_registration_rejected() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        registry
            .register_with_id(id, ConnectionGroup::Participant, tx1)
            .unwrap();
        assert!(matches!(
            registry.register_with_id(id, ConnectionGroup::Participant, tx2),
            Err(RegistryError::DuplicateConnection(_))
        ));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(ConnectionGroup::Participant, tx);

        registry.unregister(id);
        registry.unregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        assert!(matches!(
            registry.send_to(Uuid::new_v4(), ServerMessage::error("nope")),
            Err(RegistryError::DeadConnection(_))
        ));
    }
}
