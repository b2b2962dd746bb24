//! ConnectionRegistry - the set of connected TCP clients

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{RecipientRegistry, SharedRecipient};
use dashmap::DashMap;

use super::connection::ClientConnection;

/// Connected clients keyed by connection id
pub struct ConnectionRegistry {
    connections: DashMap<u64, Arc<ClientConnection>>,
    capacity: AtomicU32,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(capacity: u32) -> Self {
        Self {
            connections: DashMap::new(),
            capacity: AtomicU32::new(capacity),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a connection id
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, connection: Arc<ClientConnection>) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&self, id: u64) -> Option<Arc<ClientConnection>> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    pub fn get(&self, id: u64) -> Option<Arc<ClientConnection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Update the advertised `{max_players}` figure
    pub fn set_capacity(&self, capacity: u32) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close and forget every connection, returns how many there were
    pub fn close_all(&self) -> usize {
        let closed = self.connections.len();
        for entry in self.connections.iter() {
            entry.value().close();
        }
        self.connections.clear();
        closed
    }
}

impl RecipientRegistry for ConnectionRegistry {
    /// Snapshot in connection order
    fn snapshot(&self) -> Vec<SharedRecipient> {
        let mut connections: Vec<Arc<ClientConnection>> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        connections.sort_by_key(|c| c.id());
        connections
            .into_iter()
            .map(|c| c as SharedRecipient)
            .collect()
    }

    fn online_count(&self) -> usize {
        self.connections.len()
    }

    fn capacity(&self) -> u32 {
        self.capacity.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::connection::Handshake;
    use contracts::Recipient;

    fn connect(registry: &ConnectionRegistry, name: &str) -> Arc<ClientConnection> {
        let (writer, _reader) = tokio::io::duplex(64);
        let handshake = Handshake {
            name: name.to_string(),
            placement: None,
        };
        let (connection, _worker) =
            ClientConnection::spawn(registry.next_id(), handshake, writer, 4);
        registry.insert(Arc::clone(&connection));
        connection
    }

    #[tokio::test]
    async fn test_snapshot_in_connection_order() {
        let registry = ConnectionRegistry::new(500);
        for name in ["a", "b", "c", "d"] {
            connect(&registry, name);
        }

        let names: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|r| r.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(registry.online_count(), 4);
    }

    #[tokio::test]
    async fn test_remove_and_capacity() {
        let registry = ConnectionRegistry::new(10);
        let steve = connect(&registry, "Steve");
        connect(&registry, "Alex");

        assert!(registry.get(steve.id()).is_some());
        assert!(registry.remove(steve.id()).is_some());
        assert!(registry.remove(steve.id()).is_none());
        assert_eq!(registry.len(), 1);

        registry.set_capacity(20);
        assert_eq!(registry.capacity(), 20);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = ConnectionRegistry::new(10);
        let steve = connect(&registry, "Steve");
        assert_eq!(registry.close_all(), 1);
        assert!(registry.is_empty());
        assert!(!steve.is_active());
    }
}
