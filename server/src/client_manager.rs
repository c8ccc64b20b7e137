//! Per-connection bookkeeping for joined clients
//!
//! This module tracks the server-side view of every client that has joined:
//! - Player slot accounting against the configured capacity
//! - The outbound frame channel feeding the connection's writer task
//! - Per-command acknowledgement (highest sequence drained by the tick loop)
//! - Whether the next snapshot for the client must be a full one
//!
//! The tick loop is the only writer of acknowledgement state; sessions only
//! add and remove clients.

use crate::error::ServerError;
use log::{debug, info};
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames buffered per client before new ones are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// A joined client and its delivery state
#[derive(Debug)]
pub struct Client {
    /// Player id bound to the connection at join time
    pub id: PlayerId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the client joined
    pub joined_at: Instant,
    /// Highest command sequence from this client the simulation has drained
    pub last_acknowledged: u32,
    /// Set on join; cleared once a full snapshot has been queued
    pub needs_full_snapshot: bool,
    sender: mpsc::Sender<String>,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            addr,
            joined_at: Instant::now(),
            last_acknowledged: 0,
            needs_full_snapshot: true,
            sender,
        }
    }

    /// Queues an encoded frame without waiting.
    ///
    /// Returns false when the frame was dropped because the client's queue is
    /// full or its connection is gone. A slow client never blocks the caller.
    pub fn send(&self, frame: String) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for player {}, dropping frame", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// All joined clients, keyed by player id
///
/// Shared between sessions and the tick loop behind a `tokio::sync::RwLock`.
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Binds a player id to a connection.
    ///
    /// Fails with [`ServerError::ServerFull`] once `max_clients` are joined.
    pub fn add_client(
        &mut self,
        id: PlayerId,
        addr: SocketAddr,
        sender: mpsc::Sender<String>,
    ) -> Result<(), ServerError> {
        if self.is_full() {
            return Err(ServerError::ServerFull(self.max_clients));
        }

        info!("Player {} joined from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        Ok(())
    }

    /// Returns true if the client was present.
    pub fn remove_client(&mut self, id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!(
                "Player {} left after {:.1}s",
                client.id,
                client.joined_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Records that the simulation has consumed command `sequence` from `id`.
    ///
    /// Acknowledgement never moves backwards.
    pub fn mark_command_processed(&mut self, id: PlayerId, sequence: u32) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.last_acknowledged = client.last_acknowledged.max(sequence);
        }
    }

    pub fn last_acknowledged(&self, id: PlayerId) -> Option<u32> {
        self.clients.get(&id).map(|client| client.last_acknowledged)
    }

    pub fn send_to(&self, id: PlayerId, frame: String) -> bool {
        self.clients
            .get(&id)
            .map(|client| client.send(frame))
            .unwrap_or(false)
    }

    pub fn clients_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::channel(4);

        assert_ok!(manager.add_client(1, test_addr(), tx.clone()));
        assert!(manager.is_full());
        let err = assert_err!(manager.add_client(2, test_addr(), tx));
        assert!(matches!(err, ServerError::ServerFull(1)));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::channel(4);
        manager.add_client(1, test_addr(), tx).unwrap();

        assert!(manager.remove_client(&1));
        assert!(!manager.remove_client(&1));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_acknowledgement_is_monotonic() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::channel(4);
        manager.add_client(1, test_addr(), tx).unwrap();

        manager.mark_command_processed(1, 5);
        manager.mark_command_processed(1, 3);
        assert_eq!(manager.last_acknowledged(1), Some(5));

        manager.mark_command_processed(99, 1);
        assert_eq!(manager.last_acknowledged(99), None);
    }

    #[test]
    fn test_new_client_needs_full_snapshot() {
        let (tx, _rx) = mpsc::channel(4);
        let client = Client::new(7, test_addr(), tx);
        assert!(client.needs_full_snapshot);
        assert_eq!(client.last_acknowledged, 0);
    }

    #[test]
    fn test_send_drops_when_queue_full() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = mpsc::channel(1);
        manager.add_client(1, test_addr(), tx).unwrap();

        assert!(manager.send_to(1, "first".to_string()));
        assert!(!manager.send_to(1, "second".to_string()));
        assert_eq!(rx.try_recv().unwrap(), "first");
        assert!(rx.try_recv().is_err());

        assert!(!manager.send_to(2, "nobody".to_string()));
    }
}
