//! Live set of connected performer clients.
//!
//! The registry is the only state mutated from multiple concurrent
//! contexts: the accept path adds, each connection's reader task removes.
//! All mutation goes through [`ConnectionRegistry::add`] and
//! [`ConnectionRegistry::remove`]; sessions work from immutable snapshots
//! and are never affected by membership changes after they start.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Stable identity of one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One connected performer: identity plus the writable half of its socket.
///
/// The write half is shared behind a mutex so a snapshot can keep sending
/// to a client even after the registry has dropped it.
#[derive(Clone)]
pub struct ConnectedClient {
    pub id: ClientId,
    pub addr: SocketAddr,
    /// Join order, stable for the lifetime of the connection.
    pub seq: u64,
    pub writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl fmt::Debug for ConnectedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedClient")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryInner {
    clients: Vec<ConnectedClient>,
    next_seq: u64,
}

/// Tracks currently connected clients under a single lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning its id.
    pub fn add(&self, addr: SocketAddr, writer: OwnedWriteHalf) -> ClientId {
        let mut inner = self.inner.write().unwrap();
        let id = ClientId::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.clients.push(ConnectedClient {
            id,
            addr,
            seq,
            writer: Arc::new(Mutex::new(writer)),
        });
        info!(%id, %addr, "client joined ({} connected)", inner.clients.len());
        id
    }

    /// Remove a client. Returns false if it was already gone.
    pub fn remove(&self, id: ClientId) -> bool {
        let mut inner = self.inner.write().unwrap();
        let before = inner.clients.len();
        inner.clients.retain(|c| c.id != id);
        let removed = inner.clients.len() < before;
        if removed {
            info!(%id, "client left ({} connected)", inner.clients.len());
        }
        removed
    }

    /// Immutable copy of the current clients, in join order.
    pub fn snapshot(&self) -> Vec<ConnectedClient> {
        self.inner.read().unwrap().clients.clone()
    }

    /// Number of currently connected clients.
    pub fn count(&self) -> usize {
        self.inner.read().unwrap().clients.len()
    }
}
