//! Member registry and broadcast engine.
//!
//! The [`Registry`] maps each live connection's outbound handle to the
//! identity it negotiated. It is the single source of truth for who is in
//! the room: a connection receives broadcasts if and only if it has an entry
//! here.
//!
//! Outbound traffic never touches sockets directly. Every connection owns a
//! writer task fed by an unbounded channel, and a [`ConnectionHandle`] is the
//! sending half of that channel. A failed send means the writer task is gone.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use linechat_proto::color::HexColor;
use linechat_proto::line::ChatLine;
use tokio::sync::{RwLock, mpsc};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next unused id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value, for logging.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Requests consumed by a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write the line followed by `\n`.
    Line(String),
    /// Shut the write side down and stop the writer.
    Close,
}

/// Outbound write handle of one connection.
///
/// Cloning is cheap; all clones address the same writer task and share one
/// [`ConnectionId`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle with a fresh id and the receiver its writer task
    /// should drain.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::next(),
                tx,
            },
            rx,
        )
    }

    /// The connection this handle writes to.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues one line. Returns `false` if the writer task has exited.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.tx.send(Outbound::Line(line.into())).is_ok()
    }

    /// Asks the writer task to close the connection. Returns `false` if it
    /// has already exited.
    pub fn close(&self) -> bool {
        self.tx.send(Outbound::Close).is_ok()
    }

    /// Returns `true` once the writer task has dropped its receiver.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Identity of a registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Display name, never blank.
    pub name: String,
    /// Color shown next to the name.
    pub color: HexColor,
}

impl Member {
    /// Creates a member identity.
    #[must_use]
    pub fn new(name: impl Into<String>, color: HexColor) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// A line attributed to this member.
    #[must_use]
    pub fn line(&self, body: impl Into<String>) -> ChatLine {
        ChatLine::attributed(self.color, self.name.clone(), body)
    }
}

/// Errors raised by registry mutations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The handle is already registered. Sessions register once, so this is
    /// a bug in the caller rather than a runtime condition.
    #[error("connection {0} is already registered")]
    DuplicateHandle(ConnectionId),
}

struct Entry {
    handle: ConnectionHandle,
    member: Member,
}

/// Concurrent map from live connections to their member identity.
///
/// Thread-safe via [`RwLock`]. Registration and removal take the write lock;
/// broadcasts fan out under the read lock, so no broadcast observes a handle
/// whose removal completed before it started, nor one that is only partly
/// inserted.
pub struct Registry {
    entries: RwLock<HashMap<ConnectionId, Entry>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a member for `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHandle`] if the handle's connection
    /// is already registered. The existing entry is left untouched.
    pub async fn register(
        &self,
        handle: ConnectionHandle,
        member: Member,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().await;
        let id = handle.id();
        if entries.contains_key(&id) {
            return Err(RegistryError::DuplicateHandle(id));
        }
        entries.insert(id, Entry { handle, member });
        drop(entries);
        Ok(())
    }

    /// Removes the connection, returning its member if it was still present.
    ///
    /// Safe to call more than once; later calls return `None`.
    pub async fn deregister(&self, id: ConnectionId) -> Option<Member> {
        let mut entries = self.entries.write().await;
        entries.remove(&id).map(|entry| entry.member)
    }

    /// Delivers `line` to every registered connection, returning how many
    /// accepted it.
    ///
    /// Connections whose writer has exited are removed. No notice is
    /// broadcast about them here; their own session reports the departure.
    pub async fn broadcast(&self, line: &ChatLine) -> usize {
        let text = line.to_string();

        // Unbounded sends never wait, so the read lock only spans the fan-out.
        let entries = self.entries.read().await;
        let mut failed = Vec::new();
        for (id, entry) in entries.iter() {
            if !entry.handle.send_line(text.clone()) {
                failed.push(*id);
            }
        }
        let delivered = entries.len() - failed.len();
        drop(entries);

        if !failed.is_empty() {
            let mut entries = self.entries.write().await;
            for id in &failed {
                if entries.remove(id).is_some() {
                    tracing::debug!(conn_id = %id, "dropped member after failed write");
                }
            }
        }

        delivered
    }

    /// Closes every registered connection and empties the registry.
    ///
    /// Returns the number of members evicted. Sessions notice the closed
    /// connection on their own and finish their teardown.
    pub async fn close_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let evicted = entries.len();
        for (id, entry) in entries.drain() {
            tracing::info!(conn_id = %id, name = %entry.member.name, "closing member connection");
            let _ = entry.handle.close();
        }
        drop(entries);
        evicted
    }

    /// Number of registered members.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of the registered members, sorted by name.
    pub async fn members(&self) -> Vec<Member> {
        let entries = self.entries.read().await;
        let mut members: Vec<Member> = entries.values().map(|entry| entry.member.clone()).collect();
        drop(entries);
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }
}
