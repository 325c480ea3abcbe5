//! Human-readable status events for the operator.
//!
//! Every component reports through an [`EventSink`]. Events are traced and,
//! when a receiver is attached, forwarded over an unbounded channel so an
//! operator surface can show them. The sink is cheap to clone and safe to use
//! from any task.

use std::fmt;
use std::net::SocketAddr;

use linechat_proto::color::HexColor;
use tokio::sync::mpsc;

use crate::registry::ConnectionId;

/// Severity used when tracing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Per-message chatter.
    Debug,
    /// Normal lifecycle.
    Info,
    /// A single connection failed.
    Warn,
    /// The listener failed.
    Error,
}

/// Status event emitted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listening socket is bound.
    Listening {
        /// Address actually bound.
        addr: SocketAddr,
    },
    /// Binding the listening socket failed; the server did not start.
    BindFailed {
        /// Address that was requested.
        addr: String,
        /// Underlying error text.
        error: String,
    },
    /// A connection was accepted.
    ClientConnected {
        /// New connection.
        conn_id: ConnectionId,
        /// Remote address.
        peer: SocketAddr,
    },
    /// A connection finished naming and joined the room.
    MemberJoined {
        /// Connection of the member.
        conn_id: ConnectionId,
        /// Negotiated name.
        name: String,
        /// Assigned color.
        color: HexColor,
    },
    /// A member sent a line.
    MessageReceived {
        /// Sender name.
        name: String,
        /// Line as received.
        text: String,
    },
    /// A registered member's session ended.
    MemberLeft {
        /// Connection of the member.
        conn_id: ConnectionId,
        /// Member name.
        name: String,
    },
    /// A connection closed before it finished naming.
    ClientDisconnected {
        /// Connection that closed.
        conn_id: ConnectionId,
    },
    /// A session ended on an error. The server keeps running.
    SessionFailed {
        /// Connection that failed.
        conn_id: ConnectionId,
        /// Member name, if the session got that far.
        name: Option<String>,
        /// Underlying error text.
        error: String,
    },
    /// Accepting connections failed while the server was meant to be running.
    AcceptFailed {
        /// Underlying error text.
        error: String,
    },
    /// The accept loop ended because the server was stopped.
    ListenerClosed,
    /// Every member connection was closed by a stop.
    ClientsDisconnected {
        /// Number of members evicted.
        count: usize,
    },
    /// The server finished stopping.
    Stopped,
}

impl ServerEvent {
    /// How loudly this event is traced.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MessageReceived { .. } => Severity::Debug,
            Self::SessionFailed { .. } => Severity::Warn,
            Self::BindFailed { .. } | Self::AcceptFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listening { addr } => write!(f, "chat server listening on {addr}"),
            Self::BindFailed { addr, error } => {
                write!(f, "failed to start chat server on {addr}: {error}")
            }
            Self::ClientConnected { conn_id, peer } => {
                write!(f, "new client connected from {peer} ({conn_id})")
            }
            Self::MemberJoined {
                conn_id,
                name,
                color,
            } => write!(f, "client '{name}' joined with color {color} ({conn_id})"),
            Self::MessageReceived { name, text } => write!(f, "message from {name}: {text}"),
            Self::MemberLeft { conn_id, name } => {
                write!(f, "client '{name}' disconnected ({conn_id})")
            }
            Self::ClientDisconnected { conn_id } => {
                write!(f, "unnamed client disconnected ({conn_id})")
            }
            Self::SessionFailed {
                conn_id,
                name,
                error,
            } => write!(
                f,
                "error communicating with client {} ({conn_id}): {error}",
                name.as_deref().unwrap_or("unknown")
            ),
            Self::AcceptFailed { error } => write!(f, "error accepting connections: {error}"),
            Self::ListenerClosed => f.write_str("listener closed"),
            Self::ClientsDisconnected { count } => {
                write!(f, "all clients disconnected ({count} evicted)")
            }
            Self::Stopped => f.write_str("chat server stopped"),
        }
    }
}

/// Cloneable reporter for [`ServerEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ServerEvent>>,
}

impl EventSink {
    /// Creates a sink whose events are also delivered to the returned receiver.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sink that only traces.
    #[must_use]
    pub const fn tracing_only() -> Self {
        Self { tx: None }
    }

    /// Traces the event and forwards it to the receiver, if one is attached.
    ///
    /// A dropped receiver is not an error: the operator simply stopped
    /// listening.
    pub fn emit(&self, event: ServerEvent) {
        match event.severity() {
            Severity::Debug => tracing::debug!(target: "linechat::events", "{event}"),
            Severity::Info => tracing::info!(target: "linechat::events", "{event}"),
            Severity::Warn => tracing::warn!(target: "linechat::events", "{event}"),
            Severity::Error => tracing::error!(target: "linechat::events", "{event}"),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
