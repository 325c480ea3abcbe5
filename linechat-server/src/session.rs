//! Per-connection session: naming, relaying, and teardown.
//!
//! A session moves through four states:
//!
//! 1. **Connecting**: a color is assigned and the writer task is spawned.
//! 2. **Naming**: the prompt is sent and one line is read as the display
//!    name. The member is registered and its join is announced.
//! 3. **Active**: every received line is broadcast until `/quit`, EOF, or a
//!    read error.
//! 4. **Closed**: the member is deregistered, the room is told, and the
//!    connection is shut down. Every exit path ends here exactly once.
//!
//! The session also ends when its writer task exits (the server closed the
//! connection, or a write failed) or when the server that accepted it stops.

use linechat_proto::color::HexColor;
use linechat_proto::line::ChatLine;
use linechat_proto::protocol::{self, JOIN_BODY, LEAVE_BODY, NAME_PROMPT, UNKNOWN_SENDER};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::events::{EventSink, ServerEvent};
use crate::identity;
use crate::registry::{ConnectionHandle, ConnectionId, Member, Outbound, Registry, RegistryError};

/// Default upper bound for one inbound line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Errors that end a single session. None of them affect other sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading from the connection failed, or the input was not UTF-8.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The client sent a line longer than the configured limit.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured limit.
        limit: usize,
    },
    /// The connection was registered twice.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Server-side state a session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Room membership shared by all sessions of the server.
    pub registry: Arc<Registry>,
    /// Operator event reporter.
    pub events: EventSink,
    /// Longest accepted inbound line, in bytes.
    pub max_line_length: usize,
    /// Stop control of the server run that accepted this connection.
    pub run: Arc<RunSignal>,
}

impl SessionContext {
    fn is_stopped(&self) -> bool {
        self.run.is_stopping()
    }
}

/// Stop control for one server run, shared by its accept loop and sessions.
///
/// Stopping is two-phase. The run is first marked as stopping, so sessions
/// that wake up from then on stay silent. Members are then evicted, and only
/// after that are the waiting tasks woken.
#[derive(Debug)]
pub struct RunSignal {
    stopping: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl Default for RunSignal {
    fn default() -> Self {
        Self {
            stopping: AtomicBool::new(false),
            shutdown: watch::Sender::new(false),
        }
    }
}

impl RunSignal {
    /// A fresh, running signal.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `true` once [`halt`](Self::halt) or [`abort`](Self::abort) began.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Receiver that flips to `true` when waiting tasks must end.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ends the run: evicts every member of `registry`, then wakes the
    /// accept loop and every session. Returns how many members were evicted.
    pub async fn halt(&self, registry: &Registry) -> usize {
        self.stopping.store(true, Ordering::Release);
        let evicted = registry.close_all().await;
        self.shutdown.send_replace(true);
        evicted
    }

    /// Marks the run stopped and wakes waiting tasks without touching the
    /// registry.
    pub fn abort(&self) {
        self.stopping.store(true, Ordering::Release);
        self.shutdown.send_replace(true);
    }
}

/// Newline-delimited reader with a per-line size limit.
pub struct LineReader<R> {
    inner: BufReader<R>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wraps `reader`, rejecting lines longer than `max_len` bytes.
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max_len,
        }
    }

    /// Reads the next line without its `\n` or `\r\n` terminator.
    ///
    /// Returns `Ok(None)` at EOF. A final line without a terminator is still
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::LineTooLong`] if the line exceeds the limit,
    /// or [`SessionError::Io`] on read failure or invalid UTF-8.
    pub async fn next_line(&mut self) -> Result<Option<String>, SessionError> {
        // Room for the limit plus a `\r\n` terminator.
        let budget = self.max_len as u64 + 2;
        let mut buf = Vec::new();
        let read = (&mut self.inner)
            .take(budget)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        if buf.len() > self.max_len {
            return Err(SessionError::LineTooLong {
                limit: self.max_len,
            });
        }

        let line = String::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(line))
    }
}

/// Runs one connection from greeting to teardown.
///
/// `handle` and `outbound` must come from the same
/// [`ConnectionHandle::channel`] call.
pub async fn run<S>(
    stream: S,
    handle: ConnectionHandle,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    ctx: SessionContext,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let conn_id = handle.id();
    let (read_half, write_half) = tokio::io::split(stream);
    let mut writer = tokio::spawn(write_loop(conn_id, write_half, outbound));
    let mut reader = LineReader::new(read_half, ctx.max_line_length);
    let mut shutdown = ctx.run.subscribe();
    let mut session = Session {
        handle,
        ctx,
        member: None,
    };

    let mut writer_done = false;
    let outcome = tokio::select! {
        result = session.drive(&mut reader) => result,
        _ = &mut writer => {
            writer_done = true;
            tracing::debug!(conn_id = %conn_id, "connection closed by server");
            Ok(())
        }
        () = stopped(&mut shutdown) => {
            tracing::debug!(conn_id = %conn_id, "server stopped, ending session");
            Ok(())
        }
    };

    session.close(outcome).await;

    if !writer_done {
        // Flushes queued lines (the departure notice included) before the
        // write side shuts down.
        let _ = session.handle.close();
        if let Err(e) = writer.await {
            tracing::warn!(conn_id = %conn_id, error = %e, "writer task failed");
        }
    }
}

/// Resolves once the server run is stopped or gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Forwards queued lines to the connection until closed.
async fn write_loop<W>(conn_id: ConnectionId, mut writer: W, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Line(line) => {
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                if let Err(e) = writer.write_all(&bytes).await {
                    tracing::warn!(conn_id = %conn_id, error = %e, "write failed");
                    return;
                }
            }
            Outbound::Close => break,
        }
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(conn_id = %conn_id, error = %e, "error closing connection");
    }
}

struct Session {
    handle: ConnectionHandle,
    ctx: SessionContext,
    /// Set once registration succeeded.
    member: Option<Member>,
}

impl Session {
    /// Connecting, Naming and Active states.
    async fn drive<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut LineReader<R>,
    ) -> Result<(), SessionError> {
        let conn_id = self.handle.id();
        let color = identity::random_color();

        let _ = self.handle.send_line(NAME_PROMPT);
        let requested = reader.next_line().await?;
        let name = identity::negotiate_name(requested.as_deref());
        let _ = self.handle.send_line(protocol::welcome(&name));

        let member = Member::new(name, color);
        self.ctx
            .registry
            .register(self.handle.clone(), member.clone())
            .await?;
        self.member = Some(member.clone());
        self.ctx.events.emit(ServerEvent::MemberJoined {
            conn_id,
            name: member.name.clone(),
            color,
        });
        // A stop that evicted before this registration went through.
        if self.ctx.is_stopped() {
            return Ok(());
        }
        self.ctx.registry.broadcast(&member.line(JOIN_BODY)).await;

        while let Some(text) = reader.next_line().await? {
            self.ctx.events.emit(ServerEvent::MessageReceived {
                name: member.name.clone(),
                text: text.clone(),
            });
            if protocol::is_quit(&text) {
                break;
            }
            self.ctx.registry.broadcast(&member.line(text)).await;
        }
        Ok(())
    }

    /// Closed state.
    async fn close(&self, outcome: Result<(), SessionError>) {
        let conn_id = self.handle.id();

        if let Err(error) = &outcome {
            if matches!(error, SessionError::Registry(_)) {
                tracing::error!(conn_id = %conn_id, error = %error, "registry invariant violated");
            }
            self.ctx.events.emit(ServerEvent::SessionFailed {
                conn_id,
                name: self.member.as_ref().map(|m| m.name.clone()),
                error: error.to_string(),
            });
        }

        if self.ctx.registry.deregister(conn_id).await.is_none() && self.member.is_some() {
            tracing::debug!(conn_id = %conn_id, "member was already evicted");
        }
        // A stopping run says nothing: the room is being torn down. Otherwise
        // the departure is announced here, including for members a failed
        // broadcast write already dropped.
        let notice = if self.ctx.is_stopped() {
            None
        } else {
            Some(self.member.as_ref().map_or_else(
                || ChatLine::attributed(HexColor::NEUTRAL_GRAY, UNKNOWN_SENDER, LEAVE_BODY),
                |member| member.line(LEAVE_BODY),
            ))
        };

        match &self.member {
            Some(member) => self.ctx.events.emit(ServerEvent::MemberLeft {
                conn_id,
                name: member.name.clone(),
            }),
            None => self
                .ctx
                .events
                .emit(ServerEvent::ClientDisconnected { conn_id }),
        }

        if let Some(line) = notice {
            self.ctx.registry.broadcast(&line).await;
        }
    }
}
