//! Listener lifecycle: bind, accept, and stop.
//!
//! [`ChatServer`] owns the listening socket and the member registry. Each
//! [`ChatServer::start`] binds a fresh socket and spawns an accept loop on its
//! own task, so [`ChatServer::stop`] can be called from any other task while
//! the loop waits for connections. A server can be started again after it
//! has been stopped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::events::{EventSink, ServerEvent};
use crate::registry::{ConnectionHandle, Registry};
use crate::session::{self, RunSignal, SessionContext};

/// Errors returned by [`ChatServer::start`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// `start` was called while the server was running.
    #[error("chat server is already running")]
    AlreadyRunning,
}

/// State shared between the server handle, its accept loop, and sessions.
struct Shared {
    registry: Arc<Registry>,
    events: EventSink,
    running: AtomicBool,
    max_line_length: usize,
}

impl Shared {
    fn report_stopped(&self, count: usize) {
        self.events.emit(ServerEvent::ClientsDisconnected { count });
        self.events.emit(ServerEvent::Stopped);
    }
}

/// Handles of one start/stop cycle.
struct RunState {
    signal: Arc<RunSignal>,
    accept_task: JoinHandle<()>,
}

/// TCP chat server with an explicit start/stop lifecycle.
pub struct ChatServer {
    bind_addr: String,
    shared: Arc<Shared>,
    /// Serializes `start` and `stop`.
    lifecycle: Mutex<Option<RunState>>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl ChatServer {
    /// Creates a stopped server and the receiver for its status events.
    #[must_use]
    pub fn new(config: &ServerConfig) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events, rx) = EventSink::channel();
        (Self::with_events(config, events), rx)
    }

    /// Creates a stopped server reporting through `events`.
    #[must_use]
    pub fn with_events(config: &ServerConfig, events: EventSink) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            shared: Arc::new(Shared {
                registry: Arc::new(Registry::new()),
                events,
                running: AtomicBool::new(false),
                max_line_length: config.max_line_length,
            }),
            lifecycle: Mutex::new(None),
            local_addr: parking_lot::Mutex::new(None),
        }
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Returns once the socket is bound; connections are served on
    /// background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] if the server is running, or
    /// [`ServerError::Bind`] if the socket cannot be bound. A bind failure is
    /// also reported as [`ServerEvent::BindFailed`].
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.shared.running.load(Ordering::Acquire) {
            return Err(ServerError::AlreadyRunning);
        }

        let bound = match TcpListener::bind(&self.bind_addr).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (listener, addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.shared.events.emit(ServerEvent::BindFailed {
                    addr: self.bind_addr.clone(),
                    error: source.to_string(),
                });
                return Err(ServerError::Bind {
                    addr: self.bind_addr.clone(),
                    source,
                });
            }
        };

        let signal = RunSignal::new();
        self.shared.running.store(true, Ordering::Release);
        self.shared.events.emit(ServerEvent::Listening { addr });

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.shared),
            Arc::clone(&signal),
        ));
        *lifecycle = Some(RunState {
            signal,
            accept_task,
        });
        drop(lifecycle);
        *self.local_addr.lock() = Some(addr);

        Ok(addr)
    }

    /// Stops accepting, closes every member connection, and empties the
    /// registry. Evicted members get no departure notice.
    ///
    /// Calling `stop` on a stopped server does nothing. Sessions finish their
    /// own teardown in the background.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        let run = lifecycle.take();
        *self.local_addr.lock() = None;
        if !was_running {
            return;
        }

        tracing::info!("stopping chat server");
        let mut count = 0;
        if let Some(run) = run {
            count = run.signal.halt(&self.shared.registry).await;
            if let Err(e) = run.accept_task.await {
                tracing::warn!(error = %e, "accept task failed");
            }
        }
        // Connections accepted while the first eviction ran.
        count += self.shared.registry.close_all().await;
        self.shared.report_stopped(count);
        drop(lifecycle);
    }

    /// Returns `true` between a successful `start` and the next `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Address the server is listening on, while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if self.is_running() {
            *self.local_addr.lock()
        } else {
            None
        }
    }

    /// The member registry shared by all sessions.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(run) = self.lifecycle.get_mut().take() {
            run.signal.abort();
            run.accept_task.abort();
        }
    }
}

/// Accepts connections until the run is stopped or accepting fails.
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    signal: Arc<RunSignal>,
) {
    let mut stop_signal = signal.subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (handle, outbound) = ConnectionHandle::channel();
                    shared.events.emit(ServerEvent::ClientConnected {
                        conn_id: handle.id(),
                        peer,
                    });
                    let ctx = SessionContext {
                        registry: Arc::clone(&shared.registry),
                        events: shared.events.clone(),
                        max_line_length: shared.max_line_length,
                        run: Arc::clone(&signal),
                    };
                    tokio::spawn(session::run(stream, handle, outbound, ctx));
                }
                Err(e) => {
                    // Only a failure while still meant to be running is a fault.
                    if shared.running.swap(false, Ordering::AcqRel) {
                        shared.events.emit(ServerEvent::AcceptFailed {
                            error: e.to_string(),
                        });
                        let count = signal.halt(&shared.registry).await;
                        shared.report_stopped(count);
                    } else {
                        shared.events.emit(ServerEvent::ListenerClosed);
                    }
                    return;
                }
            },
            () = session::stopped(&mut stop_signal) => {
                // Dropping the listener on return closes the socket.
                shared.events.emit(ServerEvent::ListenerClosed);
                return;
            }
        }
    }
}
