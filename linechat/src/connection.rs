//! TCP connection to a linechat server.
//!
//! [`connect`] returns the two halves of the connection so reading the
//! transcript and sending typed lines can proceed independently.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Errors raised by the client connection.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Reading or writing the established connection failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receiving half: lines broadcast by the server.
#[derive(Debug)]
pub struct Incoming {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl Incoming {
    /// Next line from the server, without its `\n` or `\r\n` terminator.
    /// `None` once the server has closed the connection.
    ///
    /// Cancel-safe, so it can be raced in `tokio::select!`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the read fails.
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        Ok(self.lines.next_line().await?)
    }
}

/// Sending half: lines typed by the user.
#[derive(Debug)]
pub struct Outgoing {
    writer: OwnedWriteHalf,
}

impl Outgoing {
    /// Sends one line, appending the newline terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the write fails.
    pub async fn send_line(&mut self, text: &str) -> Result<(), ClientError> {
        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(b'\n');
        self.writer.write_all(&buf).await?;
        Ok(())
    }

    /// Half-closes the connection. The server treats this as the client
    /// leaving and closes its side in turn.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the shutdown fails.
    pub async fn finish(&mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Connects to `addr` (`host:port`).
///
/// # Errors
///
/// Returns [`ClientError::Connect`] if the server cannot be reached.
pub async fn connect(addr: &str) -> Result<(Incoming, Outgoing), ClientError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not disable Nagle");
    }
    let (read, writer) = stream.into_split();
    Ok((
        Incoming {
            lines: BufReader::new(read).lines(),
        },
        Outgoing { writer },
    ))
}
