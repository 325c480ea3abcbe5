//! linechat -- terminal client for a linechat server.
//!
//! Prints every broadcast line, coloring each sender's name, and sends each
//! line typed on stdin. Type `/quit` (or close stdin) to leave.
//!
//! ```bash
//! # Connect to a local server and answer the name prompt interactively
//! cargo run --bin linechat
//!
//! # Connect elsewhere and join as "alice"
//! cargo run --bin linechat -- --host 10.0.0.5 --port 4000 --name alice
//! ```

use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use linechat::config::{CliArgs, ClientConfig};
use linechat::connection::{self, ClientError};
use linechat::render;
use linechat_proto::protocol::NAME_PROMPT;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; stdout carries the chat transcript.
    let log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let code = match run(&config).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "client failed");
            eprintln!("{e}");
            1
        }
    };

    tracing::info!("linechat exiting");
    drop(log_guard);
    // A pending stdin read holds a blocking thread that would delay runtime
    // shutdown until the next keypress.
    std::process::exit(code);
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("linechat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Relays stdin to the server and the server's lines to stdout until the
/// server closes the connection.
async fn run(config: &ClientConfig) -> Result<(), ClientError> {
    let addr = config.addr();
    let (mut incoming, mut outgoing) = connection::connect(&addr).await?;
    tracing::info!(%addr, "connected");

    let mut typed = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut pending_name = config.name.clone();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            received = incoming.next_line() => {
                let Some(line) = received? else {
                    tracing::info!("server closed the connection");
                    break;
                };
                let mut out = render::render_raw(&line);
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;

                if line == NAME_PROMPT
                    && let Some(name) = pending_name.take()
                {
                    tracing::debug!(%name, "answering name prompt");
                    outgoing.send_line(&name).await?;
                }
            }
            line = typed.next_line(), if stdin_open => match line? {
                Some(text) => outgoing.send_line(&text).await?,
                None => {
                    tracing::info!("stdin closed, leaving");
                    stdin_open = false;
                    outgoing.finish().await?;
                }
            },
        }
    }

    Ok(())
}
