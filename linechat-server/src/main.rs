//! linechat server -- line-oriented broadcast chat over TCP.
//!
//! Starts listening (unless `--no-autostart`) and reads operator commands
//! from stdin: `start`, `stop`, `toggle`, `status`, `quit`. Status events
//! are logged to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:12345
//! cargo run --bin linechat-server
//!
//! # Run on custom address
//! cargo run --bin linechat-server -- --bind 127.0.0.1:4000
//!
//! # Or via environment variable
//! LINECHAT_ADDR=127.0.0.1:4000 cargo run --bin linechat-server
//! ```

use clap::Parser;
use linechat_server::config::{ServerCliArgs, ServerConfig};
use linechat_server::console::{self, ConsoleExit};
use linechat_server::events::EventSink;
use linechat_server::server::ChatServer;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let server = ChatServer::with_events(&config, EventSink::tracing_only());

    if !cli.no_autostart {
        // A bind failure is already reported as an event; the operator can
        // retry with `start`.
        let _ = server.start().await;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = console::run(&server, stdin, &mut stdout) => match result {
            Ok(ConsoleExit::Quit) => {}
            Ok(ConsoleExit::InputClosed) => {
                tracing::info!("console input closed, press Ctrl-C to stop");
                wait_for_interrupt().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "console failed");
                wait_for_interrupt().await;
            }
        },
        () = wait_for_interrupt() => {}
    }

    server.stop().await;

    // A pending stdin read holds a blocking thread that would delay runtime
    // shutdown until the next keypress.
    std::process::exit(0);
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("interrupt received, shutting down");
}
