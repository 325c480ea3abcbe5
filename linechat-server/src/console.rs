//! Operator console: line commands that drive a [`ChatServer`].
//!
//! Commands are read one per line:
//!
//! | command          | effect                                   |
//! |------------------|------------------------------------------|
//! | `start`          | bind and start accepting                 |
//! | `stop`           | stop and disconnect everyone             |
//! | `toggle`         | `stop` if running, otherwise `start`     |
//! | `status`         | print address and current members        |
//! | `help`           | list commands                            |
//! | `quit` / `exit`  | stop the server and leave the console    |

use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::server::ChatServer;

const HELP: &str = "commands: start, stop, toggle, status, help, quit";

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Start the server.
    Start,
    /// Stop the server.
    Stop,
    /// Start or stop depending on the current state.
    Toggle,
    /// Report the server state.
    Status,
    /// List commands.
    Help,
    /// Stop the server and leave the console.
    Quit,
}

/// A line that is not a console command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for OperatorCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "toggle" => Ok(Self::Toggle),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Why the console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator asked to quit. The server has been stopped.
    Quit,
    /// The input reached EOF. The server is left as it was.
    InputClosed,
}

/// Describes the server state in one line.
pub async fn status_report(server: &ChatServer) -> String {
    let Some(addr) = server.local_addr() else {
        return "status: stopped".to_string();
    };
    let members = server.registry().members().await;
    let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    if names.is_empty() {
        format!("status: running on {addr}, no members")
    } else {
        format!(
            "status: running on {addr}, {} member(s): {}",
            names.len(),
            names.join(", ")
        )
    }
}

/// Applies one command, returning the reply for the operator.
pub async fn execute(server: &ChatServer, command: OperatorCommand) -> String {
    match command {
        OperatorCommand::Start => start(server).await,
        OperatorCommand::Stop | OperatorCommand::Quit => {
            if server.is_running() {
                server.stop().await;
                "server stopped".to_string()
            } else {
                "server is not running".to_string()
            }
        }
        OperatorCommand::Toggle => {
            if server.is_running() {
                server.stop().await;
                "server stopped".to_string()
            } else {
                start(server).await
            }
        }
        OperatorCommand::Status => status_report(server).await,
        OperatorCommand::Help => HELP.to_string(),
    }
}

async fn start(server: &ChatServer) -> String {
    match server.start().await {
        Ok(addr) => format!("server listening on {addr}"),
        Err(e) => format!("could not start: {e}"),
    }
}

/// Reads commands from `input` and writes replies to `output` until `quit`
/// or EOF.
///
/// # Errors
///
/// Returns an I/O error if reading a command or writing a reply fails.
pub async fn run<R, W>(
    server: &ChatServer,
    input: R,
    output: &mut W,
) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<OperatorCommand>() {
            Ok(command) => {
                let reply = execute(server, command).await;
                if command == OperatorCommand::Quit {
                    write_reply(output, &reply).await?;
                    return Ok(ConsoleExit::Quit);
                }
                reply
            }
            Err(e) => format!("{e}; {HELP}"),
        };
        write_reply(output, &reply).await?;
    }
    Ok(ConsoleExit::InputClosed)
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &str) -> std::io::Result<()> {
    output.write_all(reply.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
