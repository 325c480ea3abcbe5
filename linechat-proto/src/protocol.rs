//! Fixed vocabulary of the chat line protocol.
//!
//! Client perspective:
//!
//! 1. connect, receive [`NAME_PROMPT`];
//! 2. send one line with the desired display name (may be empty);
//! 3. receive the personalized [`welcome`] line;
//! 4. exchange lines until sending [`QUIT_COMMAND`] or disconnecting.

/// Default TCP port of the chat server.
pub const DEFAULT_PORT: u16 = 12345;

/// Line a client sends to leave. Compared case-insensitively and never broadcast.
pub const QUIT_COMMAND: &str = "/quit";

/// First line the server sends on a new connection.
pub const NAME_PROMPT: &str = "Welcome to the chat. Please enter your name:";

/// Body of the notice broadcast when a member registers.
pub const JOIN_BODY: &str = "has joined the chat.";

/// Body of the notice broadcast when a member leaves.
pub const LEAVE_BODY: &str = "has left the chat.";

/// Prefix of generated names for clients that supply none.
pub const ANONYMOUS_PREFIX: &str = "Anonymous-";

/// Sender name used for departures of connections that never registered.
pub const UNKNOWN_SENDER: &str = "An unknown client";

/// Personalized welcome sent once the display name is settled.
#[must_use]
pub fn welcome(name: &str) -> String {
    format!("Welcome, {name}!")
}

/// Returns `true` if `line` is the quit command, ignoring ASCII case.
#[must_use]
pub fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case(QUIT_COMMAND)
}
