//! linechat server library.
//!
//! Exposes the chat server for use in tests and embedding. The server
//! accepts TCP connections, negotiates a display name and color for each,
//! keeps live members in a [`registry::Registry`], and broadcasts every
//! line a member sends to all members.

pub mod config;
pub mod console;
pub mod events;
pub mod identity;
pub mod registry;
pub mod server;
pub mod session;
