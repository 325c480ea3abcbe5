//! Terminal client for linechat.
//!
//! Connects to a linechat server, forwards typed lines, and prints the
//! broadcast transcript with each sender's color.

pub mod config;
pub mod connection;
pub mod render;
