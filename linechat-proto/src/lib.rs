//! Shared protocol definitions for the linechat line format.
//!
//! Everything on the wire is a newline-terminated UTF-8 line. Lines
//! attributed to a member carry the member's color and name in front of
//! the body (`#rrggbb|name: body`); system text is sent unprefixed.

pub mod color;
pub mod line;
pub mod protocol;
