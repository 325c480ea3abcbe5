//! Presentation colors attached to chat members.

use std::fmt;
use std::str::FromStr;

/// Error returned when a color string is not six hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    /// The input (after an optional `#`) was not exactly six characters.
    #[error("expected 6 hex digits, got {0} characters")]
    BadLength(usize),
    /// The input contained a character outside `[0-9a-fA-F]`.
    #[error("invalid hex digit in color: {0:?}")]
    BadDigit(String),
}

/// An RGB color as sent in front of attributed lines.
///
/// The canonical text form is six lowercase hex digits (see [`HexColor::hex`]).
/// On the wire the color is written with a leading `#` (the [`fmt::Display`]
/// form), which is what line renderers decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl HexColor {
    /// Neutral gray used for lines with no attributable member.
    pub const NEUTRAL_GRAY: Self = Self::new(0x80, 0x80, 0x80);

    /// Creates a color from its three channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns the channels as an `[r, g, b]` array.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Six lowercase hex digits, without the leading `#`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorParseError;

    /// Parses `#rrggbb` or `rrggbb`, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 {
            return Err(ColorParseError::BadLength(digits.chars().count()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigit(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorParseError::BadDigit(s.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}
