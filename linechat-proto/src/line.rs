//! Formatting and parsing of broadcast lines.

use std::fmt;

use crate::color::HexColor;

/// One broadcast line, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// A line attributed to a sender: `#rrggbb|name: body`.
    Attributed {
        /// Sender color.
        color: HexColor,
        /// Sender display name.
        name: String,
        /// Message text.
        body: String,
    },
    /// System or announcement text with no attributable sender.
    Plain(String),
}

impl ChatLine {
    /// Builds an attributed line.
    #[must_use]
    pub fn attributed(color: HexColor, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Attributed {
            color,
            name: name.into(),
            body: body.into(),
        }
    }

    /// Interprets a received line.
    ///
    /// Anything that does not start with a valid color followed by `|` and
    /// contain a `": "` separator is treated as plain text. The name ends at
    /// the first `": "`, so bodies may contain further separators.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let attributed = line.split_once('|').and_then(|(color, rest)| {
            let color = color.parse::<HexColor>().ok()?;
            let (name, body) = rest.split_once(": ")?;
            Some(Self::attributed(color, name, body))
        });
        attributed.unwrap_or_else(|| Self::Plain(line.to_string()))
    }
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributed { color, name, body } => write!(f, "{color}|{name}: {body}"),
            Self::Plain(text) => f.write_str(text),
        }
    }
}
