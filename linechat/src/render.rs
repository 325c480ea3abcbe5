//! Terminal rendering of broadcast lines.

use crossterm::style::{Color, Stylize};
use linechat_proto::color::HexColor;
use linechat_proto::line::ChatLine;

const fn terminal_color(color: HexColor) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

/// Renders one received line for the terminal.
///
/// Attributed lines show the sender's name in bold in their assigned color,
/// followed by the body in the default color. Plain lines pass through.
#[must_use]
pub fn render(line: &ChatLine) -> String {
    match line {
        ChatLine::Attributed { color, name, body } => {
            let sender = format!("{name}:").with(terminal_color(*color)).bold();
            format!("{sender} {body}")
        }
        ChatLine::Plain(text) => text.clone(),
    }
}

/// Parses and renders a raw line from the server.
#[must_use]
pub fn render_raw(raw: &str) -> String {
    render(&ChatLine::parse(raw))
}
