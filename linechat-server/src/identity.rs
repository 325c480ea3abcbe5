//! Presentation identity assigned to each connection: color and name.

use linechat_proto::color::HexColor;
use linechat_proto::protocol::ANONYMOUS_PREFIX;
use rand::Rng;

/// Lowest channel value of a generated color.
pub const CHANNEL_MIN: u8 = 50;

/// Highest channel value of a generated color.
///
/// Together with [`CHANNEL_MIN`] this keeps generated colors readable on a
/// light background.
pub const CHANNEL_MAX: u8 = 200;

/// Number of random hex characters after [`ANONYMOUS_PREFIX`].
const ANONYMOUS_SUFFIX_LEN: usize = 4;

/// Samples a color with every channel in `CHANNEL_MIN..=CHANNEL_MAX`.
#[must_use]
pub fn random_color() -> HexColor {
    random_color_with(&mut rand::rng())
}

/// Same as [`random_color`] with a caller-supplied RNG.
pub fn random_color_with<R: Rng + ?Sized>(rng: &mut R) -> HexColor {
    HexColor::new(
        rng.random_range(CHANNEL_MIN..=CHANNEL_MAX),
        rng.random_range(CHANNEL_MIN..=CHANNEL_MAX),
        rng.random_range(CHANNEL_MIN..=CHANNEL_MAX),
    )
}

/// Generates a name like `Anonymous-3f9a`.
///
/// Collisions are unlikely but possible; names are not identities.
#[must_use]
pub fn anonymous_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{ANONYMOUS_PREFIX}{}", &id[..ANONYMOUS_SUFFIX_LEN])
}

/// Settles the display name from the line the client sent, if any.
///
/// `None` (the client closed before naming) and blank lines both yield an
/// anonymous name. Otherwise the line is kept as typed, except that the
/// name/body separator `": "` is collapsed to `":"` so the name survives
/// [`ChatLine::parse`](linechat_proto::line::ChatLine::parse).
#[must_use]
pub fn negotiate_name(requested: Option<&str>) -> String {
    match requested {
        Some(name) if !name.trim().is_empty() => without_separator(name),
        _ => anonymous_name(),
    }
}

fn without_separator(name: &str) -> String {
    let mut name = name.to_string();
    // Collapsing `":  "` leaves a fresh `": "` behind.
    while name.contains(": ") {
        name = name.replace(": ", ":");
    }
    name
}
