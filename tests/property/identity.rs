//! Property tests for member identity.
//!
//! 1. Every assigned color stays inside the readable channel band.
//! 2. The hex form of an assigned color is six lowercase digits.
//! 3. Typed names are kept as typed; blank names become anonymous.
//! 4. A negotiated name always reads back intact from a broadcast line.

use linechat_proto::color::HexColor;
use linechat_proto::line::ChatLine;
use linechat_proto::protocol::ANONYMOUS_PREFIX;
use linechat_server::identity::{CHANNEL_MAX, CHANNEL_MIN, negotiate_name, random_color_with};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

proptest! {
    #[test]
    fn colors_stay_in_band(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let color = random_color_with(&mut rng);
            for channel in color.channels() {
                prop_assert!((CHANNEL_MIN..=CHANNEL_MAX).contains(&channel), "{color}");
            }
        }
    }

    #[test]
    fn color_hex_is_six_lowercase_digits(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let hex = random_color_with(&mut rng).hex();
        prop_assert_eq!(hex.len(), 6);
        prop_assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')), "{}", hex);
    }

    #[test]
    fn typed_names_are_kept(name in "[^\n\r:]{0,32}") {
        let negotiated = negotiate_name(Some(&name));
        if name.trim().is_empty() {
            prop_assert!(negotiated.starts_with(ANONYMOUS_PREFIX));
        } else {
            prop_assert_eq!(negotiated, name);
        }
    }

    #[test]
    fn negotiated_names_survive_the_line_format(name in "[^\n\r]{1,32}", body in "[^\n\r]{0,64}") {
        let name = negotiate_name(Some(&name));
        let line = ChatLine::attributed(HexColor::NEUTRAL_GRAY, name.clone(), body.clone());
        prop_assert_eq!(ChatLine::parse(&line.to_string()), line);
    }
}
