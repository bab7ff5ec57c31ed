//! Color utility functions shared across the engine.
//!
//! Label documents store colors as `#rrggbb` strings; the engine works
//! with plain RGB triples.

use crate::model::Rgb;

/// Parse a `#rrggbb` (or `rrggbb`) hex string into an RGB triple.
///
/// Returns `None` for anything that is not exactly six hex digits.
pub fn parse_hex(value: &str) -> Option<Rgb> {
    let digits = value.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Format an RGB triple as a lowercase `#rrggbb` string.
pub fn format_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Blend `over` onto `under` with the given opacity (0.0-1.0).
pub fn blend(under: Rgb, over: Rgb, alpha: f32) -> Rgb {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| -> u8 {
        let v = f32::from(a) * (1.0 - alpha) + f32::from(b) * alpha;
        v.round().clamp(0.0, 255.0) as u8
    };
    [
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ]
}
