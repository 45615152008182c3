//! Deterministic candidate color assignment.
//!
//! The first few candidates get hand-picked pastel colors; the rest are
//! generated by rotating the hue by the golden angle (137.5 degrees) per
//! step from the last hand-picked color. Saturation and value vary with the
//! color's absolute index against a fixed reference palette size, so a
//! candidate at a given rank gets the same color regardless of how many
//! candidates the election has.

use std::collections::BTreeMap;

/// Hand-picked colors for the first four ranks.
pub const INITIAL_COLORS: [&str; 4] = ["#d0ffce", "#cee1ff", "#ffcece", "#ffeab9"];

/// Reference size keeping saturation/value drift identical across palettes
/// of different lengths.
const MASTER_LIST_SIZE: f64 = 250.0;

const GOLDEN_ANGLE_INCREMENT: f64 = 137.5 / 360.0;

/// Generates `count` visually distinct hex colors. Purely a function of
/// `count`: no randomness, no clock.
pub fn golden_angle_palette(count: usize) -> Vec<String> {
    let mut colors: Vec<String> = INITIAL_COLORS.iter().map(|s| s.to_string()).collect();
    if count <= colors.len() {
        colors.truncate(count);
        return colors;
    }
    let start_index = colors.len();
    let (start_h, start_s, start_v) = hex_to_hsv(INITIAL_COLORS[INITIAL_COLORS.len() - 1]);
    for i in start_index..count {
        // The hue jump is relative to the end of the hand-picked colors so
        // the spiral continues from them.
        let hue_jump_index = (i - start_index) as f64;
        let hue = (start_h + (hue_jump_index + 1.0) * GOLDEN_ANGLE_INCREMENT).fract();
        let saturation = (start_s + (i as f64 / MASTER_LIST_SIZE) * 0.1).clamp(0.0, 1.0);
        let value = (start_v - (i as f64 / MASTER_LIST_SIZE) * 0.15).clamp(0.0, 1.0);
        colors.push(hsv_to_hex(hue, saturation, value));
    }
    colors
}

/// Maps an ordered candidate list to colors. The palette is generated with a
/// margin of five extra ranks so late additions never exhaust it.
pub fn candidate_colors(order: &[String]) -> BTreeMap<String, String> {
    let palette = golden_angle_palette(order.len() + 5);
    order
        .iter()
        .enumerate()
        .map(|(i, token)| (token.clone(), palette[i].clone()))
        .collect()
}

fn hex_to_hsv(hex: &str) -> (f64, f64, f64) {
    let channel = |range: std::ops::Range<usize>| -> f64 {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0) as f64
            / 255.0
    };
    rgb_to_hsv(channel(1..3), channel(3..5), channel(5..7))
}

fn hsv_to_hex(h: f64, s: f64, v: f64) -> String {
    let (r, g, b) = hsv_to_rgb(h, s, v);
    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8
    )
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    let delta = max - min;
    if delta == 0.0 {
        return (0.0, 0.0, v);
    }
    let s = delta / max;
    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    (h, s, v)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let h6 = (h.rem_euclid(1.0)) * 6.0;
    let i = h6.floor() as u32 % 6;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn palette_starts_with_the_hand_picked_colors() {
        let palette = golden_angle_palette(6);
        assert_eq!(&palette[..4], &INITIAL_COLORS);
        assert_eq!(palette.len(), 6);
    }

    #[test]
    fn short_requests_truncate() {
        assert_eq!(golden_angle_palette(2), vec!["#d0ffce", "#cee1ff"]);
    }

    #[test]
    fn palette_is_deterministic() {
        assert_eq!(golden_angle_palette(40), golden_angle_palette(40));
    }

    #[test]
    fn same_rank_gets_the_same_color_regardless_of_total() {
        let small = golden_angle_palette(10);
        let large = golden_angle_palette(30);
        assert_eq!(&small[..], &large[..10]);
    }

    #[test]
    fn colors_are_distinct_up_to_count_plus_margin() {
        let order: Vec<String> = (0..25).map(|i| format!("cand{}", i)).collect();
        let palette = golden_angle_palette(order.len() + 5);
        let distinct: HashSet<&String> = palette.iter().collect();
        assert_eq!(distinct.len(), palette.len());
    }

    #[test]
    fn candidate_colors_cover_every_candidate_uniquely() {
        let order: Vec<String> = vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()];
        let map = candidate_colors(&order);
        assert_eq!(map.len(), order.len());
        let distinct: HashSet<&String> = map.values().collect();
        assert_eq!(distinct.len(), order.len());
        assert_eq!(map["A"], INITIAL_COLORS[0]);
    }

    #[test]
    fn hsv_round_trip_is_stable() {
        let (h, s, v) = hex_to_hsv("#ffeab9");
        assert_eq!(hsv_to_hex(h, s, v), "#ffeab9");
    }
}
