use plotters::style::{Palette, Palette99, RGBColor};

/// Stops of the inferno colormap, dark to bright.
const INFERNO: [RGBColor; 9] = [
    RGBColor(0, 0, 4),
    RGBColor(31, 12, 72),
    RGBColor(85, 15, 109),
    RGBColor(136, 34, 106),
    RGBColor(186, 54, 85),
    RGBColor(227, 89, 51),
    RGBColor(249, 140, 10),
    RGBColor(249, 201, 50),
    RGBColor(252, 255, 164),
];

pub const MISSED: RGBColor = RGBColor(224, 224, 224);
pub const MET: RGBColor = RGBColor(46, 139, 87);
pub const NOTABLE: RGBColor = RGBColor(255, 215, 0);

/// Colour for `value` on a `0..=max` scale. Values above `max` are clamped.
pub fn heat(value: u32, max: u32) -> RGBColor {
    if max == 0 {
        return INFERNO[0];
    }
    let t = value.min(max) as f64 / max as f64;
    let scaled = t * (INFERNO.len() - 1) as f64;
    let low = scaled.floor() as usize;
    let high = (low + 1).min(INFERNO.len() - 1);
    lerp(INFERNO[low], INFERNO[high], scaled - low as f64)
}

/// Two tone palette for met or missed maps.
pub fn binary(value: u32) -> RGBColor {
    if value == 0 {
        MISSED
    } else {
        MET
    }
}

/// Qualitative colour for a category index. `0` is reserved for missed days.
pub fn category(index: u32) -> RGBColor {
    if index == 0 {
        return MISSED;
    }
    let (r, g, b) = Palette99::COLORS[(index as usize - 1) % Palette99::COLORS.len()];
    RGBColor(r, g, b)
}

fn lerp(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}
