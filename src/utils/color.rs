//! Hex color parsing and WCAG contrast checks for foreground/background pairs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque sRGB color parsed from `#rgb` or `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: HexColor = HexColor { r: 0, g: 0, b: 0 };
    pub const WHITE: HexColor = HexColor {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    /// Relative luminance per WCAG 2.x.
    pub fn relative_luminance(self) -> f64 {
        fn to_linear(v: u8) -> f64 {
            let srgb = f64::from(v) / 255.0;
            if srgb <= 0.04045 {
                srgb / 12.92
            } else {
                ((srgb + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * to_linear(self.r) + 0.7152 * to_linear(self.g) + 0.0722 * to_linear(self.b)
    }
}

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().trim_start_matches('#');
        if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("invalid color {:?}: not hexadecimal", s);
        }
        let full: String = match cleaned.len() {
            3 => cleaned.chars().flat_map(|c| [c, c]).collect(),
            6 => cleaned.to_string(),
            _ => anyhow::bail!("invalid color {:?}: expected #rgb or #rrggbb", s),
        };
        let num = u32::from_str_radix(&full, 16)
            .map_err(|_| anyhow::anyhow!("invalid color {:?}: not hexadecimal", s))?;
        Ok(HexColor {
            r: ((num >> 16) & 0xff) as u8,
            g: ((num >> 8) & 0xff) as u8,
            b: (num & 0xff) as u8,
        })
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Contrast ratio between two colors, in `[1.0, 21.0]`.
pub fn contrast_ratio(a: HexColor, b: HexColor) -> f64 {
    let l1 = a.relative_luminance();
    let l2 = b.relative_luminance();
    let (lighter, darker) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (lighter + 0.05) / (darker + 0.05)
}

pub fn is_contrast_sufficient(fg: HexColor, bg: HexColor, threshold: f64) -> bool {
    contrast_ratio(fg, bg) >= threshold
}
