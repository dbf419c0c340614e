use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Couleur RGBA 8 bits, sérialisée en hexadécimal (`#rrggbb` ou `#rrggbbaa`).
///
/// # Example
/// ```
/// use gg_core::color::Rgba;
/// let c = Rgba::from_hex("#ff8000").unwrap();
/// assert_eq!(c, Rgba::new(255, 128, 0, 255));
/// assert_eq!(c.to_hex(), "#ff8000");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 255 = opaque.
    pub a: u8,
}

impl Rgba {
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Build a colour from its four channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] when the string is not a valid hex colour.
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || CoreError::config(format!("couleur invalide : {hex:?}"));
        if !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                let r = channel(&digits[0..1])?;
                let g = channel(&digits[1..2])?;
                let b = channel(&digits[2..3])?;
                Ok(Self::new(r * 17, g * 17, b * 17, 255))
            }
            6 | 8 => {
                let r = channel(&digits[0..2])?;
                let g = channel(&digits[2..4])?;
                let b = channel(&digits[4..6])?;
                let a = if digits.len() == 8 {
                    channel(&digits[6..8])?
                } else {
                    255
                };
                Ok(Self::new(r, g, b, a))
            }
            _ => Err(invalid()),
        }
    }

    /// Hex form; alpha is omitted when opaque.
    #[must_use]
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Luminance perceptuelle BT.709, sur [0, 255].
    #[inline(always)]
    #[must_use]
    pub fn luminance(self) -> u8 {
        luminance(self.r, self.g, self.b)
    }

    /// Channel-wise product, used to tint a glyph with a source colour.
    #[inline]
    #[must_use]
    pub fn modulate(self, other: Self) -> Self {
        let mul = |a: u8, b: u8| ((u16::from(a) * u16::from(b) + 127) / 255) as u8;
        Self::new(
            mul(self.r, other.r),
            mul(self.g, other.g),
            mul(self.b, other.b),
            mul(self.a, other.a),
        )
    }

    /// Scale the RGB channels by `factor` in [0, 1], alpha untouched.
    #[inline]
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        let f = factor.clamp(0.0, 1.0);
        Self::new(
            (f32::from(self.r) * f) as u8,
            (f32::from(self.g) * f) as u8,
            (f32::from(self.b) * f) as u8,
            self.a,
        )
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgba {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_hex()
    }
}

/// Luminance perceptuelle BT.709 d'un triplet RGB.
///
/// # Example
/// ```
/// use gg_core::color::luminance;
/// assert_eq!(luminance(255, 255, 255), 255);
/// assert_eq!(luminance(0, 0, 0), 0);
/// ```
#[inline(always)]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 2126 + u32::from(g) * 7152 + u32::from(b) * 722) / 10000) as u8
}

/// Linear blend `a → b` with coverage `t` in [0, 255].
#[inline(always)]
#[must_use]
pub fn blend(a: Rgba, b: Rgba, t: u8) -> Rgba {
    let t = u16::from(t);
    let inv = 255 - t;
    let mix = |x: u8, y: u8| ((u16::from(x) * inv + u16::from(y) * t + 127) / 255) as u8;
    Rgba::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}
