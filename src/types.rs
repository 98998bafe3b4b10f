use crate::error::TextCardError;
use fixed::types::I32F32;

/// Layout unit. One unit is one pixel of the output card.
///
/// Backed by a 32.32 fixed-point value and rounded to thousandths on every
/// arithmetic step so that sums of line heights compare exactly across runs.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Px(I32F32);

impl Px {
    pub const ZERO: Px = Px(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Px {
        if !value.is_finite() {
            return Px::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Px::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Px {
        Px::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Px) -> Px {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Px) -> Px {
        if self <= other { self } else { other }
    }

    /// Multiplies by `num / denom` in milli space, rounding half away from zero.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Px {
        if denom == 0 {
            return Px::ZERO;
        }
        let milli = self.to_milli_i64() as i128;
        let value = div_round_i128(milli.saturating_mul(num as i128), denom as i128);
        Px::from_milli_i128(value)
    }

    pub fn from_milli_i64(milli: i64) -> Px {
        Px::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Px {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Px(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Px {
    type Output = Px;
    fn add(self, rhs: Px) -> Px {
        Px::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Px {
    fn add_assign(&mut self, rhs: Px) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Px {
    type Output = Px;
    fn sub(self, rhs: Px) -> Px {
        Px::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Mul<i32> for Px {
    type Output = Px;
    fn mul(self, rhs: i32) -> Px {
        let milli = self.to_milli_i64() as i128;
        Px::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Mul<f32> for Px {
    type Output = Px;
    fn mul(self, rhs: f32) -> Px {
        if !rhs.is_finite() {
            return Px::ZERO;
        }
        Px::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<i32> for Px {
    type Output = Px;
    fn div(self, rhs: i32) -> Px {
        if rhs == 0 {
            Px::ZERO
        } else {
            let milli = self.to_milli_i64() as i128;
            Px::from_milli_i128(div_round_i128(milli, rhs as i128))
        }
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

impl std::ops::Neg for Px {
    type Output = Px;
    fn neg(self) -> Px {
        Px::from_milli_i128(-(self.to_milli_i64() as i128))
    }
}

impl std::iter::Sum for Px {
    fn sum<I: Iterator<Item = Px>>(iter: I) -> Px {
        iter.fold(Px::ZERO, |acc, v| acc + v)
    }
}

impl<'a> std::iter::Sum<&'a Px> for Px {
    fn sum<I: Iterator<Item = &'a Px>>(iter: I) -> Px {
        iter.fold(Px::ZERO, |acc, v| acc + *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Px,
    pub height: Px,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Px::from_f32(width),
            height: Px::from_f32(height),
        }
    }

    /// Pixel dimensions, rounded to the nearest whole pixel.
    pub fn to_pixels(self) -> Result<(u32, u32), TextCardError> {
        Ok((px_to_u32(self.width)?, px_to_u32(self.height)?))
    }
}

fn px_to_u32(value: Px) -> Result<u32, TextCardError> {
    let px = div_round_i128(value.to_milli_i64() as i128, 1000);
    if px <= 0 {
        return Err(TextCardError::InvalidConfiguration(format!(
            "invalid non-positive pixel dimension {px}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        TextCardError::InvalidConfiguration(format!("pixel dimension out of range: {px}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Px,
    pub y: Px,
    pub width: Px,
    pub height: Px,
}

impl Rect {
    pub fn right(&self) -> Px {
        self.x + self.width
    }

    pub fn bottom(&self) -> Px {
        self.y + self.height
    }
}

/// An sRGB color with components in `0.0..=1.0`. Opacity travels separately
/// on the drawing state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parses `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(raw: &str) -> Result<Self, TextCardError> {
        let hex = raw.trim().trim_start_matches('#');
        let invalid = || TextCardError::InvalidConfiguration(format!("invalid color '{raw}'"));
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |idx: usize| -> Result<u8, TextCardError> {
                    let digit = channel(&hex[idx..idx + 1])?;
                    Ok(digit * 17)
                };
                Ok(Color::rgb8(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Color::rgb8(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{r:02X}{g:02X}{b:02X}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingStop {
    pub offset: f32, // 0..=1
    pub color: Color,
}

/// Axial (linear) shading from `(x0,y0)` to `(x1,y1)` in surface space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearShading {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub stops: Vec<ShadingStop>,
}

impl LinearShading {
    /// Spreads `colors` evenly over `0..=1`; a single color yields one stop.
    pub fn evenly_spaced(x0: f32, y0: f32, x1: f32, y1: f32, colors: &[Color]) -> Self {
        let last = colors.len().saturating_sub(1);
        let stops = colors
            .iter()
            .enumerate()
            .map(|(idx, color)| ShadingStop {
                offset: if last == 0 {
                    0.0
                } else {
                    idx as f32 / last as f32
                },
                color: *color,
            })
            .collect();
        Self {
            x0,
            y0,
            x1,
            y1,
            stops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_sums_are_exact_in_milli_space() {
        let line = Px::from_f32(100.0) * 0.7;
        let total: Px = (0..10).map(|_| line).sum();
        assert_eq!(total.to_milli_i64(), 700_000);
        assert_eq!(Px::from_i32(7) / 2, Px::from_f32(3.5));
    }

    #[test]
    fn px_mul_ratio_rounds_half_away_from_zero() {
        assert_eq!(Px::from_i32(50).mul_ratio(8, 5).to_milli_i64(), 80_000);
        assert_eq!(Px::from_milli_i64(1).mul_ratio(1, 2).to_milli_i64(), 1);
        assert_eq!(Px::from_milli_i64(-1).mul_ratio(1, 2).to_milli_i64(), -1);
        assert_eq!(Px::from_i32(3).mul_ratio(1, 0), Px::ZERO);
    }

    #[test]
    fn size_to_pixels_rejects_empty_dimensions() {
        assert_eq!(Size::new(1200.0, 1600.4).to_pixels().unwrap(), (1200, 1600));
        let err = match Size::new(0.0, 10.0).to_pixels() {
            Ok(_) => panic!("zero width must be rejected"),
            Err(err) => err,
        };
        assert!(matches!(err, TextCardError::InvalidConfiguration(_)));
    }

    #[test]
    fn color_from_hex_accepts_short_and_long_forms() {
        assert_eq!(Color::from_hex("#F0F4F8").unwrap().to_rgb8(), [0xF0, 0xF4, 0xF8]);
        assert_eq!(Color::from_hex("fff").unwrap().to_rgb8(), [255, 255, 255]);
        assert_eq!(Color::from_hex("#2c3e50").unwrap().to_hex(), "#2C3E50");
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#GGGGGG").is_err());
        assert!(Color::from_hex("#ééé").is_err());
    }

    #[test]
    fn evenly_spaced_stops_cover_unit_interval() {
        let colors = [Color::BLACK, Color::WHITE, Color::BLACK];
        let shading = LinearShading::evenly_spaced(0.0, 0.0, 10.0, 10.0, &colors);
        let offsets: Vec<f32> = shading.stops.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.5, 1.0]);

        let single = LinearShading::evenly_spaced(0.0, 0.0, 10.0, 10.0, &[Color::WHITE]);
        assert_eq!(single.stops.len(), 1);
        assert_eq!(single.stops[0].offset, 0.0);
    }
}
