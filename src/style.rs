use crate::error::TextCardError;
use crate::types::{Color, Px};
use std::fmt;
use std::str::FromStr;

/// The font a run of text is measured and drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub family: String,
    pub size: Px,
    pub bold: bool,
}

impl FontDescriptor {
    pub fn new(family: impl Into<String>, size: Px) -> Self {
        Self {
            family: family.into(),
            size,
            bold: false,
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Same family and weight at `size × num / denom`.
    pub fn scaled(&self, num: i32, denom: i32) -> Self {
        Self {
            family: self.family.clone(),
            size: self.size.mul_ratio(num, denom),
            bold: self.bold,
        }
    }
}

/// Heading levels recognised by the `#`, `##` and `###` line prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub fn marker(self) -> &'static str {
        match self {
            HeadingLevel::H1 => "# ",
            HeadingLevel::H2 => "## ",
            HeadingLevel::H3 => "### ",
        }
    }

    /// Size multiplier as a ratio over 10 (1.6, 1.4, 1.2).
    pub fn scale_tenths(self) -> i32 {
        match self {
            HeadingLevel::H1 => 16,
            HeadingLevel::H2 => 14,
            HeadingLevel::H3 => 12,
        }
    }

    /// Detects a heading prefix at the start of a source line.
    pub fn detect(line: &str) -> Option<HeadingLevel> {
        [HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3]
            .into_iter()
            .find(|level| line.starts_with(level.marker()))
    }

    /// The bold, scaled font a heading of this level uses.
    pub fn font(self, base: &FontDescriptor) -> FontDescriptor {
        base.scaled(self.scale_tenths(), 10).bold(true)
    }
}

/// How much vertical space a wrapped line reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineHeightMode {
    /// Each line reserves `own font size × line spacing`; headings get taller rows.
    #[default]
    PerLine,
    /// Every line reserves `base font size × line spacing`, whatever its font.
    Uniform,
}

/// Card aspect ratio as a `width:height` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const PORTRAIT_3_4: AspectRatio = AspectRatio::new(3, 4);
    pub const LANDSCAPE_4_3: AspectRatio = AspectRatio::new(4, 3);
    pub const WIDE_16_9: AspectRatio = AspectRatio::new(16, 9);
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);
    pub const TALL_9_16: AspectRatio = AspectRatio::new(9, 16);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both terms are positive and fit an `i32`.
    pub fn is_valid(self) -> bool {
        self.terms().is_some()
    }

    fn terms(self) -> Option<(i32, i32)> {
        let width = i32::try_from(self.width).ok().filter(|w| *w > 0)?;
        let height = i32::try_from(self.height).ok().filter(|h| *h > 0)?;
        Some((width, height))
    }

    /// Height of a surface `width` units wide at this ratio; zero for an
    /// invalid ratio.
    pub fn height_for(self, width: Px) -> Px {
        let Some((ratio_width, ratio_height)) = self.terms() else {
            return Px::ZERO;
        };
        let height = width.mul_ratio(ratio_height, ratio_width);
        Px::from_i32((height.to_milli_i64() as f64 / 1000.0).round() as i32)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = TextCardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid =
            || TextCardError::InvalidConfiguration(format!("invalid aspect ratio '{raw}'"));
        let (w, h) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        let ratio = AspectRatio::new(width, height);
        if !ratio.is_valid() {
            return Err(invalid());
        }
        Ok(ratio)
    }
}

/// One immutable snapshot of the card styling. Edits return a new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub font_family: String,
    pub font_size: Px,
    pub text_color: Color,
    pub background_color: Color,
    pub gradient: Vec<Color>,
    pub use_gradient_panel: bool,
    pub aspect_ratio: AspectRatio,
    pub line_spacing: f32,
    pub line_height_mode: LineHeightMode,
}

impl Default for StyleConfig {
    fn default() -> Self {
        let simple = &crate::template::PRESET_TEMPLATES[0];
        let aurora = &crate::template::GRADIENT_BASES[0];
        Self {
            font_family: simple.font.to_string(),
            font_size: Px::from_f32(simple.font_size),
            text_color: simple.text_color,
            background_color: simple.background_color,
            gradient: aurora.colors.to_vec(),
            use_gradient_panel: true,
            aspect_ratio: AspectRatio::PORTRAIT_3_4,
            line_spacing: 2.0,
            line_height_mode: LineHeightMode::PerLine,
        }
    }
}

impl StyleConfig {
    pub fn base_font(&self) -> FontDescriptor {
        FontDescriptor::new(self.font_family.clone(), self.font_size)
    }

    /// Row height reserved by a line drawn in `font`.
    pub fn line_height_for(&self, font: &FontDescriptor) -> Px {
        let size = match self.line_height_mode {
            LineHeightMode::PerLine => font.size,
            LineHeightMode::Uniform => self.font_size,
        };
        size * self.line_spacing
    }

    /// The gradient panel is drawn only when enabled and there is at least one stop.
    pub fn draws_gradient(&self) -> bool {
        self.use_gradient_panel && !self.gradient.is_empty()
    }

    pub fn validate(&self) -> Result<(), TextCardError> {
        if self.font_size <= Px::ZERO {
            return Err(TextCardError::InvalidConfiguration(
                "font_size must be > 0".to_string(),
            ));
        }
        if !self.line_spacing.is_finite() || self.line_spacing <= 0.0 {
            return Err(TextCardError::InvalidConfiguration(
                "line_spacing must be > 0".to_string(),
            ));
        }
        if !self.aspect_ratio.is_valid() {
            return Err(TextCardError::InvalidConfiguration(format!(
                "aspect ratio {} must have positive terms no larger than {}",
                self.aspect_ratio,
                i32::MAX
            )));
        }
        if self.font_family.trim().is_empty() {
            return Err(TextCardError::InvalidConfiguration(
                "font_family must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Px::from_f32(size);
        self
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = color;
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_gradient(mut self, colors: Vec<Color>) -> Self {
        self.gradient = colors;
        self
    }

    pub fn with_gradient_panel(mut self, enabled: bool) -> Self {
        self.use_gradient_panel = enabled;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn with_line_spacing(mut self, spacing: f32) -> Self {
        self.line_spacing = spacing;
        self
    }

    pub fn with_line_height_mode(mut self, mode: LineHeightMode) -> Self {
        self.line_height_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_detection_requires_marker_and_space() {
        assert_eq!(HeadingLevel::detect("# Title"), Some(HeadingLevel::H1));
        assert_eq!(HeadingLevel::detect("## Title"), Some(HeadingLevel::H2));
        assert_eq!(HeadingLevel::detect("### Title"), Some(HeadingLevel::H3));
        assert_eq!(HeadingLevel::detect("#### Title"), None);
        assert_eq!(HeadingLevel::detect("#Title"), None);
        assert_eq!(HeadingLevel::detect(" # Title"), None);
        assert_eq!(HeadingLevel::detect("# "), Some(HeadingLevel::H1));
    }

    #[test]
    fn heading_font_is_bold_and_scaled() {
        let base = FontDescriptor::new("Source Han Sans CN", Px::from_i32(50));
        let h1 = HeadingLevel::H1.font(&base);
        assert!(h1.bold);
        assert_eq!(h1.size, Px::from_i32(80));
        assert_eq!(HeadingLevel::H2.font(&base).size, Px::from_i32(70));
        assert_eq!(HeadingLevel::H3.font(&base).size, Px::from_i32(60));
    }

    #[test]
    fn aspect_ratio_parses_and_sizes_surface() {
        let ratio: AspectRatio = "3:4".parse().unwrap();
        assert_eq!(ratio, AspectRatio::PORTRAIT_3_4);
        assert_eq!(ratio.height_for(Px::from_i32(1200)), Px::from_i32(1600));
        assert_eq!(
            AspectRatio::WIDE_16_9.height_for(Px::from_i32(1200)),
            Px::from_i32(675)
        );
        assert_eq!(
            AspectRatio::TALL_9_16.height_for(Px::from_i32(1200)),
            Px::from_i32(2133)
        );
        assert!("0:4".parse::<AspectRatio>().is_err());
        assert!("3x4".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn aspect_ratio_terms_beyond_i32_are_rejected() {
        assert!("3000000000:1".parse::<AspectRatio>().is_err());
        assert!("1:2147483648".parse::<AspectRatio>().is_err());
        assert!("2147483647:1".parse::<AspectRatio>().is_ok());

        let huge = AspectRatio::new(3_000_000_000, 1);
        assert!(!huge.is_valid());
        assert_eq!(huge.height_for(Px::from_i32(1200)), Px::ZERO);
        assert!(
            StyleConfig::default()
                .with_aspect_ratio(huge)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn line_height_follows_mode() {
        let style = StyleConfig::default();
        let base = style.base_font();
        let heading = HeadingLevel::H1.font(&base);
        assert_eq!(style.line_height_for(&base), Px::from_i32(100));
        assert_eq!(style.line_height_for(&heading), Px::from_i32(160));

        let uniform = style.with_line_height_mode(LineHeightMode::Uniform);
        assert_eq!(uniform.line_height_for(&heading), Px::from_i32(100));
    }

    #[test]
    fn validate_rejects_degenerate_styles() {
        assert!(StyleConfig::default().validate().is_ok());
        assert!(StyleConfig::default().with_font_size(0.0).validate().is_err());
        assert!(StyleConfig::default().with_line_spacing(0.0).validate().is_err());
        assert!(
            StyleConfig::default()
                .with_aspect_ratio(AspectRatio::new(0, 1))
                .validate()
                .is_err()
        );
        assert!(StyleConfig::default().with_font_family("  ").validate().is_err());
    }

    #[test]
    fn gradient_requires_stops_and_flag() {
        let style = StyleConfig::default();
        assert!(style.draws_gradient());
        assert!(!style.clone().with_gradient(Vec::new()).draws_gradient());
        assert!(!style.with_gradient_panel(false).draws_gradient());
    }
}
