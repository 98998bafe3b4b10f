//! Named style presets: background/text color templates, gradient bases,
//! aspect ratios and the font families offered to users.

use crate::style::{AspectRatio, StyleConfig};
use crate::types::{Color, Px};

pub const MIN_FONT_SIZE: f32 = 18.0;
pub const MAX_FONT_SIZE: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleTemplate {
    pub name: &'static str,
    pub background_color: Color,
    pub text_color: Color,
    pub font: &'static str,
    pub font_size: f32,
}

impl StyleTemplate {
    pub fn by_name(name: &str) -> Option<&'static StyleTemplate> {
        PRESET_TEMPLATES
            .iter()
            .find(|template| template.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Replaces colors, font and size; gradient, ratio and spacing are kept.
    pub fn apply(&self, style: &StyleConfig) -> StyleConfig {
        StyleConfig {
            font_family: self.font.to_string(),
            font_size: Px::from_f32(self.font_size),
            text_color: self.text_color,
            background_color: self.background_color,
            ..style.clone()
        }
    }
}

const fn template(
    name: &'static str,
    background_color: Color,
    text_color: Color,
) -> StyleTemplate {
    StyleTemplate {
        name,
        background_color,
        text_color,
        font: "Source Han Sans CN",
        font_size: 50.0,
    }
}

pub const PRESET_TEMPLATES: [StyleTemplate; 8] = [
    template(
        "Simple",
        Color::rgb8(0xF0, 0xF4, 0xF8),
        Color::rgb8(0x2C, 0x3E, 0x50),
    ),
    template(
        "Elegant beige",
        Color::rgb8(0xF5, 0xE6, 0xD3),
        Color::rgb8(0x5D, 0x40, 0x37),
    ),
    template(
        "Mint Fresh",
        Color::rgb8(0xE0, 0xF2, 0xF1),
        Color::rgb8(0x00, 0x4D, 0x40),
    ),
    template(
        "Deep Black",
        Color::rgb8(0x1E, 0x1E, 0x1E),
        Color::rgb8(0xFF, 0xFF, 0xFF),
    ),
    template(
        "Simple White",
        Color::rgb8(0xFF, 0xFF, 0xFF),
        Color::rgb8(0x33, 0x33, 0x33),
    ),
    template(
        "Warm colors",
        Color::rgb8(0xFF, 0xF5, 0xE6),
        Color::rgb8(0x5D, 0x40, 0x37),
    ),
    template(
        "Fresh green",
        Color::rgb8(0xE8, 0xF5, 0xE9),
        Color::rgb8(0x1B, 0x5E, 0x20),
    ),
    template(
        "Elegant Gray",
        Color::rgb8(0xFA, 0xFA, 0xFA),
        Color::rgb8(0x37, 0x47, 0x4F),
    ),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientBase {
    pub name: &'static str,
    pub colors: &'static [Color],
}

impl GradientBase {
    pub fn by_name(name: &str) -> Option<&'static GradientBase> {
        GRADIENT_BASES
            .iter()
            .find(|base| base.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Installs the stops and turns the panel on, or off for an empty base.
    pub fn apply(&self, style: &StyleConfig) -> StyleConfig {
        StyleConfig {
            gradient: self.colors.to_vec(),
            use_gradient_panel: !self.colors.is_empty(),
            ..style.clone()
        }
    }
}

pub const GRADIENT_BASES: [GradientBase; 9] = [
    GradientBase {
        name: "Aurora",
        colors: &[Color::rgb8(0x4F, 0xAC, 0xFE), Color::rgb8(0x00, 0xF2, 0xFE)],
    },
    GradientBase {
        name: "Sunset",
        colors: &[Color::rgb8(0xFA, 0x70, 0x9A), Color::rgb8(0xFE, 0xE1, 0x40)],
    },
    GradientBase {
        name: "Lavender",
        colors: &[
            Color::rgb8(0x7F, 0x7F, 0xD5),
            Color::rgb8(0x86, 0xA8, 0xE7),
            Color::rgb8(0x91, 0xEA, 0xE4),
        ],
    },
    GradientBase {
        name: "Flame",
        colors: &[Color::rgb8(0xFF, 0x9A, 0x9E), Color::rgb8(0xFA, 0xD0, 0xC4)],
    },
    GradientBase {
        name: "Forest",
        colors: &[Color::rgb8(0x43, 0xE9, 0x7B), Color::rgb8(0x38, 0xF9, 0xD7)],
    },
    GradientBase {
        name: "Deep blue",
        colors: &[
            Color::rgb8(0x0F, 0x20, 0x27),
            Color::rgb8(0x20, 0x3A, 0x43),
            Color::rgb8(0x2C, 0x53, 0x64),
        ],
    },
    GradientBase {
        name: "Dark Night Purple",
        colors: &[
            Color::rgb8(0x23, 0x15, 0x57),
            Color::rgb8(0x44, 0x10, 0x7A),
            Color::rgb8(0xFF, 0x13, 0x61),
        ],
    },
    GradientBase {
        name: "Starry Black",
        colors: &[Color::rgb8(0x00, 0x00, 0x00), Color::rgb8(0x13, 0x0F, 0x40)],
    },
    GradientBase {
        name: "No Base",
        colors: &[],
    },
];

pub const ASPECT_RATIOS: [(&str, AspectRatio); 5] = [
    ("3:4", AspectRatio::PORTRAIT_3_4),
    ("4:3", AspectRatio::LANDSCAPE_4_3),
    ("16:9", AspectRatio::WIDE_16_9),
    ("1:1", AspectRatio::SQUARE),
    ("9:16", AspectRatio::TALL_9_16),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontChoice {
    pub family: &'static str,
    pub label: &'static str,
}

pub const FONT_CHOICES: [FontChoice; 13] = [
    FontChoice { family: "Source Han Sans CN", label: "思源黑体" },
    FontChoice { family: "Noto Sans SC", label: "思源宋体" },
    FontChoice { family: "PingFang SC", label: "苹方" },
    FontChoice { family: "Hiragino Sans GB", label: "冬青黑体" },
    FontChoice { family: "Microsoft YaHei", label: "微软雅黑" },
    FontChoice { family: "FZLTHJW", label: "方正兰亭黑" },
    FontChoice { family: "FZLTXHJW", label: "方正兰亭细黑" },
    FontChoice { family: "HYQiHei", label: "汉仪旗黑" },
    FontChoice { family: "DouyinMeihaoTi", label: "抖音美好体" },
    FontChoice { family: "MaokenZhuyuanTi", label: "猫啃珠圆体" },
    FontChoice { family: "YunfengFeiyunTi", label: "云峰飞云体" },
    FontChoice { family: "XimaiXihuanTi", label: "喜脉喜欢体" },
    FontChoice { family: "Slidexiaxing-Regular", label: "Slide下行体" },
];

/// Clamps a requested size into the range offered by the size slider.
pub fn clamp_font_size(size: f32) -> f32 {
    if !size.is_finite() {
        return PRESET_TEMPLATES[0].font_size;
    }
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_lookup_ignores_case() {
        let template = StyleTemplate::by_name("deep black").unwrap();
        assert_eq!(template.background_color.to_hex(), "#1E1E1E");
        assert_eq!(template.text_color.to_hex(), "#FFFFFF");
        assert!(StyleTemplate::by_name("Neon").is_none());
    }

    #[test]
    fn applying_template_keeps_layout_fields() {
        let base = StyleConfig::default()
            .with_aspect_ratio(AspectRatio::WIDE_16_9)
            .with_font_size(30.0);
        let styled = StyleTemplate::by_name("Mint Fresh").unwrap().apply(&base);
        assert_eq!(styled.font_size, Px::from_i32(50));
        assert_eq!(styled.background_color.to_hex(), "#E0F2F1");
        assert_eq!(styled.aspect_ratio, AspectRatio::WIDE_16_9);
        assert_eq!(styled.gradient, base.gradient);
    }

    #[test]
    fn no_base_gradient_disables_panel() {
        let style = StyleConfig::default();
        let plain = GradientBase::by_name("No Base").unwrap().apply(&style);
        assert!(!plain.use_gradient_panel);
        assert!(plain.gradient.is_empty());

        let lavender = GradientBase::by_name("lavender").unwrap().apply(&plain);
        assert!(lavender.use_gradient_panel);
        assert_eq!(lavender.gradient.len(), 3);
    }

    #[test]
    fn font_size_is_clamped_to_slider_range() {
        assert_eq!(clamp_font_size(10.0), MIN_FONT_SIZE);
        assert_eq!(clamp_font_size(100.0), MAX_FONT_SIZE);
        assert_eq!(clamp_font_size(40.0), 40.0);
        assert_eq!(clamp_font_size(f32::NAN), 50.0);
    }

    #[test]
    fn aspect_ratio_labels_round_trip() {
        for (label, ratio) in ASPECT_RATIOS {
            assert_eq!(ratio.to_string(), label);
        }
    }
}
