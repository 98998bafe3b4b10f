use crate::canvas::{Canvas, CardScene, Shadow, TextAlign, TextBaseline};
use crate::error::TextCardError;
use crate::font::FontRegistry;
use crate::metrics::{BatchMetrics, CardMetrics};
use crate::paginate::{ContentBox, Page};
use crate::perf::PerfLogger;
use crate::raster;
use crate::style::StyleConfig;
use crate::types::{Color, LinearShading, Px, Rect, Size};
use base64::Engine;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

/// Fixed card layout lengths, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardGeometry {
    pub base_width: Px,
    pub padding_top: Px,
    pub padding_bottom: Px,
    pub padding_side: Px,
    /// Inset of the panel from the surface edge when the gradient is drawn.
    pub panel_inset: Px,
    /// Extra gradient band between the inset and the panel.
    pub gradient_padding: Px,
    pub corner_radius: Px,
    pub shadow_blur: Px,
    pub shadow_offset_y: Px,
    pub shadow_opacity: f32,
    /// Baseline of the word-count label below the content box.
    pub footer_label_offset: Px,
    /// Baseline of the watermark below the content box.
    pub watermark_offset: Px,
}

impl Default for CardGeometry {
    fn default() -> Self {
        Self {
            base_width: Px::from_i32(1200),
            padding_top: Px::from_i32(200),
            padding_bottom: Px::from_i32(140),
            padding_side: Px::from_i32(60),
            panel_inset: Px::from_i32(20),
            gradient_padding: Px::from_i32(30),
            corner_radius: Px::from_i32(20),
            shadow_blur: Px::from_i32(10),
            shadow_offset_y: Px::from_i32(5),
            shadow_opacity: 0.1,
            footer_label_offset: Px::from_i32(60),
            watermark_offset: Px::from_i32(80),
        }
    }
}

impl CardGeometry {
    /// Every length multiplied by `factor`; opacity is unchanged.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            base_width: self.base_width * factor,
            padding_top: self.padding_top * factor,
            padding_bottom: self.padding_bottom * factor,
            padding_side: self.padding_side * factor,
            panel_inset: self.panel_inset * factor,
            gradient_padding: self.gradient_padding * factor,
            corner_radius: self.corner_radius * factor,
            shadow_blur: self.shadow_blur * factor,
            shadow_offset_y: self.shadow_offset_y * factor,
            shadow_opacity: self.shadow_opacity,
            footer_label_offset: self.footer_label_offset * factor,
            watermark_offset: self.watermark_offset * factor,
        }
    }

    pub fn canvas_size(&self, style: &StyleConfig) -> Size {
        Size {
            width: self.base_width,
            height: style.aspect_ratio.height_for(self.base_width),
        }
    }

    /// Distance between the surface edge and the panel.
    pub fn margin(&self, style: &StyleConfig) -> Px {
        if style.draws_gradient() {
            self.panel_inset + self.gradient_padding
        } else {
            Px::ZERO
        }
    }

    pub fn panel_rect(&self, style: &StyleConfig) -> Rect {
        let size = self.canvas_size(style);
        let margin = self.margin(style);
        Rect {
            x: margin,
            y: margin,
            width: size.width - margin * 2,
            height: size.height - margin * 2,
        }
    }

    pub fn content_box(&self, style: &StyleConfig) -> ContentBox {
        let panel = self.panel_rect(style);
        ContentBox::new(
            panel.width - self.padding_side * 2,
            panel.height - self.padding_top - self.padding_bottom,
        )
    }

    pub fn validate(&self, style: &StyleConfig) -> Result<(), TextCardError> {
        if self.base_width <= Px::ZERO {
            return Err(TextCardError::InvalidConfiguration(
                "base_width must be > 0".to_string(),
            ));
        }
        let content = self.content_box(style);
        if !content.is_valid() {
            return Err(TextCardError::InvalidConfiguration(format!(
                "content box {}x{} leaves no room for text at ratio {}",
                content.width.to_f32(),
                content.height.to_f32(),
                style.aspect_ratio
            )));
        }
        Ok(())
    }
}

/// Where the date stamp in the card header comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStamp {
    /// The local date at render time.
    #[default]
    Today,
    Fixed(NaiveDate),
    Hidden,
}

impl DateStamp {
    /// en-US long form, e.g. `October 17, 2026`.
    pub fn label(&self) -> Option<String> {
        let date = match self {
            DateStamp::Today => chrono::Local::now().date_naive(),
            DateStamp::Fixed(date) => *date,
            DateStamp::Hidden => return None,
        };
        Some(date.format("%B %-d, %Y").to_string())
    }
}

pub const DEFAULT_WATERMARK: &str = "© Generated by textcard";
pub const DEFAULT_WORD_COUNT_LABEL: &str = "words：";

const SECONDARY_TEXT_OPACITY: f32 = 128.0 / 255.0;
const WATERMARK_OPACITY: f32 = 64.0 / 255.0;

/// One rendered card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    /// Non-whitespace characters rendered on this card.
    pub word_count: usize,
    pub line_count: usize,
    pub metrics: CardMetrics,
}

impl Card {
    /// `text-card-{n}.png`, numbered from 1.
    pub fn file_name(&self) -> String {
        format!("text-card-{}.png", self.index + 1)
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    /// Lowercase hex SHA-256 of the PNG bytes.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.png);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn to_image(&self) -> Result<image::RgbaImage, TextCardError> {
        image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)
            .map(|img| img.to_rgba8())
            .map_err(|err| TextCardError::RenderFailure {
                page_index: self.index,
                message: format!("png decode failed: {err}"),
            })
    }
}

/// A page that could not be rendered. Other pages are unaffected.
#[derive(Debug)]
pub struct PageFailure {
    pub index: usize,
    pub error: TextCardError,
}

/// Result of rendering a text: the cards in page order plus accounting.
#[derive(Debug, Default)]
pub struct CardBatch {
    pub cards: Vec<Card>,
    pub failures: Vec<PageFailure>,
    /// Text left over after the last page. Non-empty only when split mode was
    /// off and the text did not fit one card.
    pub leftover: String,
    pub truncated: bool,
    pub metrics: BatchMetrics,
}

impl CardBatch {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && self.failures.is_empty()
    }

    pub fn total_word_count(&self) -> usize {
        self.cards.iter().map(|card| card.word_count).sum()
    }
}

/// Turns pages into card scenes and PNG cards.
#[derive(Clone)]
pub struct CardRenderer {
    geometry: CardGeometry,
    date_stamp: DateStamp,
    watermark: String,
    word_count_label: String,
    registry: Option<Arc<FontRegistry>>,
    perf: Option<PerfLogger>,
    #[cfg(test)]
    pub(crate) fail_page: Option<usize>,
}

impl CardRenderer {
    pub fn new(geometry: CardGeometry) -> Self {
        Self {
            geometry,
            date_stamp: DateStamp::Today,
            watermark: DEFAULT_WATERMARK.to_string(),
            word_count_label: DEFAULT_WORD_COUNT_LABEL.to_string(),
            registry: None,
            perf: None,
            #[cfg(test)]
            fail_page: None,
        }
    }

    pub fn with_date_stamp(mut self, date_stamp: DateStamp) -> Self {
        self.date_stamp = date_stamp;
        self
    }

    pub fn with_watermark(mut self, watermark: impl Into<String>) -> Self {
        self.watermark = watermark.into();
        self
    }

    pub fn with_word_count_label(mut self, label: impl Into<String>) -> Self {
        self.word_count_label = label.into();
        self
    }

    pub fn with_fonts(mut self, registry: Arc<FontRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub(crate) fn with_perf(mut self, perf: Option<PerfLogger>) -> Self {
        self.perf = perf;
        self
    }

    pub fn geometry(&self) -> &CardGeometry {
        &self.geometry
    }

    /// Records the drawing of `page` without rasterizing it.
    pub fn build_scene(&self, page: &Page, style: &StyleConfig) -> CardScene {
        let geometry = &self.geometry;
        let size = geometry.canvas_size(style);
        let margin = geometry.margin(style);
        let panel = geometry.panel_rect(style);
        let base = style.base_font();
        let mut canvas = Canvas::new(size);
        canvas.meta("card.index", page.index.to_string());

        if style.draws_gradient() {
            canvas.shading_fill(LinearShading::evenly_spaced(
                0.0,
                0.0,
                size.width.to_f32(),
                size.height.to_f32(),
                &style.gradient,
            ));
            canvas.save_state();
            canvas.set_shadow(Shadow {
                color: Color::BLACK,
                opacity: geometry.shadow_opacity,
                blur: geometry.shadow_blur,
                offset_x: Px::ZERO,
                offset_y: geometry.shadow_offset_y,
            });
            canvas.set_fill_color(style.background_color);
            canvas.rounded_rect(panel, geometry.corner_radius);
            canvas.fill();
            canvas.restore_state();
        } else {
            canvas.set_fill_color(style.background_color);
            canvas.draw_rect(Rect {
                x: Px::ZERO,
                y: Px::ZERO,
                width: size.width,
                height: size.height,
            });
        }

        let text_x = margin + geometry.padding_side;
        canvas.set_fill_color(style.text_color);

        if let Some(date) = self.date_stamp.label() {
            canvas.set_opacity(SECONDARY_TEXT_OPACITY);
            canvas.set_font(&base.scaled(7, 10));
            canvas.draw_string(
                text_x,
                margin + geometry.padding_top.mul_ratio(2, 5),
                date,
                TextAlign::Left,
                TextBaseline::Alphabetic,
            );
        }

        canvas.set_opacity(1.0);
        let mut y = margin + geometry.padding_top;
        for line in &page.lines {
            if !line.is_empty() {
                canvas.set_font(&line.font);
                canvas.draw_string(
                    text_x,
                    y,
                    line.text.as_str(),
                    TextAlign::Left,
                    TextBaseline::Top,
                );
            }
            y += line.height;
        }

        let footer_top = margin + panel.height - geometry.padding_bottom;
        canvas.set_opacity(SECONDARY_TEXT_OPACITY);
        canvas.set_font(&base.scaled(7, 10));
        canvas.draw_string(
            margin + panel.width - geometry.padding_side,
            footer_top + geometry.footer_label_offset,
            format!("{}{}", self.word_count_label, page.word_count()),
            TextAlign::Right,
            TextBaseline::Top,
        );

        if !self.watermark.is_empty() {
            canvas.set_opacity(WATERMARK_OPACITY);
            canvas.set_font(&base.scaled(1, 2));
            canvas.draw_string(
                size.width / 2,
                footer_top + geometry.watermark_offset,
                self.watermark.as_str(),
                TextAlign::Center,
                TextBaseline::Top,
            );
        }

        canvas.finish()
    }

    /// Renders one page. A surface that cannot be allocated or encoded is a
    /// `RenderFailure` for this page only.
    pub fn render(&self, page: &Page, style: &StyleConfig) -> Result<Card, TextCardError> {
        let start = Instant::now();
        let scene = self.build_scene(page, style);
        let scene_ms = start.elapsed().as_secs_f64() * 1000.0;

        #[cfg(test)]
        if self.fail_page == Some(page.index) {
            return Err(TextCardError::RenderFailure {
                page_index: page.index,
                message: "injected failure".to_string(),
            });
        }

        let raster_start = Instant::now();
        let (width, height) = scene
            .size
            .to_pixels()
            .map_err(|err| TextCardError::RenderFailure {
                page_index: page.index,
                message: err.to_string(),
            })?;
        let png = raster::scene_to_png(&scene, page.index, self.registry.as_deref())?;

        let word_count = page.word_count();
        let metrics = CardMetrics {
            index: page.index,
            scene_ms,
            raster_ms: raster_start.elapsed().as_secs_f64() * 1000.0,
            command_count: scene.command_count(),
            line_count: page.lines.len(),
            word_count,
            png_bytes: png.len(),
        };
        if let Some(perf) = self.perf.as_ref() {
            perf.record_card(&metrics);
        }
        tracing::debug!(
            card = page.index,
            width,
            height,
            bytes = png.len(),
            words = word_count,
            "rendered card"
        );
        Ok(Card {
            index: page.index,
            width,
            height,
            png,
            word_count,
            line_count: page.lines.len(),
            metrics,
        })
    }
}
