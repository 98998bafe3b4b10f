mod canvas;
mod card;
mod error;
mod font;
mod glyph_report;
mod line_break;
mod metrics;
mod paginate;
mod perf;
mod raster;
mod style;
mod system_font;
mod template;
mod types;

pub use canvas::{Canvas, CardScene, Command, Shadow, TextAlign, TextBaseline};
pub use card::{
    Card, CardBatch, CardGeometry, CardRenderer, DEFAULT_WATERMARK, DEFAULT_WORD_COUNT_LABEL,
    DateStamp, PageFailure,
};
pub use error::TextCardError;
pub use font::{FontRegistry, GlyphMeasurer, MonospaceMeasurer};
pub use glyph_report::{GlyphCoverageReport, MissingGlyph};
pub use line_break::{LayoutToken, Line, LineBreaker, LineEnd, LineIter};
pub use metrics::{BatchMetrics, CardMetrics};
pub use paginate::{ContentBox, Page, paginate, reassemble};
use perf::PerfLogger;
pub use style::{AspectRatio, FontDescriptor, HeadingLevel, LineHeightMode, StyleConfig};
pub use template::{
    ASPECT_RATIOS, FONT_CHOICES, FontChoice, GRADIENT_BASES, GradientBase, MAX_FONT_SIZE,
    MIN_FONT_SIZE, PRESET_TEMPLATES, StyleTemplate, clamp_font_size,
};
pub use types::{Color, LinearShading, Px, Rect, ShadingStop, Size};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Text-to-card engine: lays text out into pages and renders each page as a
/// PNG card.
///
/// Layout and rendering are pure functions of `(text, StyleConfig, engine
/// configuration)`. Rendering the same input twice with a fixed
/// [`DateStamp`] yields byte-identical PNGs.
pub struct TextCard {
    font_registry: Arc<FontRegistry>,
    geometry: CardGeometry,
    renderer: CardRenderer,
    parallel: bool,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct TextCardBuilder {
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, Option<String>)>,
    geometry: CardGeometry,
    date_stamp: DateStamp,
    watermark: String,
    word_count_label: String,
    parallel: bool,
    shape_text: bool,
    system_fallback: bool,
    fallback_family: Option<String>,
    perf_path: Option<PathBuf>,
}

impl TextCard {
    pub fn builder() -> TextCardBuilder {
        TextCardBuilder::new()
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.font_registry
    }

    pub fn geometry(&self) -> &CardGeometry {
        &self.geometry
    }

    pub fn renderer(&self) -> &CardRenderer {
        &self.renderer
    }

    pub fn canvas_size(&self, style: &StyleConfig) -> Size {
        self.geometry.canvas_size(style)
    }

    pub fn content_box(&self, style: &StyleConfig) -> ContentBox {
        self.geometry.content_box(style)
    }

    /// Lays `text` out into pages. See [`paginate`] for the split-mode policy.
    pub fn layout(
        &self,
        text: &str,
        style: &StyleConfig,
        split_mode: bool,
    ) -> Result<Vec<Page>, TextCardError> {
        style.validate()?;
        self.geometry.validate(style)?;
        let start = Instant::now();
        let pages = paginate(
            self.font_registry.as_ref(),
            text,
            style,
            self.geometry.content_box(style),
            split_mode,
        );
        if let Some(perf) = self.perf.as_ref() {
            perf.record_layout(start.elapsed().as_secs_f64() * 1000.0, pages.len());
        }
        Ok(pages)
    }

    pub fn render(&self, page: &Page, style: &StyleConfig) -> Result<Card, TextCardError> {
        self.renderer.render(page, style)
    }

    /// Lays out and renders `text`.
    ///
    /// With `split_mode` off, text that does not fit the first card is
    /// dropped: it is returned in `CardBatch::leftover` with `truncated` set,
    /// and no error is raised. A page that fails to render is recorded in
    /// `CardBatch::failures` and the remaining cards are still produced.
    /// Empty text gives an empty batch.
    pub fn generate(
        &self,
        text: &str,
        style: &StyleConfig,
        split_mode: bool,
    ) -> Result<CardBatch, TextCardError> {
        let layout_start = Instant::now();
        let pages = self.layout(text, style, split_mode)?;
        let layout_ms = layout_start.elapsed().as_secs_f64() * 1000.0;

        let results: Vec<(usize, Result<Card, TextCardError>)> = if self.parallel {
            use rayon::prelude::*;
            pages
                .par_iter()
                .map(|page| (page.index, self.renderer.render(page, style)))
                .collect()
        } else {
            pages
                .iter()
                .map(|page| (page.index, self.renderer.render(page, style)))
                .collect()
        };

        let mut batch = CardBatch {
            leftover: pages
                .last()
                .map(|page| page.leftover.clone())
                .unwrap_or_default(),
            ..CardBatch::default()
        };
        batch.metrics.layout_ms = layout_ms;
        batch.metrics.page_count = pages.len();
        for (index, result) in results {
            match result {
                Ok(card) => {
                    batch.metrics.push(card.metrics.clone());
                    batch.cards.push(card);
                }
                Err(error) => {
                    tracing::warn!(card = index, %error, "card render failed");
                    if let Some(perf) = self.perf.as_ref() {
                        perf.record_failure(index, &error.to_string());
                    }
                    batch.failures.push(PageFailure { index, error });
                }
            }
        }

        batch.metrics.failed_pages = batch.failures.len();
        batch.truncated = !split_mode && !batch.leftover.is_empty();
        if batch.truncated {
            tracing::warn!(
                leftover_chars = batch.leftover.chars().count(),
                "text does not fit one card; remainder dropped"
            );
        }

        if let Some(perf) = self.perf.as_ref() {
            perf.record_batch(&batch.metrics);
        }
        Ok(batch)
    }

    /// Characters of `text` the style's font cannot draw, checking heading
    /// lines against the bold face they are drawn with.
    pub fn glyph_coverage(&self, text: &str, style: &StyleConfig) -> GlyphCoverageReport {
        let mut report = GlyphCoverageReport::default();
        let base = style.base_font();
        for source_line in text.lines() {
            let token = LayoutToken::classify(source_line);
            let body = token
                .heading()
                .map(|level| &source_line[level.marker().len()..])
                .unwrap_or(source_line);
            self.font_registry
                .report_missing_glyphs(&token.font(&base), body, &mut report);
        }
        report
    }
}

impl Default for TextCardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCardBuilder {
    pub fn new() -> Self {
        Self {
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            geometry: CardGeometry::default(),
            date_stamp: DateStamp::Today,
            watermark: DEFAULT_WATERMARK.to_string(),
            word_count_label: DEFAULT_WORD_COUNT_LABEL.to_string(),
            parallel: true,
            shape_text: true,
            system_fallback: true,
            fallback_family: None,
            perf_path: None,
        }
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>, name: Option<&str>) -> Self {
        self.font_bytes.push((data, name.map(str::to_string)));
        self
    }

    pub fn geometry(mut self, geometry: CardGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Card width; the height follows from each style's aspect ratio.
    pub fn base_width(mut self, width: f32) -> Self {
        self.geometry.base_width = Px::from_f32(width);
        self
    }

    pub fn date_stamp(mut self, date_stamp: DateStamp) -> Self {
        self.date_stamp = date_stamp;
        self
    }

    /// Footer watermark text; an empty string hides it.
    pub fn watermark_text(mut self, text: impl Into<String>) -> Self {
        self.watermark = text.into();
        self
    }

    pub fn word_count_label(mut self, label: impl Into<String>) -> Self {
        self.word_count_label = label.into();
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn shape_text(mut self, enabled: bool) -> Self {
        self.shape_text = enabled;
        self
    }

    /// Loads an installed system face for families that were not
    /// registered. On by default; without it such text is measured with a
    /// per-char estimate and not drawn.
    pub fn system_fallback(mut self, enabled: bool) -> Self {
        self.system_fallback = enabled;
        self
    }

    /// Family to look for first when loading the system fallback.
    pub fn fallback_family(mut self, family: impl Into<String>) -> Self {
        self.fallback_family = Some(family.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<TextCard, TextCardError> {
        if self.geometry.base_width <= Px::ZERO {
            return Err(TextCardError::InvalidConfiguration(
                "base_width must be > 0".to_string(),
            ));
        }
        let mut registry = FontRegistry::new();
        registry.set_shaping(self.shape_text);
        for dir in &self.font_dirs {
            let count = registry.register_dir(dir);
            tracing::debug!(dir = %dir.display(), count, "registered font dir");
        }
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, name) in self.font_bytes {
            registry.register_bytes(data, name.as_deref())?;
        }
        if self.system_fallback {
            match registry.register_system_fallback(self.fallback_family.as_deref()) {
                Some(name) => tracing::debug!(font = %name, "using system fallback font"),
                None => tracing::warn!("no system font found; unregistered families will not be drawn"),
            }
        }
        let perf = match self.perf_path {
            Some(path) => Some(PerfLogger::create(path)?),
            None => None,
        };
        let font_registry = Arc::new(registry);
        let renderer = CardRenderer::new(self.geometry)
            .with_date_stamp(self.date_stamp)
            .with_watermark(self.watermark)
            .with_word_count_label(self.word_count_label)
            .with_fonts(font_registry.clone())
            .with_perf(perf.clone());
        Ok(TextCard {
            font_registry,
            geometry: self.geometry,
            renderer,
            parallel: self.parallel,
            perf,
        })
    }
}
