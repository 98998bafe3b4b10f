use crate::error::TextCardError;
use crate::glyph_report::GlyphCoverageReport;
use crate::style::FontDescriptor;
use crate::system_font;
use crate::types::Px;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Measures the rendered width of a string in a given font.
///
/// Line breaking is only as deterministic as the measurer: the same
/// `(font, text)` must always produce the same width.
pub trait GlyphMeasurer: Send + Sync {
    fn measure(&self, font: &FontDescriptor, text: &str) -> Px;
}

/// Fixed-advance measurer: every char is `advance_em × font size` wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasurer {
    pub advance_em: f32,
}

impl MonospaceMeasurer {
    pub fn new(advance_em: f32) -> Self {
        Self { advance_em }
    }
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self { advance_em: 0.5 }
    }
}

impl GlyphMeasurer for MonospaceMeasurer {
    fn measure(&self, font: &FontDescriptor, text: &str) -> Px {
        (font.size * self.advance_em) * (text.chars().count() as i32)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Px>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Px> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Px) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            } else {
                break;
            }
        }
    }
}

/// Fonts loaded from disk or memory, addressable by family name.
///
/// A family that is not registered resolves to the fallback face when one
/// was set (see [`FontRegistry::register_system_fallback`]); with no fallback
/// it is measured with a fixed per-char estimate (0.6em, 1em for wide East
/// Asian chars) and not drawn.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    fallback: Option<usize>,
    bold_fallback: Option<usize>,
    shape_text: bool,
    text_width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    is_bold: bool,
}

/// A registered face chosen for a descriptor. `synthetic_bold` is set when a
/// bold descriptor could only be matched to a regular face.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedFont<'a> {
    pub(crate) font: &'a RegisteredFont,
    pub(crate) synthetic_bold: bool,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            fallback: None,
            bold_fallback: None,
            shape_text: true,
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn font_names(&self) -> Vec<&str> {
        self.fonts.iter().map(|font| font.name.as_str()).collect()
    }

    /// Name of the face used for unregistered families, if any.
    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback
            .and_then(|index| self.fonts.get(index))
            .map(|font| font.name.as_str())
    }

    /// Toggles rustybuzz shaping. Measurement and drawing both follow it.
    pub fn set_shaping(&mut self, enabled: bool) {
        if self.shape_text == enabled {
            return;
        }
        self.shape_text = enabled;
        self.text_width_cache_reset();
    }

    pub fn shapes_text(&self) -> bool {
        self.shape_text
    }

    /// Registers every `.ttf`/`.otf` file in `path`; unreadable entries are skipped.
    pub fn register_dir(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let Ok(entries) = fs::read_dir(path) else {
            return 0;
        };
        let mut paths: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        // Directory order is platform dependent; alias precedence must not be.
        paths.sort();
        let mut registered = 0;
        for path in paths {
            if self.register_file(&path).is_ok() {
                registered += 1;
            }
        }
        registered
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String, TextCardError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|v| v.to_str())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        if ext != "ttf" && ext != "otf" {
            return Err(TextCardError::Font(format!(
                "unsupported font file {}",
                path.display()
            )));
        }
        let data = fs::read(path)?;
        self.register_bytes(data, path.to_str())
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, TextCardError> {
        self.push_face(data, source_name).map(|(_, name)| name)
    }

    fn push_face(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<(usize, String), TextCardError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(TextCardError::Font(format!("invalid font data for {source}")));
        };

        let (name, aliases) = font_names(&face, Path::new(source));
        let is_bold = face.is_bold();
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            is_bold,
        });

        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        tracing::debug!(font = %name, source, "registered font");
        Ok((index, name))
    }

    /// Makes a registered family the face for every unregistered family.
    /// `bold` selects which slot it fills.
    pub fn set_fallback(&mut self, family: &str, bold: bool) -> Result<(), TextCardError> {
        let Some(index) = self.resolve_index(family) else {
            return Err(TextCardError::Font(format!("font '{family}' is not registered")));
        };
        if bold {
            self.bold_fallback = Some(index);
        } else {
            self.fallback = Some(index);
        }
        self.text_width_cache_reset();
        Ok(())
    }

    /// Loads a regular and, when installed, a bold face from the host's font
    /// folders and uses them for unregistered families. `preferred_family` is
    /// tried before the stock CJK and Latin faces. Returns the regular face's
    /// name, or `None` when no usable face is installed.
    pub fn register_system_fallback(&mut self, preferred_family: Option<&str>) -> Option<String> {
        let regular = system_font::find_face(preferred_family, false)?;
        let source = regular.path.to_string_lossy().into_owned();
        let (index, name) = match self.push_face(regular.data, Some(&source)) {
            Ok(registered) => registered,
            Err(err) => {
                tracing::debug!(error = %err, "system fallback rejected");
                return None;
            }
        };
        self.fallback = Some(index);

        if let Some(bold) = system_font::find_face(preferred_family, true) {
            let source = bold.path.to_string_lossy().into_owned();
            if let Ok((bold_index, _)) = self.push_face(bold.data, Some(&source)) {
                self.bold_fallback = bold.bold.then_some(bold_index);
            }
        }
        self.text_width_cache_reset();
        tracing::debug!(font = %name, bold = self.bold_fallback.is_some(), "system fallback loaded");
        Some(name)
    }

    fn text_width_cache_reset(&self) {
        if let Ok(mut cache) = self.text_width_cache.lock() {
            *cache = TextWidthCache::new(cache.max_entries);
        }
    }

    fn resolve_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(&normalize_name(name)).copied()
    }

    /// Picks a bold face for bold descriptors when one is registered, else the
    /// family's regular face, else the fallback faces.
    fn resolve_descriptor_index(&self, font: &FontDescriptor) -> Option<(usize, bool)> {
        let family = font.family.as_str();
        if font.bold {
            let candidates = [
                format!("{family} Bold"),
                format!("{family}-Bold"),
                format!("{family}Bold"),
                format!("{family} SemiBold"),
            ];
            for candidate in &candidates {
                if let Some(index) = self.resolve_index(candidate) {
                    return Some((index, false));
                }
            }
        }
        let index = match self.resolve_index(family) {
            Some(index) => index,
            None if font.bold => match self.bold_fallback {
                Some(index) => return Some((index, false)),
                None => self.fallback?,
            },
            None => self.fallback?,
        };
        let synthetic = font.bold && self.fonts.get(index).is_none_or(|f| !f.is_bold);
        Some((index, synthetic))
    }

    pub(crate) fn resolve(&self, font: &FontDescriptor) -> Option<ResolvedFont<'_>> {
        let (index, synthetic_bold) = self.resolve_descriptor_index(font)?;
        self.fonts.get(index).map(|font| ResolvedFont {
            font,
            synthetic_bold,
        })
    }

    /// Width of `text` as the rasterizer will lay it out: the pen advance of
    /// [`layout_glyphs`] over the resolved face.
    pub fn measure_text_width(&self, font: &FontDescriptor, text: &str) -> Px {
        let Some((index, _)) = self.resolve_descriptor_index(font) else {
            return estimate_text_width(font.size, text);
        };
        let Some(registered) = self.fonts.get(index) else {
            return estimate_text_width(font.size, text);
        };
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: font.size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let run = layout_glyphs(&registered.data, text, font.size.to_f32(), self.shape_text);
        let value = Px::from_f32(run.advance.max(0.0));
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }

    pub fn font_supports_char(&self, font: &FontDescriptor, ch: char) -> bool {
        let Some(resolved) = self.resolve(font) else {
            return false;
        };
        match ttf_parser::Face::parse(&resolved.font.data, 0) {
            Ok(face) => face.glyph_index(ch).is_some(),
            Err(_) => false,
        }
    }

    /// Records every non-ASCII char of `text` that the face resolved for
    /// `font` cannot draw. Nothing is reported when no face resolves.
    pub fn report_missing_glyphs(
        &self,
        font: &FontDescriptor,
        text: &str,
        report: &mut GlyphCoverageReport,
    ) {
        let Some(resolved) = self.resolve(font) else {
            return;
        };
        let Ok(face) = ttf_parser::Face::parse(&resolved.font.data, 0) else {
            return;
        };
        let mut support_cache: HashMap<char, bool> = HashMap::new();
        for ch in text.chars() {
            if ch.is_ascii() || ch.is_whitespace() {
                continue;
            }
            let supported = *support_cache
                .entry(ch)
                .or_insert_with(|| face.glyph_index(ch).is_some());
            if !supported {
                report.record_missing(ch, resolved.font.name.clone());
            }
        }
    }
}

impl GlyphMeasurer for FontRegistry {
    fn measure(&self, font: &FontDescriptor, text: &str) -> Px {
        self.measure_text_width(font, text)
    }
}

/// Width estimate used when no face resolves for a family.
pub(crate) fn estimate_text_width(font_size: Px, text: &str) -> Px {
    let mut tenths: i32 = 0;
    for ch in text.chars() {
        tenths = tenths.saturating_add(if is_wide_char(ch) { 10 } else { 6 });
    }
    font_size.mul_ratio(tenths, 10)
}

fn is_wide_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x20000..=0x3FFFD
    )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphPlacement {
    pub(crate) glyph_id: u16,
    pub(crate) offset_x: f32,
    pub(crate) offset_y: f32,
    pub(crate) scale: f32,
}

/// Glyphs positioned relative to the pen origin, plus the pen advance.
#[derive(Debug, Default)]
pub(crate) struct GlyphRun {
    pub(crate) placements: Vec<GlyphPlacement>,
    pub(crate) advance: f32,
}

/// Lays out `text` in the face `font_data` at `font_size`. Both width
/// measurement and drawing go through here, so a line never draws wider
/// than it measured.
pub(crate) fn layout_glyphs(font_data: &[u8], text: &str, font_size: f32, shape: bool) -> GlyphRun {
    if !shape {
        return layout_glyphs_unshaped(font_data, text, font_size);
    }
    let Some(face) = HbFace::from_slice(font_data, 0) else {
        return layout_glyphs_unshaped(font_data, text, font_size);
    };
    let scale = font_size / face.units_per_em().max(1) as f32;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.len() != positions.len() {
        return layout_glyphs_unshaped(font_data, text, font_size);
    }

    let mut run = GlyphRun {
        placements: Vec::with_capacity(infos.len()),
        advance: 0.0,
    };
    let mut pen_y = 0.0f32;
    for (info, pos) in infos.iter().zip(positions) {
        let glyph_id = info.glyph_id as u16;
        if glyph_id != 0 {
            run.placements.push(GlyphPlacement {
                glyph_id,
                offset_x: run.advance + pos.x_offset as f32 * scale,
                offset_y: pen_y + pos.y_offset as f32 * scale,
                scale,
            });
        }
        run.advance += pos.x_advance as f32 * scale;
        pen_y += pos.y_advance as f32 * scale;
    }
    run
}

fn layout_glyphs_unshaped(font_data: &[u8], text: &str, font_size: f32) -> GlyphRun {
    let Ok(face) = ttf_parser::Face::parse(font_data, 0) else {
        return GlyphRun::default();
    };
    let scale = font_size / face.units_per_em().max(1) as f32;
    let mut run = GlyphRun::default();
    for ch in text.chars() {
        let Some(glyph) = face.glyph_index(ch) else {
            run.advance += font_size * 0.5;
            continue;
        };
        run.placements.push(GlyphPlacement {
            glyph_id: glyph.0,
            offset_x: run.advance,
            offset_y: 0.0,
            scale,
        });
        let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        run.advance += if advance > 0.0 { advance } else { font_size * 0.5 };
    }
    run
}

pub(crate) fn detect_direction(text: &str) -> HbDirection {
    for ch in text.chars() {
        let rtl = matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        );
        if rtl {
            return HbDirection::RightToLeft;
        }
    }
    HbDirection::LeftToRight
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    // A bold face registers under its full name ("Family Bold"); only regular
    // faces claim the bare family name.
    let family = if face.is_bold() { None } else { family };
    let primary = full
        .clone()
        .or_else(|| post.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let mut aliases = Vec::new();
    for candidate in [family, post, stem].into_iter().flatten() {
        if candidate != primary {
            aliases.push(candidate);
        }
    }

    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(size: f32) -> FontDescriptor {
        FontDescriptor::new("Missing Family", Px::from_f32(size))
    }

    #[test]
    fn monospace_measurer_scales_with_char_count() {
        let measurer = MonospaceMeasurer::new(0.5);
        assert_eq!(measurer.measure(&font(20.0), "abcd"), Px::from_i32(40));
        assert_eq!(measurer.measure(&font(20.0), "字字"), Px::from_i32(20));
        assert_eq!(measurer.measure(&font(20.0), ""), Px::ZERO);
    }

    #[test]
    fn unregistered_family_uses_estimate() {
        let registry = FontRegistry::new();
        assert_eq!(
            registry.measure(&font(50.0), "Hello"),
            Px::from_i32(150)
        );
        assert_eq!(registry.measure(&font(50.0), "你好"), Px::from_i32(100));
        assert_eq!(
            registry.measure(&font(50.0).bold(true), "Hello"),
            registry.measure(&font(50.0), "Hello")
        );
    }

    #[test]
    fn register_bytes_rejects_garbage() {
        let mut registry = FontRegistry::new();
        let err = match registry.register_bytes(vec![0, 1, 2, 3], Some("broken.ttf")) {
            Ok(_) => panic!("garbage must not register"),
            Err(err) => err,
        };
        assert!(matches!(err, TextCardError::Font(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn register_file_rejects_unknown_extension() {
        let mut registry = FontRegistry::new();
        assert!(registry.register_file("notes.txt").is_err());
        assert_eq!(registry.register_dir("/definitely/not/a/font/dir"), 0);
    }

    #[test]
    fn width_cache_evicts_oldest_entry() {
        let mut cache = TextWidthCache::new(2);
        let key = |text: &str| TextWidthKey {
            font_index: 0,
            size_milli: 1000,
            text: text.to_string(),
        };
        cache.insert(key("a"), Px::from_i32(1));
        cache.insert(key("b"), Px::from_i32(2));
        cache.insert(key("c"), Px::from_i32(3));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.get(&key("c")), Some(Px::from_i32(3)));
    }

    /// A Latin-only face installed on the host, if any.
    fn latin_face() -> Option<Vec<u8>> {
        let names: Vec<&str> = system_font::LATIN_FACES.iter().map(|(regular, _)| *regular).collect();
        system_font::find_named(&names).map(|(_, data)| data)
    }

    #[test]
    fn registered_width_is_the_glyph_run_advance() {
        let Some(data) = latin_face() else {
            eprintln!("no Latin system font installed; skipping");
            return;
        };
        let mut registry = FontRegistry::new();
        let name = registry.register_bytes(data, None).unwrap();
        let descriptor = FontDescriptor::new(name, Px::from_i32(50));
        let face_data = registry.resolve(&descriptor).unwrap().font.data.clone();
        for shape in [true, false] {
            registry.set_shaping(shape);
            let run = layout_glyphs(&face_data, "WAVE Typo", 50.0, shape);
            assert_eq!(
                registry.measure(&descriptor, "WAVE Typo"),
                Px::from_f32(run.advance)
            );
        }
    }

    #[test]
    fn unregistered_family_measures_with_fallback_face() {
        let Some(data) = latin_face() else {
            eprintln!("no Latin system font installed; skipping");
            return;
        };
        let mut registry = FontRegistry::new();
        let name = registry.register_bytes(data, None).unwrap();
        registry.set_fallback(&name, false).unwrap();
        let registered = FontDescriptor::new(name.clone(), Px::from_i32(50));
        assert_eq!(registry.fallback_name(), Some(name.as_str()));
        assert_eq!(
            registry.measure(&font(50.0), "WWWW"),
            registry.measure(&registered, "WWWW")
        );
        assert_ne!(registry.measure(&font(50.0), "WWWW"), Px::from_i32(120));
        let bold = registry.resolve(&font(50.0).bold(true)).unwrap();
        assert_eq!(bold.font.name, name);
        assert!(bold.synthetic_bold);
        assert!(registry.set_fallback("Nope", false).is_err());
    }

    #[test]
    fn missing_glyphs_are_reported_for_registered_face() {
        let Some(data) = latin_face() else {
            eprintln!("no Latin system font installed; skipping");
            return;
        };
        let mut registry = FontRegistry::new();
        let name = registry.register_bytes(data, None).unwrap();
        let descriptor = FontDescriptor::new(name.clone(), Px::from_i32(20));
        let mut report = GlyphCoverageReport::default();
        registry.report_missing_glyphs(&descriptor, "你好你 abc é", &mut report);
        let missing = report.missing();
        assert_eq!(missing.len(), 2);
        assert_eq!((missing[0].ch, missing[0].count), ('你', 2));
        assert_eq!((missing[1].ch, missing[1].count), ('好', 1));
        assert_eq!(missing[0].fonts_tried, vec![name]);
        assert!(registry.font_supports_char(&descriptor, 'é'));
        assert!(!registry.font_supports_char(&descriptor, '好'));
    }

    #[test]
    fn missing_glyphs_are_not_reported_for_unregistered_fonts() {
        let registry = FontRegistry::new();
        let mut report = GlyphCoverageReport::default();
        registry.report_missing_glyphs(&font(50.0), "你好", &mut report);
        assert!(report.is_empty());
    }
}
