use std::collections::BTreeMap;

/// Characters of a text that the selected font cannot draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphCoverageReport {
    missing: BTreeMap<u32, MissingGlyph>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissingGlyph {
    pub codepoint: u32,
    pub ch: char,
    pub fonts_tried: Vec<String>,
    pub count: usize,
}

impl GlyphCoverageReport {
    pub fn record_missing(&mut self, ch: char, font: impl Into<String>) {
        let codepoint = ch as u32;
        let font = font.into();
        let entry = self.missing.entry(codepoint).or_insert(MissingGlyph {
            codepoint,
            ch,
            fonts_tried: Vec::new(),
            count: 0,
        });
        if !entry.fonts_tried.contains(&font) {
            entry.fonts_tried.push(font);
        }
        entry.count = entry.count.saturating_add(1);
    }

    pub fn merge(&mut self, other: GlyphCoverageReport) {
        for (codepoint, missing) in other.missing {
            let entry = self.missing.entry(codepoint).or_insert(MissingGlyph {
                codepoint,
                ch: missing.ch,
                fonts_tried: Vec::new(),
                count: 0,
            });
            for font in missing.fonts_tried {
                if !entry.fonts_tried.contains(&font) {
                    entry.fonts_tried.push(font);
                }
            }
            entry.count = entry.count.saturating_add(missing.count);
        }
    }

    /// Missing glyphs ordered by codepoint.
    pub fn missing(&self) -> Vec<MissingGlyph> {
        self.missing.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn total_occurrences(&self) -> usize {
        self.missing.values().map(|m| m.count).sum()
    }
}
