//! Greedy per-character line breaking with `#`/`##`/`###` heading detection.
//!
//! Packing is per `char` rather than per word: the input may be in a script
//! without word-delimiting whitespace, and a word wider than the card must
//! still be split somewhere.

use crate::font::GlyphMeasurer;
use crate::style::{FontDescriptor, HeadingLevel, StyleConfig};
use crate::types::Px;
use std::ops::Range;

/// How a source line was classified before measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutToken {
    Plain,
    Heading(HeadingLevel),
}

impl LayoutToken {
    pub fn classify(source_line: &str) -> LayoutToken {
        match HeadingLevel::detect(source_line) {
            Some(level) => LayoutToken::Heading(level),
            None => LayoutToken::Plain,
        }
    }

    pub fn heading(self) -> Option<HeadingLevel> {
        match self {
            LayoutToken::Plain => None,
            LayoutToken::Heading(level) => Some(level),
        }
    }

    pub fn font(self, base: &FontDescriptor) -> FontDescriptor {
        match self {
            LayoutToken::Plain => base.clone(),
            LayoutToken::Heading(level) => level.font(base),
        }
    }
}

/// What follows a line in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// Soft break inserted by the packer; nothing was consumed.
    Wrap,
    /// An author line break (`"\n"` or `"\r\n"`) was consumed.
    Hard(&'static str),
    EndOfText,
}

impl LineEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnd::Hard(brk) => brk,
            LineEnd::Wrap | LineEnd::EndOfText => "",
        }
    }
}

/// One width-bounded run of characters and the font it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub font: FontDescriptor,
    pub height: Px,
    pub heading: Option<HeadingLevel>,
    /// Heading marker stripped from the front of this line, if any.
    pub marker: &'static str,
    /// Byte range of the input consumed by this line, marker included,
    /// line break excluded.
    pub source: Range<usize>,
    pub end: LineEnd,
}

impl Line {
    /// Non-whitespace characters drawn for this line.
    pub fn word_count(&self) -> usize {
        self.text.chars().filter(|ch| !ch.is_whitespace()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub struct LineBreaker<'a> {
    measurer: &'a dyn GlyphMeasurer,
    style: &'a StyleConfig,
    base: FontDescriptor,
}

impl<'a> LineBreaker<'a> {
    pub fn new(measurer: &'a dyn GlyphMeasurer, style: &'a StyleConfig) -> Self {
        Self {
            measurer,
            style,
            base: style.base_font(),
        }
    }

    /// Wraps all of `text`. Returns the lines and the number of chars consumed.
    pub fn break_text(&self, text: &str, max_width: Px) -> (Vec<Line>, usize) {
        let mut iter = self.lines(text, max_width);
        let lines: Vec<Line> = iter.by_ref().collect();
        let consumed = text[..iter.position()].chars().count();
        (lines, consumed)
    }

    /// Lazily wraps `text`; the paginator stops pulling once a page is full.
    pub fn lines<'t>(&'t self, text: &'t str, max_width: Px) -> LineIter<'t> {
        LineIter {
            breaker: self,
            text,
            max_width,
            pos: 0,
            current: None,
        }
    }

    fn line_height(&self, font: &FontDescriptor) -> Px {
        self.style.line_height_for(font)
    }
}

/// State of the source line currently being packed.
#[derive(Debug)]
struct SourceLine {
    content_end: usize,
    brk: LineEnd,
    token: LayoutToken,
    font: FontDescriptor,
}

pub struct LineIter<'t> {
    breaker: &'t LineBreaker<'t>,
    text: &'t str,
    max_width: Px,
    pos: usize,
    current: Option<SourceLine>,
}

impl<'t> LineIter<'t> {
    /// Byte offset of the first input byte not yet consumed.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn open_source_line(&mut self) -> (SourceLine, &'static str) {
        let rest = &self.text[self.pos..];
        let (content_end, brk) = match rest.find('\n') {
            Some(nl) if nl > 0 && rest.as_bytes()[nl - 1] == b'\r' => {
                (self.pos + nl - 1, LineEnd::Hard("\r\n"))
            }
            Some(nl) => (self.pos + nl, LineEnd::Hard("\n")),
            None => (self.text.len(), LineEnd::EndOfText),
        };
        let token = LayoutToken::classify(&self.text[self.pos..content_end]);
        let marker = token.heading().map(HeadingLevel::marker).unwrap_or("");
        let font = token.font(&self.breaker.base);
        (
            SourceLine {
                content_end,
                brk,
                token,
                font,
            },
            marker,
        )
    }
}

impl<'t> Iterator for LineIter<'t> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.pos >= self.text.len() && self.current.is_none() {
            return None;
        }

        let mut marker = "";
        let start = self.pos;
        if self.current.is_none() {
            let (source_line, found) = self.open_source_line();
            marker = found;
            self.pos += marker.len();
            self.current = Some(source_line);
        }
        let Some(source_line) = self.current.as_ref() else {
            return None;
        };

        let content = &self.text[self.pos..source_line.content_end];
        let mut buffer = String::new();
        let mut buffered_chars = 0usize;
        let mut wrap_at = None;
        for (offset, ch) in content.char_indices() {
            buffer.push(ch);
            buffered_chars += 1;
            let width = self.breaker.measurer.measure(&source_line.font, &buffer);
            if width > self.max_width && buffered_chars > 1 {
                buffer.pop();
                wrap_at = Some(self.pos + offset);
                break;
            }
        }

        let font = source_line.font.clone();
        let heading = source_line.token.heading();
        let height = self.breaker.line_height(&font);
        let line = match wrap_at {
            Some(split) => {
                self.pos = split;
                Line {
                    text: buffer,
                    font,
                    height,
                    heading,
                    marker,
                    source: start..split,
                    end: LineEnd::Wrap,
                }
            }
            None => {
                let content_end = source_line.content_end;
                let end = source_line.brk;
                self.pos = content_end + end.as_str().len();
                self.current = None;
                Line {
                    text: buffer,
                    font,
                    height,
                    heading,
                    marker,
                    source: start..content_end,
                    end,
                }
            }
        };
        Some(line)
    }
}
