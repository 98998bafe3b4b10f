use crate::font::GlyphMeasurer;
use crate::line_break::{Line, LineBreaker};
use crate::style::StyleConfig;
use crate::types::Px;

/// The area of a card that body lines are laid into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBox {
    pub width: Px,
    pub height: Px,
}

impl ContentBox {
    pub fn new(width: Px, height: Px) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > Px::ZERO && self.height > Px::ZERO
    }
}

/// One card's worth of wrapped lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub lines: Vec<Line>,
    /// Exact unconsumed suffix of the input after this page.
    pub leftover: String,
}

impl Page {
    pub fn word_count(&self) -> usize {
        self.lines.iter().map(Line::word_count).sum()
    }

    /// Sum of the line heights reserved on this page.
    pub fn used_height(&self) -> Px {
        self.lines.iter().map(|line| line.height).sum()
    }

    pub fn has_leftover(&self) -> bool {
        !self.leftover.is_empty()
    }
}

/// Lays `text` out into pages of at most `content_box.height`.
///
/// With `split_mode` off only the first page is produced and whatever did not
/// fit stays in its `leftover`; nothing else signals the truncation. A page's
/// first line is always placed, so a line taller than the box still makes
/// progress. `Line::source` ranges are byte offsets into `text`.
///
/// Each page is broken afresh from its leftover, so heading detection runs at
/// the start of every page. A soft-wrapped continuation that happens to begin
/// with `# `, `## ` or `### ` at the top of a page becomes a heading there,
/// even though the same bytes were mid-line in the source.
pub fn paginate(
    measurer: &dyn GlyphMeasurer,
    text: &str,
    style: &StyleConfig,
    content_box: ContentBox,
    split_mode: bool,
) -> Vec<Page> {
    let breaker = LineBreaker::new(measurer, style);
    let mut pages = Vec::new();
    let mut offset = 0usize;

    while offset < text.len() {
        let remaining = &text[offset..];
        let mut lines: Vec<Line> = Vec::new();
        let mut used = Px::ZERO;
        let mut next_start = text.len();

        for mut line in breaker.lines(remaining, content_box.width) {
            if !lines.is_empty() && used + line.height > content_box.height {
                next_start = offset + line.source.start;
                break;
            }
            used += line.height;
            line.source = (line.source.start + offset)..(line.source.end + offset);
            lines.push(line);
        }

        let index = pages.len();
        tracing::debug!(
            page = index,
            lines = lines.len(),
            used_height = used.to_f32(),
            leftover_bytes = text.len() - next_start,
            "sealed page"
        );
        pages.push(Page {
            index,
            lines,
            leftover: text[next_start..].to_string(),
        });

        if !split_mode {
            break;
        }
        offset = next_start;
    }

    pages
}

/// Rebuilds the source text from pages laid out in split mode.
pub fn reassemble(pages: &[Page]) -> String {
    let mut out = String::new();
    for line in pages.iter().flat_map(|page| page.lines.iter()) {
        out.push_str(line.marker);
        out.push_str(&line.text);
        out.push_str(line.end.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::MonospaceMeasurer;
    use crate::style::{HeadingLevel, LineHeightMode};

    // 5 units per char, 20 units per line.
    fn style() -> StyleConfig {
        StyleConfig::default()
            .with_font_size(10.0)
            .with_line_spacing(2.0)
    }

    fn content_box(width: i32, height: i32) -> ContentBox {
        ContentBox::new(Px::from_i32(width), Px::from_i32(height))
    }

    fn long_text(chars: usize) -> String {
        let words = ["lorem", "ipsum", "dolor", "sit", "amet", "卡片", "文字"];
        let mut out = String::new();
        let mut i = 0usize;
        while out.chars().count() < chars {
            out.push_str(words[i % words.len()]);
            out.push(if i % 17 == 16 { '\n' } else { ' ' });
            if i % 53 == 52 {
                out.push_str("## ");
            }
            i += 1;
        }
        out.chars().take(chars).collect()
    }

    #[test]
    fn fitting_text_is_one_page_without_leftover() {
        let measurer = MonospaceMeasurer::default();
        let pages = paginate(&measurer, "Hello World", &style(), content_box(500, 500), true);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].lines.len(), 1);
        assert_eq!(pages[0].lines[0].text, "Hello World");
        assert_eq!(pages[0].leftover, "");
    }

    #[test]
    fn heading_then_body() {
        let measurer = MonospaceMeasurer::default();
        let pages = paginate(
            &measurer,
            "# Title\nBody text",
            &style(),
            content_box(500, 500),
            true,
        );
        let lines = &pages[0].lines;
        assert_eq!(lines[0].text, "Title");
        assert_eq!(lines[0].heading, Some(HeadingLevel::H1));
        assert!(lines[0].font.bold);
        assert_eq!(lines[0].font.size, Px::from_i32(16));
        assert_eq!(lines[1].text, "Body text");
        assert_eq!(lines[1].font.size, Px::from_i32(10));
    }

    #[test]
    fn long_text_splits_into_bounded_lossless_pages() {
        let measurer = MonospaceMeasurer::default();
        let text = long_text(10_000);
        assert_eq!(text.chars().count(), 10_000);
        let boxed = content_box(200, 400);
        let pages = paginate(&measurer, &text, &style(), boxed, true);
        assert!(pages.len() >= 3, "got {} pages", pages.len());
        for (idx, page) in pages.iter().enumerate() {
            assert_eq!(page.index, idx);
            assert!(!page.lines.is_empty());
            assert!(page.used_height() <= boxed.height);
        }
        assert_eq!(reassemble(&pages), text);
        assert!(pages.last().unwrap().leftover.is_empty());
        for pair in pages.windows(2) {
            let next_start = pair[1].lines[0].source.start;
            assert_eq!(pair[0].leftover, &text[next_start..]);
        }
    }

    #[test]
    fn split_mode_off_truncates_to_one_page() {
        let measurer = MonospaceMeasurer::default();
        let text = long_text(10_000);
        let pages = paginate(&measurer, &text, &style(), content_box(200, 400), false);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].has_leftover());
        let consumed = pages[0].lines.last().unwrap().source.end;
        let leftover_start = text.len() - pages[0].leftover.len();
        assert!(text.ends_with(pages[0].leftover.as_str()));
        assert!(leftover_start == consumed || leftover_start == consumed + 1);
    }

    #[test]
    fn oversized_char_still_makes_a_page() {
        let measurer = MonospaceMeasurer::default();
        let pages = paginate(&measurer, "W", &style(), content_box(1, 1), true);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].lines.len(), 1);
        assert_eq!(pages[0].lines[0].text, "W");
        assert!(pages[0].leftover.is_empty());
    }

    #[test]
    fn oversized_chars_each_get_a_page_when_box_is_too_short() {
        let measurer = MonospaceMeasurer::default();
        let pages = paginate(&measurer, "WXY", &style(), content_box(1, 1), true);
        let texts: Vec<&str> = pages.iter().map(|p| p.lines[0].text.as_str()).collect();
        assert_eq!(texts, vec!["W", "X", "Y"]);
        assert_eq!(pages[0].leftover, "XY");
    }

    #[test]
    fn wrapped_marker_at_top_of_page_becomes_heading() {
        let measurer = MonospaceMeasurer::default();
        // 4 chars per line, 2 lines per page.
        let text = "abcdefgh# xy";
        let pages = paginate(&measurer, text, &style(), content_box(20, 40), true);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].leftover, "# xy");
        let first = &pages[1].lines[0];
        assert_eq!(first.heading, Some(HeadingLevel::H1));
        assert_eq!(first.text, "xy");
        assert!(first.font.bold);
        assert_eq!(reassemble(&pages), text);
    }

    #[test]
    fn empty_input_yields_no_pages() {
        let measurer = MonospaceMeasurer::default();
        assert!(paginate(&measurer, "", &style(), content_box(100, 100), true).is_empty());
        assert!(paginate(&measurer, "", &style(), content_box(100, 100), false).is_empty());
    }

    #[test]
    fn leftover_starts_mid_line_at_first_unplaced_char() {
        let measurer = MonospaceMeasurer::default();
        // 4 chars per line, 2 lines per page.
        let pages = paginate(&measurer, "abcdefghijkl", &style(), content_box(20, 40), false);
        assert_eq!(pages[0].lines.len(), 2);
        assert_eq!(pages[0].leftover, "ijkl");
    }

    #[test]
    fn heading_split_across_pages_restarts_as_heading() {
        let measurer = MonospaceMeasurer::default();
        let text = "aaaa\n# Title";
        // Only the first line fits; the heading moves whole to page 2.
        let pages = paginate(&measurer, text, &style(), content_box(100, 30), true);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].leftover, "# Title");
        assert_eq!(pages[1].lines[0].heading, Some(HeadingLevel::H1));
        assert_eq!(pages[1].lines[0].source, 5..12);
        assert_eq!(reassemble(&pages), text);
    }

    #[test]
    fn per_line_heights_reserve_heading_space() {
        let measurer = MonospaceMeasurer::default();
        let text = "# T\nb\nc";
        // H1 line is 32 tall; with 60 available the third line does not fit.
        let pages = paginate(&measurer, text, &style(), content_box(100, 60), true);
        assert_eq!(pages[0].lines.len(), 2);
        assert_eq!(pages[0].used_height(), Px::from_i32(52));

        let uniform = style().with_line_height_mode(LineHeightMode::Uniform);
        let pages = paginate(&measurer, text, &uniform, content_box(100, 60), true);
        assert_eq!(pages[0].lines.len(), 3);
        assert_eq!(pages[0].used_height(), Px::from_i32(60));
    }

    #[test]
    fn pagination_is_deterministic() {
        let measurer = MonospaceMeasurer::default();
        let text = long_text(3_000);
        let a = paginate(&measurer, &text, &style(), content_box(130, 170), true);
        let b = paginate(&measurer, &text, &style(), content_box(130, 170), true);
        assert_eq!(a, b);
    }

    #[test]
    fn reassembly_holds_across_box_shapes() {
        let measurer = MonospaceMeasurer::default();
        let text = format!("### head\r\n\n{}\n# end", long_text(1_200));
        for (width, height) in [(20, 20), (35, 75), (120, 64), (300, 1000)] {
            let pages = paginate(&measurer, &text, &style(), content_box(width, height), true);
            assert_eq!(reassemble(&pages), text, "box {width}x{height}");
            for page in &pages {
                assert!(page.lines.len() == 1 || page.used_height() <= Px::from_i32(height));
            }
        }
    }

    #[test]
    fn word_count_counts_rendered_non_whitespace() {
        let measurer = MonospaceMeasurer::default();
        let pages = paginate(&measurer, "## Hi there\n你好 ", &style(), content_box(500, 500), true);
        assert_eq!(pages[0].word_count(), 9);
    }
}
