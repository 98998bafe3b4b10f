/// Accounting for one rendered card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardMetrics {
    pub index: usize,
    /// Time spent recording the drawing commands.
    pub scene_ms: f64,
    /// Time spent rasterizing and PNG-encoding the scene.
    pub raster_ms: f64,
    pub command_count: usize,
    pub line_count: usize,
    pub word_count: usize,
    pub png_bytes: usize,
}

impl CardMetrics {
    pub fn render_ms(&self) -> f64 {
        self.scene_ms + self.raster_ms
    }
}

/// Accounting for one `generate` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchMetrics {
    pub cards: Vec<CardMetrics>,
    pub layout_ms: f64,
    pub page_count: usize,
    pub failed_pages: usize,
    pub total_render_ms: f64,
    pub total_bytes: usize,
}

impl BatchMetrics {
    pub fn push(&mut self, card: CardMetrics) {
        self.total_render_ms += card.render_ms();
        self.total_bytes = self.total_bytes.saturating_add(card.png_bytes);
        self.cards.push(card);
    }

    pub fn total_words(&self) -> usize {
        self.cards.iter().map(|card| card.word_count).sum()
    }

    /// The card that took longest to render; the earliest wins ties.
    pub fn slowest(&self) -> Option<&CardMetrics> {
        self.cards.iter().fold(None, |slowest: Option<&CardMetrics>, card| match slowest {
            Some(best) if best.render_ms() >= card.render_ms() => Some(best),
            _ => Some(card),
        })
    }
}
