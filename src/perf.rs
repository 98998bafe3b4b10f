//! Timing log for card generation.
//!
//! Every event is one JSON object per line in the log file. When the last
//! handle is dropped a `<stem>.summary.json` file is written with per-stage
//! totals and the slowest card.

use crate::metrics::{BatchMetrics, CardMetrics};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Pipeline stages that are timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Paginate,
    Scene,
    Raster,
}

impl Stage {
    const ALL: [Stage; 3] = [Stage::Paginate, Stage::Scene, Stage::Raster];

    fn name(self) -> &'static str {
        match self {
            Stage::Paginate => "paginate",
            Stage::Scene => "scene",
            Stage::Raster => "raster",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct StageTotal {
    ms: f64,
    calls: u64,
}

#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfLog>>,
}

struct PerfLog {
    out: BufWriter<File>,
    summary_path: PathBuf,
    stages: [StageTotal; 3],
    cards: u64,
    failures: u64,
    bytes: u64,
    slowest: Option<(usize, f64)>,
}

impl PerfLog {
    fn add(&mut self, stage: Stage, ms: f64) {
        let total = &mut self.stages[stage.slot()];
        total.ms += ms;
        total.calls = total.calls.saturating_add(1);
    }

    fn line(&mut self, json: &str) {
        if let Err(err) = writeln!(self.out, "{json}") {
            tracing::debug!(error = %err, "perf log write failed");
        }
    }

    fn summary(&self) -> String {
        let stages: Vec<String> = Stage::ALL
            .iter()
            .map(|stage| {
                let total = self.stages[stage.slot()];
                format!(
                    "\"{}\":{{\"ms\":{:.3},\"calls\":{}}}",
                    stage.name(),
                    total.ms,
                    total.calls
                )
            })
            .collect();
        let slowest = match self.slowest {
            Some((index, ms)) => format!("{{\"index\":{index},\"ms\":{ms:.3}}}"),
            None => "null".to_string(),
        };
        format!(
            "{{\"stages\":{{{}}},\"cards\":{},\"failures\":{},\"bytes\":{},\"slowest_card\":{}}}",
            stages.join(","),
            self.cards,
            self.failures,
            self.bytes,
            slowest
        )
    }
}

impl PerfLogger {
    pub(crate) fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfLog {
                out: BufWriter::new(file),
                summary_path: summary_path_for(path),
                stages: [StageTotal::default(); 3],
                cards: 0,
                failures: 0,
                bytes: 0,
                slowest: None,
            })),
        })
    }

    fn with_log(&self, f: impl FnOnce(&mut PerfLog)) {
        if let Ok(mut log) = self.inner.lock() {
            f(&mut *log);
        }
    }

    pub(crate) fn record_layout(&self, ms: f64, pages: usize) {
        self.with_log(|log| {
            log.add(Stage::Paginate, ms);
            log.line(&format!(
                "{{\"event\":\"layout\",\"ms\":{ms:.3},\"pages\":{pages}}}"
            ));
        });
    }

    pub(crate) fn record_card(&self, card: &CardMetrics) {
        self.with_log(|log| {
            log.add(Stage::Scene, card.scene_ms);
            log.add(Stage::Raster, card.raster_ms);
            log.cards = log.cards.saturating_add(1);
            log.bytes = log.bytes.saturating_add(card.png_bytes as u64);
            if log.slowest.is_none_or(|(_, ms)| card.render_ms() > ms) {
                log.slowest = Some((card.index, card.render_ms()));
            }
            log.line(&format!(
                "{{\"event\":\"card\",\"index\":{},\"scene_ms\":{:.3},\"raster_ms\":{:.3},\"commands\":{},\"lines\":{},\"words\":{},\"bytes\":{}}}",
                card.index,
                card.scene_ms,
                card.raster_ms,
                card.command_count,
                card.line_count,
                card.word_count,
                card.png_bytes
            ));
        });
    }

    pub(crate) fn record_failure(&self, index: usize, message: &str) {
        self.with_log(|log| {
            log.failures = log.failures.saturating_add(1);
            log.line(&format!(
                "{{\"event\":\"failure\",\"index\":{index},\"message\":\"{}\"}}",
                json_escape(message)
            ));
        });
    }

    /// Writes the batch totals and flushes the log.
    pub(crate) fn record_batch(&self, batch: &BatchMetrics) {
        self.with_log(|log| {
            log.line(&format!(
                "{{\"event\":\"batch\",\"pages\":{},\"cards\":{},\"failed\":{},\"layout_ms\":{:.3},\"render_ms\":{:.3},\"words\":{},\"bytes\":{}}}",
                batch.page_count,
                batch.cards.len(),
                batch.failed_pages,
                batch.layout_ms,
                batch.total_render_ms,
                batch.total_words(),
                batch.total_bytes
            ));
            if let Err(err) = log.out.flush() {
                tracing::debug!(error = %err, "perf log flush failed");
            }
        });
    }
}

impl Drop for PerfLog {
    fn drop(&mut self) {
        let _ = self.out.flush();
        if let Err(err) = std::fs::write(&self.summary_path, self.summary() + "\n") {
            tracing::debug!(error = %err, path = %self.summary_path.display(), "perf summary not written");
        }
    }
}

/// `run.log` -> `run.summary.json`, `perf` -> `perf.summary.json`.
fn summary_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("textcard_perf");
    path.with_file_name(format!("{stem}.summary.json"))
}

fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("textcard-perf-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn escapes_quotes_and_control_chars() {
        assert_eq!(json_escape("a\"b\\c\nd\u{1}"), "a\\\"b\\\\c\\nd\\u0001");
    }

    #[test]
    fn summary_sits_next_to_log() {
        assert_eq!(
            summary_path_for(Path::new("/tmp/run.log")),
            PathBuf::from("/tmp/run.summary.json")
        );
        assert_eq!(
            summary_path_for(Path::new("perf")),
            PathBuf::from("perf.summary.json")
        );
    }

    #[test]
    fn events_and_stage_summary_are_written() {
        let dir = temp_dir("events");
        let path = dir.join("perf.log");
        {
            let logger = PerfLogger::create(&path).unwrap();
            logger.record_layout(1.0, 2);
            let mut batch = BatchMetrics {
                page_count: 3,
                failed_pages: 1,
                layout_ms: 1.0,
                ..BatchMetrics::default()
            };
            for (index, raster_ms) in [(0, 2.0), (1, 5.0)] {
                let card = CardMetrics {
                    index,
                    scene_ms: 0.5,
                    raster_ms,
                    png_bytes: 10,
                    ..CardMetrics::default()
                };
                logger.record_card(&card);
                batch.push(card);
            }
            logger.record_failure(2, "surface \"too\" big");
            logger.record_batch(&batch);
        }

        let log = std::fs::read_to_string(&path).unwrap();
        let events: Vec<&str> = log.lines().collect();
        assert_eq!(events.len(), 5);
        assert!(events[0].starts_with("{\"event\":\"layout\""));
        assert!(events[2].contains("\"index\":1,\"scene_ms\":0.500,\"raster_ms\":5.000"));
        assert!(events[3].contains("surface \\\"too\\\" big"));
        assert!(events[4].contains("\"pages\":3,\"cards\":2,\"failed\":1"));

        let summary = std::fs::read_to_string(dir.join("perf.summary.json")).unwrap();
        assert!(summary.contains("\"paginate\":{\"ms\":1.000,\"calls\":1}"));
        assert!(summary.contains("\"raster\":{\"ms\":7.000,\"calls\":2}"));
        assert!(summary.contains("\"cards\":2,\"failures\":1,\"bytes\":20"));
        assert!(summary.contains("\"slowest_card\":{\"index\":1,\"ms\":5.500}"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_run_reports_no_slowest_card() {
        let dir = temp_dir("empty");
        let path = dir.join("empty.log");
        drop(PerfLogger::create(&path).unwrap());
        let summary = std::fs::read_to_string(dir.join("empty.summary.json")).unwrap();
        assert!(summary.contains("\"slowest_card\":null"));
        assert!(summary.contains("\"scene\":{\"ms\":0.000,\"calls\":0}"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
