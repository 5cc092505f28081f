//! Progress reporting: snapshots, the sink trait, and the tracker that
//! aggregates completion counts into percent + ETA.
//!
//! # Why a sink trait instead of channels?
//!
//! The sink is the least-invasive integration point: callers can forward
//! snapshots to a terminal progress bar, a GUI event loop, a log file, or a
//! websocket without the library knowing anything about how the host
//! application communicates. The trait is `Send + Sync` because batch and
//! chunk completions arrive from concurrently running workers.
//!
//! # Percent weighting
//!
//! Extraction occupies 0–80 % of the overall percent and writing 80–100 %,
//! matching where the wall-clock time actually goes on large documents.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Extraction stage spans this share of the overall percent.
const EXTRACT_SPAN: usize = 80;
/// Writing spans the remainder, up to 100.
const WRITE_SPAN: usize = 20;

/// Immutable progress value emitted on every state change.
///
/// The last snapshot carries `percent == 100` on a completed run; cancelled
/// and failed runs emit their terminal message with `percent == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub message: String,
    pub tables_found: usize,
}

/// Receives every [`ProgressSnapshot`] the pipeline emits.
///
/// Implementations must be `Send + Sync`; the tracker serialises emission,
/// so `on_progress` itself is never entered concurrently.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
}

/// A no-op sink for callers that don't need progress events.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&self, _snapshot: ProgressSnapshot) {}
}

/// Aggregates completion events into snapshots and forwards them to the sink.
///
/// Safe to call from multiple concurrent completions: a mutex serialises
/// emission so the listener never observes lost or interleaved snapshots.
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    emit_lock: Mutex<()>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            emit_lock: Mutex::new(()),
        }
    }

    /// One extraction batch finished (successfully or not).
    pub fn on_batch_completed(
        &self,
        completed: usize,
        total: usize,
        tables_found: usize,
        elapsed: Duration,
    ) {
        let percent = extraction_percent(completed, total);
        let mut message = format!(
            "Processed {completed}/{total} batches | {tables_found} tables found"
        );
        if let Some(eta) = eta(completed, total, elapsed) {
            message.push_str(&format!(" | about {} remaining", format_eta(eta)));
        }
        self.emit(percent, message, tables_found);
    }

    /// One write chunk was persisted.
    pub fn on_chunk_written(
        &self,
        written: usize,
        total_chunks: usize,
        tables_saved: usize,
        tables_found: usize,
        elapsed: Duration,
    ) {
        let percent = write_percent(written, total_chunks);
        let mut message = format!(
            "Saved chunk {written}/{total_chunks} | {tables_saved}/{tables_found} tables saved"
        );
        if let Some(eta) = eta(written, total_chunks, elapsed) {
            message.push_str(&format!(" | about {} remaining", format_eta(eta)));
        }
        self.emit(percent, message, tables_found);
    }

    /// Free-form announcement: stage transitions, isolated failures,
    /// terminal messages.
    pub fn announce(&self, percent: u8, message: impl Into<String>, tables_found: usize) {
        self.emit(percent, message.into(), tables_found);
    }

    fn emit(&self, percent: u8, message: String, tables_found: usize) {
        let _guard = self
            .emit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.sink.on_progress(ProgressSnapshot {
            percent,
            message,
            tables_found,
        });
    }
}

/// Percent for the extraction stage: 0–80.
pub fn extraction_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return EXTRACT_SPAN as u8;
    }
    (completed.min(total) * EXTRACT_SPAN / total) as u8
}

/// Percent for the write stage: 80–100.
pub fn write_percent(written: usize, total_chunks: usize) -> u8 {
    if total_chunks == 0 {
        return 100;
    }
    (EXTRACT_SPAN + written.min(total_chunks) * WRITE_SPAN / total_chunks) as u8
}

/// Estimated remaining time: `elapsed / completed × (total − completed)`.
///
/// `None` before the first completion and after the last, where the
/// estimate is undefined or pointless.
fn eta(completed: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if completed == 0 || completed >= total {
        return None;
    }
    let avg = elapsed.as_secs_f64() / completed as f64;
    Some(Duration::from_secs_f64(avg * (total - completed) as f64))
}

/// Sub-hour remainders in minutes, hour-scale remainders in hours.
pub(crate) fn format_eta(remaining: Duration) -> String {
    let minutes = remaining.as_secs_f64() / 60.0;
    if minutes > 60.0 {
        format!("{:.1} hours", minutes / 60.0)
    } else {
        format!("{minutes:.1} minutes")
    }
}

/// Total elapsed time for the terminal message.
pub(crate) fn format_elapsed(total: Duration) -> String {
    let secs = total.as_secs_f64();
    if secs > 3600.0 {
        format!("{:.2} hours", secs / 3600.0)
    } else if secs > 60.0 {
        format!("{:.2} minutes", secs / 60.0)
    } else {
        format!("{secs:.1} seconds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        count: AtomicUsize,
        last: Mutex<Option<ProgressSnapshot>>,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    impl ProgressSink for CountingSink {
        fn on_progress(&self, snapshot: ProgressSnapshot) {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(snapshot);
        }
    }

    #[test]
    fn extraction_stays_within_its_span() {
        assert_eq!(extraction_percent(0, 10), 0);
        assert_eq!(extraction_percent(5, 10), 40);
        assert_eq!(extraction_percent(10, 10), 80);
        // Never overshoots even with bogus counts.
        assert_eq!(extraction_percent(15, 10), 80);
    }

    #[test]
    fn write_stage_spans_eighty_to_hundred() {
        assert_eq!(write_percent(0, 4), 80);
        assert_eq!(write_percent(2, 4), 90);
        assert_eq!(write_percent(4, 4), 100);
    }

    #[test]
    fn eta_undefined_before_first_completion() {
        assert!(eta(0, 10, Duration::from_secs(5)).is_none());
        assert!(eta(10, 10, Duration::from_secs(5)).is_none());
        let remaining = eta(2, 10, Duration::from_secs(10)).unwrap();
        assert_eq!(remaining.as_secs(), 40);
    }

    #[test]
    fn eta_formats_minutes_below_an_hour() {
        assert_eq!(format_eta(Duration::from_secs(90)), "1.5 minutes");
        assert_eq!(format_eta(Duration::from_secs(2 * 3600)), "2.0 hours");
    }

    #[test]
    fn elapsed_formats_by_scale() {
        assert_eq!(format_elapsed(Duration::from_secs(12)), "12.0 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(150)), "2.50 minutes");
        assert_eq!(format_elapsed(Duration::from_secs(9000)), "2.50 hours");
    }

    #[test]
    fn batch_completion_message_carries_eta() {
        let sink = CountingSink::new();
        let tracker = ProgressTracker::new(sink.clone());
        tracker.on_batch_completed(2, 10, 7, Duration::from_secs(60));
        let snap = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(snap.percent, 16);
        assert_eq!(snap.tables_found, 7);
        assert!(snap.message.contains("2/10 batches"));
        assert!(snap.message.contains("remaining"), "got: {}", snap.message);
    }

    #[test]
    fn concurrent_emissions_are_not_lost() {
        let sink = CountingSink::new();
        let tracker = Arc::new(ProgressTracker::new(sink.clone()));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for i in 0..50 {
                        tracker.announce(50, format!("worker {worker} event {i}"), i);
                    }
                });
            }
        });

        assert_eq!(sink.count.load(Ordering::SeqCst), 8 * 50);
    }
}
