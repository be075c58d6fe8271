//! Run statistics shared between workers

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    total_chunks: usize,
    processed_chunks: usize,
    failed_chunks: usize,
    cards_generated: usize,
    cards_rejected: usize,
    extraction_time: Duration,
    chunking_time: Duration,
    model_time: Duration,
}

/// Counters and phase timings for one run
///
/// Every method takes `&self`; updates from concurrent workers serialize on
/// one internal lock.
#[derive(Debug)]
pub struct PipelineStats {
    started: Instant,
    inner: Mutex<Counters>,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    /// Start the run clock
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Counters::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Time spent turning the document into text
    pub fn record_extraction_time(&self, elapsed: Duration) {
        self.lock().extraction_time = elapsed;
    }

    /// Time spent chunking
    pub fn record_chunking_time(&self, elapsed: Duration) {
        self.lock().chunking_time = elapsed;
    }

    /// Add time spent waiting on the model
    pub fn add_model_time(&self, elapsed: Duration) {
        self.lock().model_time += elapsed;
    }

    /// Number of chunks in the run
    pub fn set_total_chunks(&self, total: usize) {
        self.lock().total_chunks = total;
    }

    /// A chunk finished without error
    pub fn increment_processed(&self) {
        self.lock().processed_chunks += 1;
    }

    /// A chunk raised and contributed nothing
    pub fn increment_failed(&self) {
        self.lock().failed_chunks += 1;
    }

    /// Cards accepted into the result set
    pub fn add_generated(&self, count: usize) {
        self.lock().cards_generated += count;
    }

    /// Cards dropped as duplicates or by validation
    pub fn add_rejected(&self, count: usize) {
        self.lock().cards_rejected += count;
    }

    /// Immutable view of the counters so far
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.lock();
        StatsSnapshot {
            total_chunks: counters.total_chunks,
            processed_chunks: counters.processed_chunks,
            failed_chunks: counters.failed_chunks,
            cards_generated: counters.cards_generated,
            cards_rejected: counters.cards_rejected,
            extraction_secs: counters.extraction_time.as_secs_f64(),
            chunking_secs: counters.chunking_time.as_secs_f64(),
            model_secs: counters.model_time.as_secs_f64(),
            total_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

/// Final statistics of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Chunks produced by the chunker
    pub total_chunks: usize,
    /// Chunks that completed
    pub processed_chunks: usize,
    /// Chunks that raised
    pub failed_chunks: usize,
    /// Cards accepted
    pub cards_generated: usize,
    /// Cards dropped as duplicates or invalid
    pub cards_rejected: usize,
    /// Document-to-text time, seconds
    pub extraction_secs: f64,
    /// Chunking time, seconds
    pub chunking_secs: f64,
    /// Summed model wall time across workers, seconds
    pub model_secs: f64,
    /// Wall time of the run, seconds
    pub total_secs: f64,
}

impl StatsSnapshot {
    /// Human-readable report
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Pipeline completed in {:.2}s.", self.total_secs)];
        if self.extraction_secs > 0.0 {
            lines.push(format!("Text extraction: {:.2}s", self.extraction_secs));
        }
        lines.push(format!("Chunking: {:.2}s", self.chunking_secs));
        lines.push(format!("Model time: {:.2}s", self.model_secs));
        lines.push(format!(
            "Chunks: {}/{} (Failed: {})",
            self.processed_chunks, self.total_chunks, self.failed_chunks
        ));
        lines.push(format!(
            "Cards: {} Generated, {} Rejected.",
            self.cards_generated, self.cards_rejected
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let stats = PipelineStats::new();
        stats.set_total_chunks(3);
        stats.increment_processed();
        stats.increment_processed();
        stats.increment_failed();
        stats.add_generated(5);
        stats.add_rejected(2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_chunks, 3);
        assert_eq!(snapshot.processed_chunks, 2);
        assert_eq!(snapshot.failed_chunks, 1);
        assert_eq!(snapshot.cards_generated, 5);
        assert_eq!(snapshot.cards_rejected, 2);
    }

    #[test]
    fn test_model_time_accumulates() {
        let stats = PipelineStats::new();
        stats.add_model_time(Duration::from_millis(1500));
        stats.add_model_time(Duration::from_millis(500));
        assert!((stats.snapshot().model_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(PipelineStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.increment_processed();
                        stats.add_generated(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed_chunks, 800);
        assert_eq!(snapshot.cards_generated, 1600);
    }

    #[test]
    fn test_summary() {
        let snapshot = StatsSnapshot {
            total_chunks: 3,
            processed_chunks: 2,
            failed_chunks: 1,
            cards_generated: 7,
            cards_rejected: 1,
            total_secs: 1.5,
            ..StatsSnapshot::default()
        };
        let summary = snapshot.summary();
        assert!(summary.starts_with("Pipeline completed in 1.50s."));
        assert!(summary.contains("Chunks: 2/3 (Failed: 1)"));
        assert!(summary.contains("Cards: 7 Generated, 1 Rejected."));
        assert!(!summary.contains("Text extraction"));
    }
}
