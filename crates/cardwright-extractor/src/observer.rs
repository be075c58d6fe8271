//! Progress sink for a pipeline run

use cardwright_domain::Card;
use tracing::info;

/// Receives human-facing progress and each chunk's accepted cards
///
/// `log` may be called from any worker. `cards_accepted` is only called
/// from the aggregating task, so batches arrive one at a time.
pub trait PipelineObserver: Send + Sync {
    /// A progress message
    fn log(&self, message: &str);

    /// Newly accepted cards from the chunk with the given one-based ordinal
    ///
    /// Never called with an empty batch.
    fn cards_accepted(&self, chunk_ordinal: usize, cards: &[Card]) {
        let _ = (chunk_ordinal, cards);
    }
}

/// Forwards progress to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn log(&self, message: &str) {
        info!("{}", message);
    }

    fn cards_accepted(&self, chunk_ordinal: usize, cards: &[Card]) {
        for card in cards {
            info!(chunk = chunk_ordinal, "[+] {}", card);
        }
    }
}
