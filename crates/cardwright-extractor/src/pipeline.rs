//! Concurrent generation pipeline
//!
//! ```text
//! text → chunks → [worker: model → records → filter → (refine → filter)] → aggregator
//! ```
//!
//! Workers run under a semaphore sized by [`GenerationConfig::effective_concurrency`].
//! A worker that fails is logged and contributes nothing. A single
//! aggregator owns the deduplication set and the result list, so which
//! questions survive does not depend on completion order.

use crate::chunking::TextChunker;
use crate::config::GenerationConfig;
use crate::error::ExtractorError;
use crate::failure_log::FailureLogger;
use crate::filter::CardFilter;
use crate::observer::{PipelineObserver, TracingObserver};
use crate::parser::extract_records;
use crate::prompt::{generation_user_prompt, PromptBuilder};
use crate::refiner::Refiner;
use crate::stats::{PipelineStats, StatsSnapshot};
use cardwright_domain::{Card, Chunk, DocumentError, DocumentSource};
use cardwright_gatekeeper::{
    CardValidator, GatekeeperError, ResourceGuard, ResourceLimits, ValidationConfig,
};
use cardwright_llm::{ChatModel, CompletionRequest, LlmError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Identifier stamped on this run's log entries
    pub run_id: Uuid,
    /// Accepted cards, in acceptance order
    pub cards: Vec<Card>,
    /// Final counters
    pub stats: StatsSnapshot,
    /// Whether the run stopped early on the cancellation token
    pub cancelled: bool,
}

/// Cards from one completed chunk, on their way to the aggregator
struct ChunkCards {
    ordinal: usize,
    cards: Vec<Card>,
}

/// Everything a worker needs, shared across one run
struct RunContext<M> {
    model: Arc<M>,
    config: GenerationConfig,
    system_prompt: String,
    filter: CardFilter,
    refiner: Option<Refiner>,
    stats: PipelineStats,
    logger: FailureLogger,
    observer: Arc<dyn PipelineObserver>,
    total_chunks: usize,
}

impl<M: ChatModel> RunContext<M> {
    /// Model call, parsing, filtering and optional refinement for one chunk
    async fn generate(&self, chunk: &Chunk, cancel: &CancellationToken) -> Result<Vec<Card>, LlmError> {
        let user_prompt = generation_user_prompt(chunk.text());
        let max_tokens = self.config.resolve_max_tokens(&self.system_prompt, &user_prompt);
        let request = CompletionRequest::new(self.system_prompt.clone(), user_prompt)
            .with_temperature(self.config.temperature)
            .with_max_tokens(max_tokens);

        let reply = self.model.complete(&request, cancel).await?;
        debug!(
            "AI response received for part {} ({} chars)",
            chunk.ordinal(),
            reply.chars().count()
        );

        let records = extract_records(&reply);
        if records.is_empty() {
            warn!(
                "No valid cards found in part {}. Response might be malformed or empty.",
                chunk.ordinal()
            );
        }

        let cards = self.filter.process(&records);
        match &self.refiner {
            Some(refiner) if !cards.is_empty() => {
                self.observer.log(&format!(
                    "Refining {} cards from part {}",
                    cards.len(),
                    chunk.ordinal()
                ));
                let refined = refiner.refine(&*self.model, &cards, cancel).await;
                // The refined batch may reintroduce yes/no answers or stray decks
                Ok(self.filter.process(&refined))
            }
            _ => Ok(cards),
        }
    }

    /// Run one chunk to completion, isolating its failure
    async fn process(&self, chunk: Chunk, cancel: CancellationToken) -> Option<ChunkCards> {
        if cancel.is_cancelled() {
            return None;
        }
        self.observer.log(&format!(
            "Processing part {}/{}... (Sending to AI)",
            chunk.ordinal(),
            self.total_chunks
        ));

        let started = Instant::now();
        let result = self.generate(&chunk, &cancel).await;
        self.stats.add_model_time(started.elapsed());

        match result {
            Ok(cards) => {
                self.stats.increment_processed();
                Some(ChunkCards {
                    ordinal: chunk.ordinal(),
                    cards,
                })
            }
            Err(e) if e.is_cancelled() => {
                debug!("Part {} abandoned: {}", chunk.ordinal(), e);
                None
            }
            Err(e) => {
                error!("Error processing part {}: {}", chunk.ordinal(), e);
                self.observer
                    .log(&format!("Error processing part {}: {}", chunk.ordinal(), e));
                self.stats.increment_failed();
                self.logger.log_failed_chunk(&chunk, &e.to_string());
                None
            }
        }
    }
}

/// Turns documents into validated, deduplicated cards with a chat model
pub struct CardPipeline<M> {
    model: Arc<M>,
    config: GenerationConfig,
    validator: CardValidator,
    guard: ResourceGuard,
    observer: Arc<dyn PipelineObserver>,
}

impl<M: ChatModel + 'static> CardPipeline<M> {
    /// Create a pipeline with default validation rules and resource limits
    pub fn new(model: M, config: GenerationConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self {
            model: Arc::new(model),
            config,
            validator: CardValidator::new(ValidationConfig::default()),
            guard: ResourceGuard::new(ResourceLimits::default()),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Use the given card acceptance rules
    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validator = CardValidator::new(config);
        self
    }

    /// Use the given pre-flight ceilings
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.guard = ResourceGuard::new(limits);
        self
    }

    /// Route progress and accepted batches to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The run configuration
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The model in use
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Deck list as presented to the model
    ///
    /// Shuffled when smart matching is on, so the model does not settle on
    /// the first name. Deterministic mode seeds the shuffle from the config.
    pub fn deck_order(&self, decks: &[String]) -> Vec<String> {
        let mut shown = decks.to_vec();
        if self.config.smart_deck_match && shown.len() > 1 {
            let mut rng = if self.config.deterministic_mode {
                StdRng::seed_from_u64(self.config.seed)
            } else {
                StdRng::from_os_rng()
            };
            shown.shuffle(&mut rng);
        }
        shown
    }

    /// Generate cards from a document on disk
    ///
    /// Applies the file-size ceiling before reading anything.
    pub async fn generate_from_file<S>(
        &self,
        path: &Path,
        source: &S,
        decks: &[String],
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, ExtractorError>
    where
        S: DocumentSource + ?Sized,
    {
        match self.guard.check_file_size(path) {
            Err(GatekeeperError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(DocumentError::NotFound(path.to_path_buf()).into());
            }
            other => other?,
        }

        let stats = PipelineStats::new();
        let started = Instant::now();
        let text = source.extract_text(path)?;
        stats.record_extraction_time(started.elapsed());
        info!(
            "Extracted {} characters from {} in {:.2}s",
            text.chars().count(),
            path.display(),
            started.elapsed().as_secs_f64()
        );

        self.run(&text, decks, cancel, stats).await
    }

    /// Generate cards from text
    ///
    /// Only an unreachable model or an exceeded ceiling fail the run; every
    /// other problem yields fewer cards.
    pub async fn generate(
        &self,
        text: &str,
        decks: &[String],
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, ExtractorError> {
        self.run(text, decks, cancel, PipelineStats::new()).await
    }

    async fn run(
        &self,
        text: &str,
        decks: &[String],
        cancel: &CancellationToken,
        stats: PipelineStats,
    ) -> Result<GenerationReport, ExtractorError> {
        let decks: Vec<String> = decks
            .iter()
            .filter(|deck| !deck.trim().is_empty())
            .cloned()
            .collect();
        let decks = decks.as_slice();
        let logger = FailureLogger::new(&self.config.log_dir);
        let run_id = logger.run_id();

        let started = Instant::now();
        let chunks = TextChunker::from_config(&self.config).chunk(text);
        stats.record_chunking_time(started.elapsed());
        stats.set_total_chunks(chunks.len());
        self.guard.check_chunk_count(chunks.len())?;
        self.observer.log(&format!(
            "Document split into {} parts in {:.2}s.",
            chunks.len(),
            started.elapsed().as_secs_f64()
        ));

        if chunks.is_empty() {
            return Ok(GenerationReport {
                run_id,
                cards: Vec::new(),
                stats: stats.snapshot(),
                cancelled: cancel.is_cancelled(),
            });
        }

        if let Err(e) = self.model.check_reachable().await {
            error!("Could not connect to the model server: {}", e);
            return Err(ExtractorError::Unreachable(e.to_string()));
        }

        if self.config.deterministic_mode {
            self.observer.log(&format!(
                "Deterministic mode: seed {}, concurrency 1.",
                self.config.seed
            ));
        }
        let workers = self.config.effective_concurrency();
        if workers < self.config.concurrency && !self.config.deterministic_mode {
            self.observer.log(&format!(
                "Requested concurrency ({}) exceeds available cores. Limiting to {}.",
                self.config.concurrency, workers
            ));
        }

        let shown_decks = self.deck_order(decks);
        let refiner = self
            .config
            .ai_refinement
            .then(|| Refiner::from_config(&self.config, decks));

        let ctx = Arc::new(RunContext {
            model: Arc::clone(&self.model),
            config: self.config.clone(),
            system_prompt: PromptBuilder::new(&self.config, &shown_decks).build(),
            filter: CardFilter::from_config(&self.config, decks),
            refiner,
            stats,
            logger,
            observer: Arc::clone(&self.observer),
            total_chunks: chunks.len(),
        });

        info!(
            "Run {}: {} chunks, {} workers, {} decks",
            run_id,
            chunks.len(),
            workers,
            decks.len()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&ctx),
            chunks,
            workers,
            tx,
            cancel.clone(),
        ));

        let mut seen = HashSet::new();
        let mut cards = Vec::new();
        while let Some(batch) = rx.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            let accepted = self.accept(batch.cards, &mut seen, &ctx);
            ctx.stats.add_generated(accepted.len());
            self.observer.log(&format!(
                "Part {} completed. Added {} cards.",
                batch.ordinal,
                accepted.len()
            ));
            if !accepted.is_empty() {
                self.observer.cards_accepted(batch.ordinal, &accepted);
            }
            cards.extend(accepted);
        }
        drop(rx);

        dispatcher
            .await
            .map_err(|e| ExtractorError::Worker(e.to_string()))?;

        let cancelled = cancel.is_cancelled();
        if cancelled {
            self.observer.log("Stopped by caller.");
        }
        let snapshot = ctx.stats.snapshot();
        self.observer.log(&format!(
            "Completed. Generated {} total cards.",
            cards.len()
        ));
        info!("{}", snapshot.summary());

        Ok(GenerationReport {
            run_id,
            cards,
            stats: snapshot,
            cancelled,
        })
    }

    /// Deduplicate then validate one chunk's cards
    ///
    /// Only accepted questions enter `seen`.
    fn accept(
        &self,
        batch: Vec<Card>,
        seen: &mut HashSet<String>,
        ctx: &RunContext<M>,
    ) -> Vec<Card> {
        let mut accepted = Vec::with_capacity(batch.len());
        for card in batch {
            if seen.contains(&card.question) {
                debug!("Duplicate question dropped: {}", card.question);
                ctx.stats.add_rejected(1);
                continue;
            }

            let verdict = self.validator.validate(&card);
            if !verdict.valid {
                let reason = verdict.reason_text();
                debug!("Card rejected ({}): {}", reason, card.question);
                ctx.stats.add_rejected(1);
                ctx.logger.log_rejected_card(&card, &reason);
                continue;
            }

            seen.insert(card.question.clone());
            accepted.push(card);
        }
        accepted
    }
}

/// Hand chunks to workers in order, at most `workers` at a time
///
/// A permit is held until the worker's result is queued, so with one worker
/// results arrive in chunk order. A panicking worker counts as a failed chunk.
async fn dispatch<M: ChatModel + 'static>(
    ctx: Arc<RunContext<M>>,
    chunks: Vec<Chunk>,
    workers: usize,
    tx: mpsc::UnboundedSender<ChunkCards>,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for chunk in chunks {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if cancel.is_cancelled() {
            break;
        }

        let ctx = Arc::clone(&ctx);
        let tx = tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let worker_ctx = Arc::clone(&ctx);
            let input = chunk.clone();
            // Run the chunk in its own task so a panic still leaves us the input to log
            let worker = tokio::spawn(async move { worker_ctx.process(input, cancel).await });
            match worker.await {
                Ok(Some(result)) => {
                    // Receiver gone means the run was cancelled
                    let _ = tx.send(result);
                }
                Ok(None) => {}
                Err(e) => {
                    let message = panic_message(e);
                    error!("Worker for part {} failed: {}", chunk.ordinal(), message);
                    ctx.stats.increment_failed();
                    ctx.logger.log_failed_chunk(&chunk, &message);
                }
            }
            drop(permit);
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Dispatch task failed: {}", e);
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("worker panicked: {}", detail)
}
