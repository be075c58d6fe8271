//! Generate command implementation.

use crate::cli::GenerateArgs;
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use cardwright_domain::Card;
use cardwright_extractor::{CardPipeline, GenerationConfig, PipelineObserver, PlainTextSource};
use cardwright_llm::OpenAiCompatClient;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execute the generate command.
pub async fn execute_generate(args: GenerateArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let mut decks = args.decks.clone();
    if let Some(path) = &args.decks_file {
        decks.extend(read_decks(path)?);
    }
    let generation = apply_overrides(config.generation.clone(), &args);

    let client = OpenAiCompatClient::new(config.model.clone())?;
    let observer = Arc::new(ProgressObserver {
        formatter: Formatter::new(OutputFormat::Table, formatter.color_enabled()),
        show_cards: formatter.format() != OutputFormat::Quiet,
    });
    let pipeline = CardPipeline::new(client, generation)?
        .with_validation(config.validation.clone())
        .with_limits(config.limits.clone())
        .with_observer(observer);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after in-flight parts finish...");
            on_interrupt.cancel();
        }
    });

    let result = pipeline
        .generate_from_file(&args.file, &PlainTextSource::new(), &decks, &cancel)
        .await;
    interrupt.abort();
    let report = result?;

    let rendered = formatter.format_report(&report)?;
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered))?;
            eprintln!(
                "{}",
                formatter.success(&format!("Wrote {} cards to {}", report.cards.len(), path.display()))
            );
        }
        None => println!("{}", rendered),
    }

    if report.cancelled {
        eprintln!("{}", formatter.warning("Stopped before all parts were processed."));
    }
    if report.stats.failed_chunks > 0 {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "{} parts failed; see {}",
                report.stats.failed_chunks,
                pipeline
                    .config()
                    .log_dir
                    .join(cardwright_extractor::FAILED_CHUNKS_FILE)
                    .display()
            ))
        );
    }
    eprintln!("{}", formatter.info(&report.stats.summary()));

    Ok(())
}

/// Fold command-line flags into the configured generation settings.
fn apply_overrides(mut generation: GenerationConfig, args: &GenerateArgs) -> GenerationConfig {
    if let Some(language) = &args.language {
        generation.target_language = language.clone();
    }
    if let Some(density) = args.density {
        generation.card_density = density.into();
    }
    if let Some(style) = &args.style {
        generation.prompt_style = style.clone();
    }
    if let Some(concurrency) = args.concurrency {
        generation.concurrency = concurrency;
    }
    if let Some(log_dir) = &args.log_dir {
        generation.log_dir = log_dir.clone();
    }
    if args.refine {
        generation.ai_refinement = true;
    }
    if args.deterministic {
        generation.deterministic_mode = true;
    }
    if args.keep_yes_no {
        generation.filter_yes_no = false;
    }
    if args.no_smart_match {
        generation.smart_deck_match = false;
    }
    generation
}

/// One deck per line; blank lines and `#` comments are skipped.
fn read_decks(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CliError::InvalidInput(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Prints progress and accepted cards to stderr.
struct ProgressObserver {
    formatter: Formatter,
    show_cards: bool,
}

impl PipelineObserver for ProgressObserver {
    fn log(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn cards_accepted(&self, _chunk_ordinal: usize, cards: &[Card]) {
        if self.show_cards {
            for card in cards {
                eprintln!("{}", self.formatter.card_line(card));
            }
        }
    }
}
