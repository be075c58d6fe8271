//! Chunks command implementation.

use crate::cli::ChunksArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use cardwright_domain::DocumentSource;
use cardwright_extractor::{PlainTextSource, TextChunker};

/// Execute the chunks command.
pub async fn execute_chunks(args: ChunksArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let mut generation = config.generation.clone();
    if let Some(density) = args.density {
        generation.card_density = density.into();
    }
    if let Some(context_window) = args.context_window {
        generation.context_window = context_window;
    }

    let text = PlainTextSource::new().extract_text(&args.file)?;
    let chunker = TextChunker::from_config(&generation);
    let chunks = chunker.chunk(&text);

    println!("{}", formatter.format_chunks(&chunks)?);
    if !chunks.is_empty() {
        eprintln!(
            "{}",
            formatter.info(&format!(
                "{} parts, at most {} characters each",
                chunks.len(),
                chunker.max_chars()
            ))
        );
    }

    Ok(())
}
