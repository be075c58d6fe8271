//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use cardwright_domain::{Card, Chunk};
use cardwright_extractor::GenerationReport;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Widest cell shown in tables, in characters.
const CELL_WIDTH: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// The active format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Whether messages are colorized.
    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    /// Format the cards of a finished run.
    ///
    /// JSON output carries the run id and statistics along with the cards.
    pub fn format_report(&self, report: &GenerationReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Table => Ok(self.format_cards_table(&report.cards)),
            OutputFormat::Quiet => Ok(format_cards_quiet(&report.cards)),
        }
    }

    /// Format cards as a table.
    fn format_cards_table(&self, cards: &[Card]) -> String {
        if cards.is_empty() {
            return self.colorize("No cards generated.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Deck", "Question", "Answer"]);

        for (i, card) in cards.iter().enumerate() {
            builder.push_record([
                (i + 1).to_string(),
                card.deck.clone(),
                truncate(&card.question, CELL_WIDTH),
                truncate(&card.answer, CELL_WIDTH),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// Format a chunking preview.
    pub fn format_chunks(&self, chunks: &[Chunk]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = chunks
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "index": c.index(),
                            "chars": c.char_len(),
                            "text": c.text(),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            OutputFormat::Quiet => Ok(chunks
                .iter()
                .map(|c| c.char_len().to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if chunks.is_empty() {
                    return Ok(self.colorize("No text to chunk.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["Part", "Chars", "Preview"]);
                for chunk in chunks {
                    builder.push_record([
                        chunk.ordinal().to_string(),
                        chunk.char_len().to_string(),
                        truncate(&chunk.text().replace('\n', " "), CELL_WIDTH),
                    ]);
                }
                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Format a freshly accepted card for progress output.
    pub fn card_line(&self, card: &Card) -> String {
        let deck = self.colorize(&format!("[{}]", card.deck), "cyan");
        let mut line = format!("  + {} Q: {} | A: {}", deck, card.question, card.answer);
        if card.has_quote() {
            line.push_str(&format!(" | Src: {}", truncate(&card.quote, CELL_WIDTH)));
        }
        line
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Tab-separated `question<TAB>answer<TAB>deck`, one card per line.
///
/// Tabs and newlines inside fields are replaced by spaces.
fn format_cards_quiet(cards: &[Card]) -> String {
    let clean = |s: &str| s.replace(['\t', '\n', '\r'], " ");
    cards
        .iter()
        .map(|c| format!("{}\t{}\t{}", clean(&c.question), clean(&c.answer), clean(&c.deck)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shorten `text` to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwright_extractor::StatsSnapshot;

    fn report(cards: Vec<Card>) -> GenerationReport {
        GenerationReport {
            run_id: Default::default(),
            cards,
            stats: StatsSnapshot::default(),
            cancelled: false,
        }
    }

    fn create_test_card() -> Card {
        Card::new(
            "What does insulin regulate?",
            "Insulin regulates blood glucose levels.",
            "Endocrine",
        )
        .with_quote("Insulin lowers blood glucose.")
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_report(&report(vec![create_test_card()])).unwrap();
        assert!(output.contains("\"question\""));
        assert!(output.contains("\"run_id\""));
        assert!(output.contains("\"cards_generated\""));
    }

    #[test]
    fn test_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let mut card = create_test_card();
        card.answer = "Line one\nline two".to_string();
        let output = formatter.format_report(&report(vec![card])).unwrap();
        assert_eq!(
            output,
            "What does insulin regulate?\tLine one line two\tEndocrine"
        );
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_report(&report(vec![create_test_card()])).unwrap();
        assert!(output.contains("Question"));
        assert!(output.contains("Endocrine"));
    }

    #[test]
    fn test_empty_cards() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_report(&report(Vec::new())).unwrap();
        assert!(output.contains("No cards generated"));
    }

    #[test]
    fn test_chunk_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let chunks = vec![Chunk::new(0, "first\nchunk"), Chunk::new(1, "second")];
        let output = formatter.format_chunks(&chunks).unwrap();
        assert!(output.contains("Preview"));
        assert!(output.contains("first chunk"));
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let msg = formatter.success("test");
        assert_eq!(msg, "✓ test");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ğüşöçğüşöç", 6), "ğüş...");
    }
}
