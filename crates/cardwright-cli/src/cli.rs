//! CLI command definitions and argument parsing.

use cardwright_extractor::CardDensity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cardwright - Turn documents into flashcards with a local language model.
#[derive(Debug, Parser)]
#[command(name = "cardwright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Chat-completions endpoint URL
    #[arg(long, global = true, env = "CARDWRIGHT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model identifier sent to the server
    #[arg(long, global = true, env = "CARDWRIGHT_MODEL")]
    pub model: Option<String>,

    /// Bearer token for the server
    #[arg(long, global = true, env = "CARDWRIGHT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (tab-separated question and answer)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate flashcards from a document
    Generate(GenerateArgs),

    /// Check that the model server is reachable
    Probe,

    /// Show how a document would be chunked, without contacting the model
    Chunks(ChunksArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the generate command.
#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Document to read (.txt, .md)
    pub file: PathBuf,

    /// Allowed deck (repeatable)
    #[arg(short, long = "deck")]
    pub decks: Vec<String>,

    /// File with one allowed deck per line
    #[arg(long)]
    pub decks_file: Option<PathBuf>,

    /// Language of the generated cards
    #[arg(short, long)]
    pub language: Option<String>,

    /// Card density
    #[arg(long, value_enum)]
    pub density: Option<DensityArg>,

    /// Extra instructions on tone or focus
    #[arg(long)]
    pub style: Option<String>,

    /// Parallel model requests
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Run a second model pass over each chunk's cards
    #[arg(long)]
    pub refine: bool,

    /// One worker and a fixed shuffle seed
    #[arg(long)]
    pub deterministic: bool,

    /// Keep cards answered with a plain yes or no
    #[arg(long)]
    pub keep_yes_no: bool,

    /// Trust the model's deck choice instead of scoring card content
    #[arg(long)]
    pub no_smart_match: bool,

    /// Directory for the failed-chunk and rejected-card logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Write cards to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the chunks command.
#[derive(Debug, Parser)]
pub struct ChunksArgs {
    /// Document to read (.txt, .md)
    pub file: PathBuf,

    /// Card density
    #[arg(long, value_enum)]
    pub density: Option<DensityArg>,

    /// Model context window in tokens
    #[arg(long)]
    pub context_window: Option<u32>,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Print only the configuration file path
    #[arg(long)]
    pub path: bool,
}

/// Density argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum DensityArg {
    /// Big-picture concepts only
    Low,
    /// Key concepts and important details
    Medium,
    /// Every distinct fact
    High,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<DensityArg> for CardDensity {
    fn from(density: DensityArg) -> Self {
        match density {
            DensityArg::Low => CardDensity::Low,
            DensityArg::Medium => CardDensity::Medium,
            DensityArg::High => CardDensity::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_command() {
        let cli = Cli::parse_from([
            "cardwright",
            "generate",
            "notes.md",
            "--deck",
            "Cardiology",
            "-d",
            "Neurology, Brain",
            "--density",
            "high",
            "--refine",
        ]);
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.file, PathBuf::from("notes.md"));
                assert_eq!(args.decks, vec!["Cardiology", "Neurology, Brain"]);
                assert!(matches!(args.density, Some(DensityArg::High)));
                assert!(args.refine);
                assert!(!args.deterministic);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cardwright", "probe", "--format", "json", "--no-color"]);
        assert!(matches!(cli.command, Command::Probe));
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(cli.no_color);
    }

    #[test]
    fn test_density_conversion() {
        let density: CardDensity = DensityArg::Low.into();
        assert_eq!(density, CardDensity::Low);
    }
}
