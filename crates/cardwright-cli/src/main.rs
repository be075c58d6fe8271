//! Cardwright CLI - Turn documents into flashcards with a local language model.

use cardwright_cli::commands;
use cardwright_cli::{Cli, Command, Config, Formatter};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays clean for card output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> cardwright_cli::Result<()> {
    let cli = Cli::parse();

    // Load or create config
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => Config::path()?,
    };
    let mut config = if config_path.exists() {
        Config::load_from(&config_path)?
    } else {
        let cfg = Config::default();
        if cli.config.is_none() {
            cfg.save_to(&config_path).ok();
        }
        cfg
    };
    config.override_model(cli.endpoint, cli.model, cli.api_key);
    debug!(path = %config_path.display(), endpoint = %config.model.endpoint, "Configuration loaded");

    let format = cli.format.map(Into::into).unwrap_or(config.output.format);
    let color_enabled = !cli.no_color && config.output.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Generate(args) => commands::execute_generate(args, &config, &formatter).await,
        Command::Probe => commands::execute_probe(&config, &formatter).await,
        Command::Chunks(args) => commands::execute_chunks(args, &config, &formatter).await,
        Command::Config(args) => commands::execute_config(args, &config, &config_path).await,
    }
}
