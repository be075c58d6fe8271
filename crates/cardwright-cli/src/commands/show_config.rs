//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::config::Config;
use crate::error::Result;
use std::path::Path;

/// Execute the config command.
pub async fn execute_config(args: ConfigArgs, config: &Config, path: &Path) -> Result<()> {
    if args.path {
        println!("{}", path.display());
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
