//! Probe command implementation.

use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use cardwright_llm::OpenAiCompatClient;

/// Execute the probe command.
pub async fn execute_probe(config: &Config, formatter: &Formatter) -> Result<()> {
    let client = OpenAiCompatClient::new(config.model.clone())?;
    let endpoint = &client.settings().endpoint;

    match client.probe().await {
        Ok(()) => {
            println!("{}", formatter.success(&format!("Model server reachable at {}", endpoint)));
            Ok(())
        }
        Err(e) => {
            println!("{}", formatter.error(&format!("Cannot reach {}", endpoint)));
            Err(e.into())
        }
    }
}
