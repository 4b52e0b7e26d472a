#![cfg(not(tarpaulin_include))]

use clap::Parser;
use journal::gemini::GeminiClient;
use journal::sheets::GoogleWorksheet;
use journal::{Config, Processor};
use std::path::PathBuf;
use std::sync::Arc;

/// Fills in the summary and keyword columns of journal rows that have none.
#[derive(Parser)]
#[command(name = "processor", version, about)]
struct Cli {
    /// TOML secrets file (defaults to ./secrets.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    config.validate_processor()?;

    let sheet = Arc::new(GoogleWorksheet::from_config(&config)?);
    let model = Arc::new(GeminiClient::new(
        &config.gemini_base_url,
        &config.processor_model,
        config.gemini_key()?,
    ));
    let processor = Processor::from_config(&config, sheet, model);

    log::info!("--- Processor active ---");
    if cli.once {
        processor.run_cycle().await?;
        return Ok(());
    }

    processor
        .run(config.poll_interval(), async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
