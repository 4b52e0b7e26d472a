#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use journal::{Config, app, login};
use std::path::PathBuf;

/// Journal web form: shared-password login, dictation and submission to the
/// spreadsheet.
#[derive(Parser)]
#[command(name = "website", version, about)]
struct Cli {
    /// TOML secrets file (defaults to ./secrets.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print an argon2 hash to use as APP_PASSWORD_HASH
    HashPassword { password: String },
}

/// Main entry point for the web application
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(Command::HashPassword { password }) = cli.command {
        println!("{}", login::hash_password(&password)?);
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    app::run(config).await?;
    Ok(())
}
