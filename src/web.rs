#![cfg(not(tarpaulin_include))]

use clap::Parser;
use ficore::app;
use ficore::config::Args;

/// Main entry point for the web application
///
/// Loads `.env`, parses the configuration, sets up logging and serves the
/// tools until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Args::parse();
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .format_timestamp_secs()
        .init();

    app::run(config).await?;
    Ok(())
}
