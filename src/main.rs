use std::sync::Arc;

use anyhow::{Context, Result};
use sqlkit::config::Config;
use sqlkit::runtime::{self, Plugin};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_env()?;
    let plugin = Arc::new(Plugin::new().context("Failed to initialize plugin")?);
    info!(
        mode = ?config.install_method,
        tools = plugin.registry().names().len(),
        "sqlkit plugin started"
    );

    runtime::run(
        plugin,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        config.install_method,
    )
    .await?;

    info!("sqlkit plugin stopped");
    Ok(())
}
