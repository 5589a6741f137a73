use anyhow::Context;
use clap::Parser;
use jaro_rs_config::{DEFAULT_CONFIG_FILE, JaroConfig};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jaro-server", version)]
struct Cli {
    /// Path to a jaro.json5 config file; defaults to ./jaro.json5 when present
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind, overriding the config
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overriding the config
    #[arg(long)]
    port: Option<u16>,
}

/// Entry point for the JARO HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let mut config = JaroConfig::load(path.as_deref()).context("failed to load config")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate().context("invalid config")?;

    jaro_rs_server::init_logging(&config.logging);
    info!(
        "starting jaro server (config={}, address={})",
        path.as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "defaults".to_string()),
        config.server.bind_address()
    );

    jaro_rs_server::serve(&config).await
}
