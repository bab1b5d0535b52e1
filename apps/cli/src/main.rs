mod commands;
mod config;
mod main_lib;

use clap::Parser;
use commands::Cli;
use config::Config;
use main_lib::{build_service, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.log_format);

    let service = build_service(&config);
    let backend = service.initialize().await;
    tracing::info!("Cache backend: {}", backend);

    let mut stdout = std::io::stdout();
    let result = commands::run(cli.command, &service, &mut stdout).await;
    service.shutdown().await;
    result
}
