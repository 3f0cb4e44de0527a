use anyhow::Context;
use clap::Parser;
mod cli;
mod client;
mod config;
mod data_channel;
mod error;
mod file_metadata;
mod fs;
mod protocol;
mod server;
mod session;
mod shell;
#[cfg(test)]
mod test_helpers;

use cli::Commands;
use cli::CLI;
use client::Client;
use config::{ClientConfig, FileConfig, ServerConfig};
use server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CLI::parse();
    let file_config = FileConfig::load(cli.config.as_deref())?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        config::log_level(cli.log_level.as_deref(), &file_config),
    ))
    .init();

    match cli.subcommand {
        Commands::Serve(args) => {
            let config = ServerConfig::resolve(&args, &file_config)?;
            let server = Server::bind(&config)
                .await
                .with_context(|| format!("Cannot listen on {}", config.listen))?;
            server.run().await?;
        }
        Commands::Connect(args) => {
            let config = ClientConfig::resolve(&args, &file_config)?;
            let client = Client::connect(&config).await?;
            log::info!(
                "Connected to {}:{}, local directory {}",
                config.host,
                config.port,
                client.local_directory().display()
            );
            shell::run(client).await?;
        }
    }
    Ok(())
}
