//! Azure DevOps Boards MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use azdo_boards::config::{CONFIG_PATH_ENV, Settings};
use azdo_boards_mcp::AzdoBoardsMcpServer;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Serve Azure DevOps Boards work item tools over MCP (stdio).
#[derive(Parser, Debug)]
#[command(name = "azdo-boards-mcp", version, about)]
struct Args {
    /// YAML configuration file (environment variables still take precedence)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("azdo_boards=info,azdo_boards_mcp=info")
        }))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).await?;
    tracing::info!(
        organization = %settings.organization,
        project = %settings.project,
        "Starting azdo-boards-mcp server"
    );

    let server = AzdoBoardsMcpServer::from_settings(Arc::new(settings));
    server.run().await?;

    Ok(())
}
