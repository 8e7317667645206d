//! `epic-export` binary.

use anyhow::Result;
use azdo_boards::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout may carry the exported document, so logs go to stderr.
    // Example: RUST_LOG=azdo_boards=debug epic-export 1234
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("azdo_boards=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Export completed");
    Ok(())
}
