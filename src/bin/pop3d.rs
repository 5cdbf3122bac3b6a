use mboxd::cli::{self, CommonArgs};
use mboxd::logging;
use mboxd::pop3::Pop3Service;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

/// POP3 server reading from flat per-user mailbox files
#[derive(Parser, Debug)]
#[command(name = "pop3d", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 11000)]
    port: u16,

    /// Password accepted for every mailbox
    #[arg(long, default_value = "cis505")]
    password: String,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.common.verbose)?;

    let store = cli
        .common
        .open_store()
        .context("Failed to open mailbox directory")?;
    let listener = cli
        .common
        .listen(cli.port)
        .with_context(|| format!("Failed to bind port {}", cli.port))?;

    info!(dir = %store.dir().display(), "Starting POP3 server");
    let service = Pop3Service::new(&cli.common.hostname, &cli.password, store);
    cli::run(service, listener).await?;
    Ok(())
}
