use mboxd::cli::{self, CommonArgs};
use mboxd::logging;
use mboxd::smtp::SmtpService;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

/// SMTP server delivering into flat per-user mailbox files
#[derive(Parser, Debug)]
#[command(name = "smtpd", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 2500)]
    port: u16,

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

    info!(dir = %store.dir().display(), "Starting SMTP server");
    cli::run(SmtpService::new(&cli.common.hostname, store), listener).await?;
    Ok(())
}
