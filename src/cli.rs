//! Command-line flags and the run loop shared by both binaries

use crate::error::ServerError;
use crate::mailbox::MailboxStore;
use crate::server::{Server, Service};

use clap::Args;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Flags common to the SMTP and POP3 servers
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Host name announced in replies and accepted in recipient addresses
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    /// Log every command and reply
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding one <user>.mbox file per local user
    #[arg(value_name = "MAILBOX_DIR")]
    pub mailbox_dir: PathBuf,
}

impl CommonArgs {
    /// Open the mailbox directory
    pub fn open_store(&self) -> Result<Arc<MailboxStore>, ServerError> {
        let store = MailboxStore::open(&self.mailbox_dir)?;
        Ok(Arc::new(store))
    }

    /// Bind the listening socket on `port`
    pub fn listen(&self, port: u16) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(SocketAddr::new(self.bind, port))?)
    }
}

/// Serve until the listener fails or Ctrl-C is received.
///
/// On Ctrl-C every open client gets the shutdown notice and is
/// disconnected; returns once every session has finished.
pub async fn run<S: Service>(service: S, listener: TcpListener) -> Result<(), ServerError> {
    let server = Arc::new(Server::new(service));
    let registry = server.registry();

    let mut serving = tokio::task::spawn_blocking({
        let server = Arc::clone(&server);
        move || server.serve(listener)
    });

    tokio::select! {
        result = &mut serving => {
            error!(protocol = S::NAME, "Server exited prematurely");
            return flatten(result);
        }
        _ = signal::ctrl_c() => {
            info!(
                protocol = S::NAME,
                open = registry.open_connections(),
                "Interrupt received, shutting down"
            );
        }
    }

    registry.shutdown();
    flatten(serving.await)
}

fn flatten(
    result: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    result.map_err(|e| ServerError::Io(std::io::Error::other(e)))?
}
