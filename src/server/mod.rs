//! Connection supervisor shared by the SMTP and POP3 servers
//!
//! One thread serves each accepted connection. The thread reads from the
//! socket, frames the bytes into CRLF lines and feeds each line to the
//! protocol session, writing back whatever reply the session produces.

mod registry;

pub use registry::ConnectionRegistry;

use crate::error::ServerError;
use crate::framing::{LineFramer, MAIL_BUFFER_SIZE};

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a session wants sent back for one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to send (e.g. a DATA body line)
    Silent,
    /// Send the text and keep the connection open
    Send(String),
    /// Send the text, then close the connection
    Close(String),
}

/// Per-connection protocol state machine
pub trait Session: Send {
    /// Handle one framed line, terminator included
    fn handle_line(&mut self, line: &str) -> Reply;
}

/// A protocol served by [`Server`]
pub trait Service: Send + Sync + 'static {
    type Session: Session + 'static;

    /// Protocol name used in logs
    const NAME: &'static str;

    fn new_session(&self) -> Self::Session;

    /// Sent when a client connects
    fn greeting(&self) -> String;

    /// Sent when a line overflows the connection buffer
    fn oversize_reply(&self) -> String;

    /// Sent to every open connection on shutdown
    fn shutdown_notice(&self) -> String;

    fn buffer_size(&self) -> usize {
        MAIL_BUFFER_SIZE
    }
}

/// Accepts connections and runs one session thread per client
#[derive(Debug)]
pub struct Server<S: Service> {
    service: Arc<S>,
    registry: Arc<ConnectionRegistry>,
}

impl<S: Service> Server<S> {
    pub fn new(service: S) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(service.shutdown_notice()));
        Self {
            service: Arc::new(service),
            registry,
        }
    }

    /// Handle for stopping the server from another thread
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the registry is shut down (blocking).
    ///
    /// Returns once the listener is closed and every session thread has
    /// finished.
    pub fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        listener.set_nonblocking(true)?;
        info!(
            protocol = S::NAME,
            addr = %listener.local_addr()?,
            "Server listening"
        );

        while self.registry.is_running() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.spawn_session(stream, peer) {
                        warn!(protocol = S::NAME, %peer, "Failed to start session: {e}");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!(protocol = S::NAME, "Error accepting connection: {e}");
                }
            }
        }

        drop(listener);
        debug!(protocol = S::NAME, "Listening socket closed");

        self.registry.join_all();
        info!(protocol = S::NAME, "Server shut down");
        Ok(())
    }

    fn spawn_session(&self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(false)?;

        let Some(id) = self.registry.register(stream.try_clone()?) else {
            stream.write_all(self.service.shutdown_notice().as_bytes())?;
            return Ok(());
        };
        debug!(protocol = S::NAME, conn = id, %peer, "New connection");

        let service = Arc::clone(&self.service);
        let registry = Arc::clone(&self.registry);
        let spawned = thread::Builder::new()
            .name(format!("{}-{id}", S::NAME.to_ascii_lowercase()))
            .spawn(move || {
                let result = handle_client(service.as_ref(), &mut stream, id);
                if let Err(e) = result {
                    if registry.is_running() {
                        debug!(protocol = S::NAME, conn = id, "Connection error: {e}");
                    }
                }
                registry.deregister(id);
                let _ = stream.shutdown(Shutdown::Both);
                debug!(protocol = S::NAME, conn = id, "Connection closed");
            });

        match spawned {
            Ok(handle) => {
                self.registry.track(handle);
                Ok(())
            }
            Err(e) => {
                self.registry.deregister(id);
                Err(e)
            }
        }
    }
}

/// Drive one client connection until it quits or the socket closes
fn handle_client<S: Service>(service: &S, stream: &mut TcpStream, id: u64) -> io::Result<()> {
    let mut session = service.new_session();
    let mut framer = LineFramer::with_capacity(service.buffer_size());
    let mut chunk = vec![0u8; framer.capacity()];

    stream.write_all(service.greeting().as_bytes())?;

    loop {
        let read = match stream.read(&mut chunk[..framer.remaining()]) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if let Err(e) = framer.feed(&chunk[..read]) {
            warn!(protocol = S::NAME, conn = id, "{e}");
            stream.write_all(service.oversize_reply().as_bytes())?;
            framer.clear();
            continue;
        }

        while let Some(raw) = framer.next_line() {
            let line = String::from_utf8_lossy(&raw);
            debug!(protocol = S::NAME, conn = id, "C: {}", line.trim_end());

            match session.handle_line(&line) {
                Reply::Silent => {}
                Reply::Send(text) => {
                    debug!(protocol = S::NAME, conn = id, "S: {}", text.trim_end());
                    stream.write_all(text.as_bytes())?;
                }
                Reply::Close(text) => {
                    debug!(protocol = S::NAME, conn = id, "S: {}", text.trim_end());
                    stream.write_all(text.as_bytes())?;
                    return Ok(());
                }
            }
        }
    }
}
