//! Live connections and session threads, for coordinated shutdown

use std::collections::HashMap;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Tracks every open client connection and the thread serving it.
///
/// Shared between the accept loop, which registers connections, and
/// whatever triggers shutdown. After [`shutdown`](Self::shutdown) no new
/// connection can be registered.
#[derive(Debug)]
pub struct ConnectionRegistry {
    running: AtomicBool,
    next_id: AtomicU64,
    notice: String,
    connections: Mutex<HashMap<u64, TcpStream>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionRegistry {
    /// `notice` is written to every open connection on shutdown
    pub fn new(notice: impl Into<String>) -> Self {
        Self {
            running: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            notice: notice.into(),
            connections: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Record an open connection. Returns its id, or `None` once shutdown
    /// has started.
    pub fn register(&self, stream: TcpStream) -> Option<u64> {
        let mut connections = lock(&self.connections);
        if !self.is_running() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        connections.insert(id, stream);
        Some(id)
    }

    pub fn deregister(&self, id: u64) {
        lock(&self.connections).remove(&id);
    }

    /// Keep the handle of a session thread so shutdown can wait for it
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut workers = lock(&self.workers);
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
    }

    /// Number of connections currently open
    pub fn open_connections(&self) -> usize {
        lock(&self.connections).len()
    }

    /// Stop accepting, tell every open client the service is going away and
    /// close its socket. Blocked session reads return once their socket is
    /// shut down.
    pub fn shutdown(&self) {
        let mut connections = lock(&self.connections);
        self.running.store(false, Ordering::SeqCst);

        for (id, mut stream) in connections.drain() {
            if let Err(e) = stream.write_all(self.notice.as_bytes()) {
                debug!(conn = id, "Shutdown notice not delivered: {e}");
            }
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(conn = id, "Socket already closed: {e}");
            }
        }
    }

    /// Wait for every tracked session thread to finish
    pub fn join_all(&self) {
        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                warn!("Session thread panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
