//! Helpers for driving real servers over TCP

#![allow(dead_code)]

use mboxd::server::{Server, Service};
use mboxd::{ConnectionRegistry, ServerError};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

/// A mailbox directory holding `<user>.mbox` for each `(user, contents)`
pub fn mailbox_dir(mailboxes: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (user, contents) in mailboxes {
        fs::write(dir.path().join(format!("{user}.mbox")), contents).unwrap();
    }
    dir
}

pub fn read_mailbox(dir: &Path, user: &str) -> String {
    fs::read_to_string(dir.join(format!("{user}.mbox"))).unwrap()
}

/// A server running on an ephemeral port in a background thread
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<ConnectionRegistry>,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    pub fn start<S: Service>(service: S) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(service);
        let registry = server.registry();
        let handle = thread::spawn(move || server.serve(listener));

        Self {
            addr,
            registry,
            handle: Some(handle),
        }
    }

    pub fn connect(&self) -> Client {
        Client::connect(self.addr)
    }

    /// Shut down and wait for every session to finish
    pub fn stop(mut self) {
        self.registry.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}

/// Line-oriented test client
pub struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }

    /// Send one line, adding the CRLF
    pub fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\r\n").as_bytes());
    }

    /// Read one reply line, CRLF included
    pub fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line
    }

    /// Send a command and read its one-line reply, without the CRLF
    pub fn command(&mut self, line: &str) -> String {
        self.send(line);
        self.read_line().trim_end().to_string()
    }

    /// Read a dot-terminated listing after its status line
    pub fn read_listing(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line();
            let line = line.trim_end();
            if line == "." {
                return lines;
            }
            lines.push(line.to_string());
        }
    }

    /// Read until the server closes the connection
    pub fn read_to_end(&mut self) -> String {
        let mut rest = String::new();
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) | Err(_) => return rest,
                Ok(_) => rest.push_str(&line),
            }
        }
    }
}
