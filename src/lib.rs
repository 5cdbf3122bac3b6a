//! # mboxd
//!
//! A pair of small mail servers sharing one directory of flat mailbox
//! files: an SMTP server that delivers into them and a POP3 server that
//! reads and deletes from them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mboxd::mailbox::MailboxStore;
//! use mboxd::server::Server;
//! use mboxd::smtp::SmtpService;
//! use std::net::TcpListener;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let store = Arc::new(MailboxStore::open("mailboxes").unwrap());
//! let server = Server::new(SmtpService::new("localhost", store));
//! let registry = server.registry();
//!
//! let listener = TcpListener::bind("127.0.0.1:2500").unwrap();
//! let handle = thread::spawn(move || server.serve(listener));
//!
//! // Clients deliver to <user>@localhost for every <user>.mbox ...
//!
//! registry.shutdown();
//! handle.join().unwrap().unwrap();
//! ```
//!
//! ## Mailbox files
//!
//! Each local user owns `<user>.mbox` in the mailbox directory. Messages
//! are stored one after another, each introduced by an envelope line
//! `From <sender> <date>`. Every line is CRLF-terminated. The set of users
//! is fixed when the directory is opened.
//!
//! ## Supported SMTP commands
//!
//! - `HELO` - Identify the client
//! - `MAIL FROM` - Specify the sender's address
//! - `RCPT TO` - Specify a local recipient (`<user>@localhost`)
//! - `DATA` - Send the message content
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//!
//! Enabling the `ehlo` feature also allows the `EHLO` command.
//!
//! ## Supported POP3 commands
//!
//! `USER`, `PASS`, `STAT`, `LIST`, `UIDL`, `RETR`, `DELE`, `RSET`, `NOOP`
//! and `QUIT`. Deletions take effect on `QUIT`; mail delivered while a
//! POP3 session is open is kept.
//!
//! ## Notes
//!
//! - Message content is stored and returned as is: no dot-stuffing on
//!   either side.
//! - One password opens every mailbox.
//! - SSL/TLS connection is not supported.
//! - Mail relay is not supported.

pub mod cli;
pub mod error;
pub mod framing;
pub mod logging;
pub mod mailbox;
pub mod pop3;
pub mod server;
pub mod smtp;

pub use error::ServerError;
pub use mailbox::{MailboxStore, Message, StoreError};
pub use pop3::{Pop3Error, Pop3Service};
pub use server::{ConnectionRegistry, Server};
pub use smtp::{SmtpError, SmtpService};
