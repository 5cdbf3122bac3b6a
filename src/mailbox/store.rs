//! File-backed mailbox store shared by every session

use crate::mailbox::message::{Message, envelope_line, parse_mailbox, tail_after};

use chrono::Local;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// File name suffix of every mailbox in the mailbox directory
pub const MAILBOX_SUFFIX: &str = ".mbox";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot read mailbox directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No mailbox for {0}")]
    UnknownMailbox(String),
}

/// The set of local mailboxes and the lock that serializes access to them.
///
/// A single lock covers every mailbox file: loads, appends and commits are
/// totally ordered across all users and both protocols.
#[derive(Debug)]
pub struct MailboxStore {
    dir: PathBuf,
    mailboxes: HashSet<String>,
    lock: Mutex<()>,
}

impl MailboxStore {
    /// Open the mailbox directory and record the mailbox files it holds.
    ///
    /// The set of known mailboxes is fixed from here on.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let unreadable = |source| StoreError::DirectoryUnreadable {
            path: dir.clone(),
            source,
        };

        let mut mailboxes = HashSet::new();
        for entry in fs::read_dir(&dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            mailboxes.insert(entry.file_name().to_string_lossy().into_owned());
        }

        debug!(dir = %dir.display(), count = mailboxes.len(), "Mailbox directory scanned");

        Ok(Self {
            dir,
            mailboxes,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `user` has a mailbox file (`<user>.mbox`)
    pub fn has_mailbox(&self, user: &str) -> bool {
        self.mailboxes.contains(&format!("{user}{MAILBOX_SUFFIX}"))
    }

    /// Read and parse the user's mailbox into its messages, oldest first
    pub fn load(&self, user: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.mailbox_path(user)?;
        let _guard = self.exclusive();

        let contents = read_mailbox(&path)?;
        let messages = parse_mailbox(&contents);
        debug!(user, count = messages.len(), "Mailbox loaded");
        Ok(messages)
    }

    /// Append one message from `sender` to the user's mailbox, stamped now
    pub fn append(&self, user: &str, sender: &str, body: &str) -> Result<(), StoreError> {
        let path = self.mailbox_path(user)?;
        let envelope = envelope_line(sender, Local::now());
        let _guard = self.exclusive();

        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;
        file.write_all(envelope.as_bytes()).map_err(io_error)?;
        file.write_all(body.as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        debug!(user, sender, bytes = body.len(), "Message appended");
        Ok(())
    }

    /// Rewrite the user's mailbox without the messages marked deleted.
    ///
    /// `messages` is the snapshot returned by [`load`](Self::load), with
    /// deletion marks applied. Mail appended to the file after that
    /// snapshot was taken is kept, after the surviving messages. Returns
    /// the number of messages of the snapshot that survive.
    pub fn commit(&self, user: &str, messages: &[Message]) -> Result<usize, StoreError> {
        let path = self.mailbox_path(user)?;
        let _guard = self.exclusive();

        let tail = tail_after(&read_mailbox(&path)?, messages.len());

        let mut contents = String::new();
        let mut survivors = 0;
        for message in messages.iter().filter(|m| !m.is_deleted()) {
            contents.push_str(message.envelope());
            contents.push_str(message.body());
            survivors += 1;
        }
        contents.push_str(&tail);

        fs::write(&path, contents).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(
            user,
            survivors,
            removed = messages.len() - survivors,
            tail_bytes = tail.len(),
            "Mailbox committed"
        );
        Ok(survivors)
    }

    fn mailbox_path(&self, user: &str) -> Result<PathBuf, StoreError> {
        if !self.has_mailbox(user) {
            return Err(StoreError::UnknownMailbox(user.to_owned()));
        }
        Ok(self.dir.join(format!("{user}{MAILBOX_SUFFIX}")))
    }

    // The lock guards no data, so a panic while holding it leaves nothing
    // inconsistent behind.
    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_mailbox(path: &Path) -> Result<String, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
