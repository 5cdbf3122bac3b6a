//! Stored messages and the flat mailbox file format

use chrono::{DateTime, Local};

/// Every message in a mailbox file starts with a line carrying this prefix
pub const ENVELOPE_PREFIX: &str = "From <";

/// One stored mail item: its envelope line and its CRLF-terminated body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    envelope: String,
    body: String,
    deleted: bool,
}

impl Message {
    pub fn new(envelope: String, body: String) -> Self {
        Self {
            envelope,
            body,
            deleted: false,
        }
    }

    /// The `From <sender> <timestamp>` line, CRLF included
    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Size of the body in octets
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Hex MD5 digest of the body bytes, used as the POP3 unique id
    pub fn uid(&self) -> String {
        format!("{:x}", md5::compute(self.body.as_bytes()))
    }

    /// Body lines, each with its CRLF
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body.split_inclusive('\n')
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub fn unmark_deleted(&mut self) {
        self.deleted = false;
    }
}

/// Build the envelope line for mail from `sender` received at `at`
pub fn envelope_line(sender: &str, at: DateTime<Local>) -> String {
    format!(
        "{ENVELOPE_PREFIX}{sender}> {}\r\n",
        at.format("%a %b %e %H:%M:%S %Y")
    )
}

fn is_envelope(line: &str) -> bool {
    line.starts_with(ENVELOPE_PREFIX)
}

/// Re-terminate a raw file line with CRLF, whatever ending it had
fn normalize(line: &str) -> String {
    let bare = line.strip_suffix('\n').unwrap_or(line);
    let bare = bare.strip_suffix('\r').unwrap_or(bare);
    format!("{bare}\r\n")
}

/// Split mailbox file contents into messages.
///
/// Text before the first envelope line does not belong to any message and
/// is dropped. Everything after the last envelope is the last message.
pub fn parse_mailbox(contents: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<(String, String)> = None;

    for raw in contents.split_inclusive('\n') {
        let line = normalize(raw);
        if is_envelope(&line) {
            if let Some((envelope, body)) = current.take() {
                messages.push(Message::new(envelope, body));
            }
            current = Some((line, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(&line);
        }
    }

    if let Some((envelope, body)) = current {
        messages.push(Message::new(envelope, body));
    }

    messages
}

/// Everything from the envelope of message number `loaded + 1` onward.
///
/// This is mail delivered after a snapshot of `loaded` messages was taken.
/// Relies on deliveries only ever appending whole messages to the end of
/// the file.
pub fn tail_after(contents: &str, loaded: usize) -> String {
    let mut seen = 0;
    let mut tail = String::new();

    for raw in contents.split_inclusive('\n') {
        if is_envelope(raw) {
            seen += 1;
        }
        if seen > loaded {
            tail.push_str(&normalize(raw));
        }
    }

    tail
}
