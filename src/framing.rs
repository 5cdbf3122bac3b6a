//! Incremental CRLF line framing over a bounded connection buffer

use thiserror::Error;

/// Buffer capacity used by the SMTP and POP3 sessions
pub const MAIL_BUFFER_SIZE: usize = 8 * 1024;

const CRLF: &[u8] = b"\r\n";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FramingError {
    #[error("Line exceeds buffer capacity ({capacity} bytes)")]
    Oversize { capacity: usize },
}

/// Splits a byte stream into CRLF-terminated lines.
///
/// Bytes are appended with [`LineFramer::feed`] as they arrive from the
/// socket and complete lines are pulled off the front with
/// [`LineFramer::next_line`]. A line may arrive split across any number of
/// reads; the framer yields it only once its terminator has been seen.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    capacity: usize,
}

impl LineFramer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes that can still be fed before the buffer is full
    pub fn remaining(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    #[cfg(test)]
    fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Append newly read bytes.
    ///
    /// At most [`remaining`](Self::remaining) bytes are taken; the count
    /// accepted is returned. Fails with [`FramingError::Oversize`] when the
    /// buffer is full and holds no line terminator, in which case the caller
    /// must report the overflow and [`clear`](Self::clear) the buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, FramingError> {
        let accepted = data.len().min(self.remaining());
        self.buffer.extend_from_slice(&data[..accepted]);

        if self.buffer.len() >= self.capacity && find_crlf(&self.buffer).is_none() {
            return Err(FramingError::Oversize {
                capacity: self.capacity,
            });
        }

        Ok(accepted)
    }

    /// Remove and return the first complete line, CRLF included
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = find_crlf(&self.buffer)? + CRLF.len();
        Some(self.buffer.drain(..end).collect())
    }

    /// Discard everything buffered, returning it
    pub fn clear(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(CRLF.len()).position(|w| w == CRLF)
}

/// The dispatch token of a command line: its first four bytes, uppercased.
///
/// Dispatch is by fixed width rather than by word, so `"QUITX"` and
/// `"quit"` both yield `QUIT`. Lines shorter than four bytes have no verb.
pub fn verb(line: &str) -> Option<String> {
    let token = line.as_bytes().get(..4)?;
    if !token.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    Some(String::from_utf8_lossy(token).to_ascii_uppercase())
}

/// Text following the verb, without the separating space or line terminator
pub fn argument(line: &str) -> &str {
    let line = line.strip_suffix("\r\n").unwrap_or(line);
    line.get(4..).unwrap_or("").trim()
}
