//! POP3 response handling

/// A `+OK`/`-ERR` status line, optionally followed by a multi-line body
/// ended by a lone `.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pop3Response {
    pub ok: bool,
    pub message: String,
    /// Body lines, without terminators
    pub lines: Option<Vec<String>>,
    closing: bool,
}

impl Pop3Response {
    /// `+OK` with an optional message
    pub fn ok(message: &str) -> Self {
        Self {
            ok: true,
            message: message.to_owned(),
            lines: None,
            closing: false,
        }
    }

    /// `-ERR` with a message
    pub fn err(message: &str) -> Self {
        Self {
            ok: false,
            message: message.to_owned(),
            lines: None,
            closing: false,
        }
    }

    /// `+OK` followed by a dot-terminated listing
    pub fn multiline(message: &str, lines: Vec<String>) -> Self {
        Self {
            lines: Some(lines),
            ..Self::ok(message)
        }
    }

    /// Sent on connect
    pub fn greeting(hostname: &str) -> Self {
        Self::ok(&format!("POP3 server ready [{hostname}]"))
    }

    /// Sent to every open connection when the server shuts down
    pub fn service_unavailable(hostname: &str) -> Self {
        Self::err(&format!(
            "[{hostname}] Service not available, closing transmission channel"
        ))
    }

    /// Sent when a line overflows the connection buffer
    pub fn too_much_data() -> Self {
        Self::err("Too much mail data")
    }

    /// Mark the connection to be closed once this response is sent
    pub fn closing(mut self) -> Self {
        self.closing = true;
        self
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> String {
        let status = if self.ok { "+OK" } else { "-ERR" };
        let mut result = if self.message.is_empty() {
            format!("{status}\r\n")
        } else {
            format!("{status} {}\r\n", self.message)
        };

        if let Some(ref lines) = self.lines {
            for line in lines {
                result.push_str(line);
                result.push_str("\r\n");
            }
            result.push_str(".\r\n");
        }
        result
    }
}
