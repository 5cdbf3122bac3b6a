//! SMTP replies

/// A numbered reply line, optionally continued over more lines (`250-...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    pub code: u16,
    pub text: String,
    /// Lines after the first; the last one carries the final-line marker
    pub continuation: Vec<String>,
}

impl SmtpResponse {
    pub fn new(code: u16, text: &str) -> Self {
        Self {
            code,
            text: text.to_owned(),
            continuation: Vec::new(),
        }
    }

    pub fn with_lines(code: u16, text: &str, lines: Vec<String>) -> Self {
        Self {
            continuation: lines,
            ..Self::new(code, text)
        }
    }

    /// 250 OK
    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    /// 220, sent on connect
    pub fn greeting(hostname: &str) -> Self {
        Self::new(220, &format!("{hostname} Service ready"))
    }

    /// 250 reply to HELO
    pub fn helo(hostname: &str) -> Self {
        Self::new(250, hostname)
    }

    /// 250 reply to EHLO, listing extensions
    #[cfg(feature = "ehlo")]
    pub fn ehlo(hostname: &str) -> Self {
        Self::with_lines(250, hostname, vec!["HELP".to_owned()])
    }

    /// 354, sent when DATA starts
    pub fn data_start() -> Self {
        Self::new(354, "Start mail input; end with <CRLF>.<CRLF>")
    }

    /// 221, sent in reply to QUIT
    pub fn quit(hostname: &str) -> Self {
        Self::new(221, &format!("{hostname} Service closing transmission channel"))
    }

    /// 421, sent to every open connection when the server shuts down
    pub fn service_unavailable(hostname: &str) -> Self {
        Self::new(
            421,
            &format!("{hostname} Service not available, closing transmission channel"),
        )
    }

    /// 552, sent when a line overflows the connection buffer
    pub fn too_much_data() -> Self {
        Self::new(552, "Too much mail data")
    }

    /// Wire form: every line but the last has `-` after the code
    pub fn format(&self) -> String {
        let mut lines = std::iter::once(&self.text)
            .chain(&self.continuation)
            .peekable();
        let mut wire = String::new();

        while let Some(line) = lines.next() {
            let marker = if lines.peek().is_some() { '-' } else { ' ' };
            wire.push_str(&format!("{}{marker}{line}\r\n", self.code));
        }
        wire
    }

    /// Whether the connection closes after this response
    pub fn is_closing(&self) -> bool {
        self.code == 221
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_and_helo() {
        assert_eq!(
            SmtpResponse::greeting("localhost").format(),
            "220 localhost Service ready\r\n"
        );
        assert_eq!(SmtpResponse::helo("mx.test").format(), "250 mx.test\r\n");
    }

    #[cfg(feature = "ehlo")]
    #[test]
    fn test_ehlo() {
        assert_eq!(
            SmtpResponse::ehlo("localhost").format(),
            "250-localhost\r\n250 HELP\r\n"
        );
    }

    #[test]
    fn test_fixed_texts() {
        assert_eq!(SmtpResponse::ok().format(), "250 OK\r\n");
        assert_eq!(
            SmtpResponse::data_start().format(),
            "354 Start mail input; end with <CRLF>.<CRLF>\r\n"
        );
        assert_eq!(
            SmtpResponse::too_much_data().format(),
            "552 Too much mail data\r\n"
        );
        assert_eq!(
            SmtpResponse::service_unavailable("localhost").format(),
            "421 localhost Service not available, closing transmission channel\r\n"
        );
    }

    #[test]
    fn test_quit_closes() {
        let response = SmtpResponse::quit("localhost");
        assert!(response.is_closing());
        assert!(!SmtpResponse::ok().is_closing());
        assert_eq!(
            response.format(),
            "221 localhost Service closing transmission channel\r\n"
        );
    }

    #[test]
    fn test_continuation_lines() {
        let response = SmtpResponse::with_lines(
            250,
            "mx.test",
            vec!["8BITMIME".to_owned(), "HELP".to_owned()],
        );
        assert_eq!(
            response.format(),
            "250-mx.test\r\n250-8BITMIME\r\n250 HELP\r\n"
        );
    }
}
