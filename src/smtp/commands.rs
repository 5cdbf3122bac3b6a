//! Implementation of SMTP commands

use crate::framing;
use crate::mailbox::MailboxStore;
use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{SmtpSession, SmtpVerb};

use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A recognized command line. Arguments are kept raw; they are validated
/// only once the command is known to be allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo(String),
    #[cfg(feature = "ehlo")]
    Ehlo(String),
    /// Text following `MAIL FROM`
    MailFrom(String),
    /// Text following `RCPT TO`
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
}

impl SmtpCommand {
    /// Recognize a command line by its four-byte verb (and sub-verb for
    /// MAIL and RCPT)
    pub fn parse(line: &str) -> Result<Self, SmtpError> {
        let verb = framing::verb(line).ok_or(SmtpError::Unrecognized)?;
        let argument = framing::argument(line);

        match verb.as_str() {
            "HELO" => Ok(SmtpCommand::Helo(argument.to_string())),
            #[cfg(feature = "ehlo")]
            "EHLO" => Ok(SmtpCommand::Ehlo(argument.to_string())),
            "MAIL" => sub_verb(argument, "FROM").map(SmtpCommand::MailFrom),
            "RCPT" => sub_verb(argument, "TO").map(SmtpCommand::RcptTo),
            "DATA" => Ok(SmtpCommand::Data),
            "RSET" => Ok(SmtpCommand::Rset),
            "NOOP" => Ok(SmtpCommand::Noop),
            "QUIT" => Ok(SmtpCommand::Quit),
            _ => Err(SmtpError::Unrecognized),
        }
    }

    /// Row of the session transition table this command falls under
    pub fn verb(&self) -> SmtpVerb {
        match self {
            SmtpCommand::Helo(_) => SmtpVerb::Helo,
            #[cfg(feature = "ehlo")]
            SmtpCommand::Ehlo(_) => SmtpVerb::Helo,
            SmtpCommand::MailFrom(_) => SmtpVerb::Mail,
            SmtpCommand::RcptTo(_) => SmtpVerb::Rcpt,
            SmtpCommand::Data => SmtpVerb::Data,
            SmtpCommand::Rset => SmtpVerb::Rset,
            SmtpCommand::Noop => SmtpVerb::Noop,
            SmtpCommand::Quit => SmtpVerb::Quit,
        }
    }
}

/// Match a fixed-width, case-insensitive sub-verb at the start of `argument`
fn sub_verb(argument: &str, expected: &str) -> Result<String, SmtpError> {
    match argument.get(..expected.len()) {
        Some(word) if word.eq_ignore_ascii_case(expected) => {
            Ok(argument[expected.len()..].to_string())
        }
        _ => Err(SmtpError::Unrecognized),
    }
}

/// The text between the first `<` and the following `>`
fn angle_path(argument: &str) -> Option<&str> {
    let start = argument.find('<')? + 1;
    let len = argument[start..].find('>')?;
    Some(&argument[start..start + len])
}

/// Handles SMTP commands and returns appropriate responses
#[derive(Debug, Clone)]
pub struct SmtpCommandHandler {
    hostname: String,
    store: Arc<MailboxStore>,
}

impl SmtpCommandHandler {
    /// Create a new command handler
    pub fn new(hostname: &str, store: Arc<MailboxStore>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            store,
        }
    }

    /// Process one line (terminator included).
    ///
    /// Returns `None` for message content lines, which get no reply. A
    /// `QUIT` line ends the session even in the middle of DATA.
    pub fn process_line(
        &self,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<Option<SmtpResponse>, SmtpError> {
        if session.in_data_mode() {
            if line.eq_ignore_ascii_case("QUIT\r\n") {
                debug!("QUIT during DATA, transaction abandoned");
                session.abandon();
                return Ok(Some(SmtpResponse::quit(&self.hostname)));
            }
            return self.handle_data_line(line, session);
        }

        self.process_command(line, session).map(Some)
    }

    /// Process a command line and return a response
    pub fn process_command(
        &self,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let command = SmtpCommand::parse(line)?;

        session.require(command.verb())?;

        match command {
            SmtpCommand::Helo(domain) => self.handle_helo(domain, session),
            #[cfg(feature = "ehlo")]
            SmtpCommand::Ehlo(domain) => {
                self.handle_helo(domain, session)?;
                Ok(SmtpResponse::ehlo(&self.hostname))
            }
            SmtpCommand::MailFrom(argument) => self.handle_mail(&argument, session),
            SmtpCommand::RcptTo(argument) => self.handle_rcpt(&argument, session),
            SmtpCommand::Data => self.handle_data(session),
            SmtpCommand::Rset => {
                session.reset()?;
                Ok(SmtpResponse::ok())
            }
            SmtpCommand::Noop => Ok(SmtpResponse::ok()),
            SmtpCommand::Quit => Ok(SmtpResponse::quit(&self.hostname)),
        }
    }

    /// Handle HELO command
    fn handle_helo(
        &self,
        domain: String,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if domain.is_empty() {
            return Err(SmtpError::InvalidSyntax(
                "HELO requires domain argument".to_string(),
            ));
        }

        session.greet(domain)?;
        Ok(SmtpResponse::helo(&self.hostname))
    }

    /// Handle MAIL command
    fn handle_mail(
        &self,
        argument: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let sender = angle_path(argument).ok_or_else(|| {
            SmtpError::InvalidSyntax("FROM address must be enclosed in angle brackets".to_string())
        })?;

        session.set_sender(sender.to_string())?;
        Ok(SmtpResponse::ok())
    }

    /// Handle RCPT command
    fn handle_rcpt(
        &self,
        argument: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let path = angle_path(argument).ok_or_else(|| {
            SmtpError::InvalidSyntax("TO address must be enclosed in angle brackets".to_string())
        })?;

        let (user, host) = path
            .split_once('@')
            .ok_or_else(|| SmtpError::MailboxUnavailable(format!("no host in <{path}>")))?;

        if !host.eq_ignore_ascii_case(&self.hostname) {
            return Err(SmtpError::MailboxUnavailable(format!(
                "relaying to {host} not supported"
            )));
        }
        if !self.store.has_mailbox(user) {
            return Err(SmtpError::MailboxUnavailable(format!("no mailbox for {user}")));
        }

        if !session.add_recipient(user.to_string())? {
            debug!(user, "Duplicate recipient");
        }
        Ok(SmtpResponse::ok())
    }

    /// Handle DATA command
    fn handle_data(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        session.start_data_mode()?;
        Ok(SmtpResponse::data_start())
    }

    /// Handle a line of message content; the lone "." ends the message and
    /// delivers it to every recipient.
    ///
    /// Every recipient is attempted. If any append fails, the first error
    /// is returned after logging who did and did not get the message.
    fn handle_data_line(
        &self,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<Option<SmtpResponse>, SmtpError> {
        if line != ".\r\n" {
            session.add_data_line(line);
            return Ok(None);
        }

        let delivery = session.finish_data_collection()?;
        let mut delivered = Vec::new();
        let mut failure = None;
        for user in &delivery.recipients {
            match self.store.append(user, &delivery.sender, &delivery.content) {
                Ok(()) => delivered.push(user.as_str()),
                Err(e) => {
                    error!(user = %user, error = %e, "Delivery failed");
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            warn!(
                sender = %delivery.sender,
                delivered = ?delivered,
                "Message only partially delivered"
            );
            return Err(e.into());
        }
        info!(
            sender = %delivery.sender,
            recipients = delivery.recipients.len(),
            bytes = delivery.content.len(),
            "Message delivered"
        );

        Ok(Some(SmtpResponse::ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::message::parse_mailbox;
    use crate::smtp::session::SmtpState;
    use std::fs;
    use tempfile::TempDir;

    fn create_handler() -> (TempDir, SmtpCommandHandler) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bob.mbox"), "").unwrap();
        fs::write(dir.path().join("carol.mbox"), "").unwrap();
        let store = Arc::new(MailboxStore::open(dir.path()).unwrap());
        (dir, SmtpCommandHandler::new("localhost", store))
    }

    fn code(
        handler: &SmtpCommandHandler,
        session: &mut SmtpSession,
        line: &str,
    ) -> String {
        match handler.process_line(line, session) {
            Ok(Some(response)) => response.code.to_string(),
            Ok(None) => String::new(),
            Err(e) => e.to_response_code().to_string(),
        }
    }

    fn mailbox(dir: &TempDir, user: &str) -> String {
        fs::read_to_string(dir.path().join(format!("{user}.mbox"))).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            SmtpCommand::parse("helo client\r\n").unwrap(),
            SmtpCommand::Helo("client".to_string())
        );
        assert_eq!(
            SmtpCommand::parse("MAIL FROM:<a@b>\r\n").unwrap(),
            SmtpCommand::MailFrom(":<a@b>".to_string())
        );
        assert_eq!(
            SmtpCommand::parse("rcpt to:<b@localhost>\r\n").unwrap(),
            SmtpCommand::RcptTo(":<b@localhost>".to_string())
        );
        assert_eq!(SmtpCommand::parse("QUIT\r\n").unwrap(), SmtpCommand::Quit);
        assert!(matches!(
            SmtpCommand::parse("MAIL TO:<a@b>\r\n"),
            Err(SmtpError::Unrecognized)
        ));
        assert!(matches!(
            SmtpCommand::parse("RCPT\r\n"),
            Err(SmtpError::Unrecognized)
        ));
        assert!(matches!(
            SmtpCommand::parse("VRFY bob\r\n"),
            Err(SmtpError::Unrecognized)
        ));
        assert!(matches!(
            SmtpCommand::parse("HI\r\n"),
            Err(SmtpError::Unrecognized)
        ));
    }

    #[test]
    fn test_angle_path() {
        assert_eq!(angle_path(":<a@b>"), Some("a@b"));
        assert_eq!(angle_path(":<>"), Some(""));
        assert_eq!(angle_path(": <a@b> SIZE=10"), Some("a@b"));
        assert_eq!(angle_path(":a@b"), None);
        assert_eq!(angle_path(":<a@b"), None);
    }

    #[test]
    fn test_helo_command() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        let response = handler
            .process_command("HELO client.local\r\n", &mut session)
            .unwrap();

        assert_eq!(response.format(), "250 localhost\r\n");
        assert_eq!(session.helo_domain, Some("client.local".to_string()));
        assert_eq!(session.state, SmtpState::Greeted);
    }

    #[test]
    fn test_helo_missing_domain() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(code(&handler, &mut session, "HELO\r\n"), "501");
        assert_eq!(code(&handler, &mut session, "HELO \r\n"), "501");
        assert_eq!(session.state, SmtpState::Initial);
    }

    #[test]
    fn test_mail_without_helo() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(code(&handler, &mut session, "MAIL FROM:<a@b>\r\n"), "503");
        assert_eq!(code(&handler, &mut session, "NOOP\r\n"), "503");
        assert_eq!(code(&handler, &mut session, "RSET\r\n"), "503");
        assert_eq!(session.state, SmtpState::Initial);
    }

    #[test]
    fn test_unknown_sub_verb_checked_before_state() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(code(&handler, &mut session, "MAIL XYZ:<a@b>\r\n"), "500");
        assert_eq!(code(&handler, &mut session, "RCPT XY:<a@b>\r\n"), "500");
    }

    #[test]
    fn test_mail_invalid_syntax() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();
        handler.process_command("HELO x\r\n", &mut session).unwrap();

        assert_eq!(code(&handler, &mut session, "MAIL FROM:a@b\r\n"), "501");
        assert_eq!(session.state, SmtpState::Greeted);

        assert_eq!(code(&handler, &mut session, "MAIL FROM:<>\r\n"), "250");
        assert_eq!(session.sender, Some(String::new()));
    }

    #[test]
    fn test_rcpt_validation() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();
        handler.process_command("HELO x\r\n", &mut session).unwrap();
        handler
            .process_command("MAIL FROM:<a@example.com>\r\n", &mut session)
            .unwrap();

        assert_eq!(code(&handler, &mut session, "RCPT TO:<nobody@localhost>\r\n"), "550");
        assert_eq!(code(&handler, &mut session, "RCPT TO:<bob@example.com>\r\n"), "550");
        assert_eq!(code(&handler, &mut session, "RCPT TO:<bob>\r\n"), "550");
        assert_eq!(code(&handler, &mut session, "RCPT TO:bob@localhost\r\n"), "501");
        assert!(session.recipients.is_empty());
        assert_eq!(session.state, SmtpState::SenderReceived);

        assert_eq!(code(&handler, &mut session, "RCPT TO:<bob@localhost>\r\n"), "250");
        assert_eq!(code(&handler, &mut session, "RCPT TO:<bob@localhost>\r\n"), "250");
        assert_eq!(code(&handler, &mut session, "RCPT TO:<carol@LOCALHOST>\r\n"), "250");
        assert_eq!(session.recipients, vec!["bob".to_string(), "carol".to_string()]);
        assert_eq!(session.state, SmtpState::RecipientsReceived);
    }

    #[test]
    fn test_full_transaction_appends_once_per_recipient() {
        let (dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        for line in [
            "HELO x\r\n",
            "MAIL FROM:<alice@example.com>\r\n",
            "RCPT TO:<bob@localhost>\r\n",
            "RCPT TO:<carol@localhost>\r\n",
            "RCPT TO:<bob@localhost>\r\n",
        ] {
            assert_eq!(code(&handler, &mut session, line), "250", "{line}");
        }
        assert_eq!(code(&handler, &mut session, "DATA\r\n"), "354");
        assert_eq!(code(&handler, &mut session, "Subject: hi\r\n"), "");
        assert_eq!(code(&handler, &mut session, "QUIT now\r\n"), "");
        assert_eq!(code(&handler, &mut session, "RSET\r\n"), "");
        assert_eq!(code(&handler, &mut session, "..\r\n"), "");
        assert_eq!(code(&handler, &mut session, ".\r\n"), "250");
        assert_eq!(session.state, SmtpState::Greeted);

        for user in ["bob", "carol"] {
            let messages = parse_mailbox(&mailbox(&dir, user));
            assert_eq!(messages.len(), 1, "{user}");
            assert!(messages[0].envelope().starts_with("From <alice@example.com> "));
            assert_eq!(
                messages[0].body(),
                "Subject: hi\r\nQUIT now\r\nRSET\r\n..\r\n"
            );
        }
    }

    #[test]
    fn test_quit_during_data_abandons_message() {
        let (dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        for line in [
            "HELO x\r\n",
            "MAIL FROM:<alice@example.com>\r\n",
            "RCPT TO:<bob@localhost>\r\n",
            "DATA\r\n",
            "Subject: hi\r\n",
        ] {
            handler.process_line(line, &mut session).unwrap();
        }

        let response = handler
            .process_line("quit\r\n", &mut session)
            .unwrap()
            .unwrap();
        assert!(response.is_closing());
        assert_eq!(response.code, 221);
        assert_eq!(session.state, SmtpState::Greeted);
        assert_eq!(mailbox(&dir, "bob"), "");
    }

    #[test]
    fn test_failed_append_still_delivers_to_others() {
        let (dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        for line in [
            "HELO x\r\n",
            "MAIL FROM:<alice@example.com>\r\n",
            "RCPT TO:<bob@localhost>\r\n",
            "RCPT TO:<carol@localhost>\r\n",
            "DATA\r\n",
            "hello\r\n",
        ] {
            handler.process_line(line, &mut session).unwrap();
        }
        fs::remove_file(dir.path().join("bob.mbox")).unwrap();
        fs::create_dir(dir.path().join("bob.mbox")).unwrap();

        assert_eq!(code(&handler, &mut session, ".\r\n"), "451");
        assert_eq!(session.state, SmtpState::Greeted);

        let messages = parse_mailbox(&mailbox(&dir, "carol"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body(), "hello\r\n");
    }

    #[test]
    fn test_data_without_rcpt() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();
        handler.process_command("HELO x\r\n", &mut session).unwrap();
        handler.process_command("MAIL FROM:<a@b>\r\n", &mut session).unwrap();

        assert_eq!(code(&handler, &mut session, "DATA\r\n"), "503");
        assert_eq!(session.state, SmtpState::SenderReceived);
    }

    #[test]
    fn test_rset_command() {
        let (dir, handler) = create_handler();
        let mut session = SmtpSession::new();
        handler.process_command("HELO x\r\n", &mut session).unwrap();
        handler.process_command("MAIL FROM:<a@b>\r\n", &mut session).unwrap();
        handler
            .process_command("RCPT TO:<bob@localhost>\r\n", &mut session)
            .unwrap();

        assert_eq!(code(&handler, &mut session, "RSET\r\n"), "250");
        assert!(session.sender.is_none());
        assert!(session.recipients.is_empty());
        assert_eq!(code(&handler, &mut session, "DATA\r\n"), "503");
        assert_eq!(mailbox(&dir, "bob"), "");
    }

    #[test]
    fn test_noop_and_quit() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        let response = handler.process_command("QUIT\r\n", &mut session).unwrap();
        assert_eq!(response.code, 221);

        handler.process_command("HELO x\r\n", &mut session).unwrap();
        assert_eq!(code(&handler, &mut session, "noop\r\n"), "250");
    }

    #[test]
    fn test_invalid_command() {
        let (_dir, handler) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(code(&handler, &mut session, "INVALID\r\n"), "500");
        assert_eq!(code(&handler, &mut session, "\r\n"), "500");
    }
}
