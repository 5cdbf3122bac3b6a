//! SMTP transaction state

use crate::smtp::error::SmtpError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpState {
    /// Connected, no HELO yet
    #[default]
    Initial,
    /// HELO accepted, or the last transaction finished
    Greeted,
    /// MAIL accepted
    SenderReceived,
    /// At least one RCPT accepted
    RecipientsReceived,
    /// DATA accepted; every line is content until the lone "."
    Receiving,
}

/// Command verbs the transition table knows about. EHLO shares HELO's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpVerb {
    Helo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
}

impl SmtpState {
    /// Transition table: whether `verb` may be issued in this state
    pub fn permits(self, verb: SmtpVerb) -> bool {
        use SmtpState::*;

        match verb {
            SmtpVerb::Helo => matches!(self, Initial | Greeted),
            SmtpVerb::Mail => self == Greeted,
            SmtpVerb::Rcpt => matches!(self, SenderReceived | RecipientsReceived),
            SmtpVerb::Data => self == RecipientsReceived,
            SmtpVerb::Rset | SmtpVerb::Noop => self != Initial,
            SmtpVerb::Quit => true,
        }
    }
}

/// A finished mail transaction, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sender: String,
    /// Local user names, each once, in the order first accepted
    pub recipients: Vec<String>,
    /// CRLF-terminated content lines
    pub content: String,
}

/// Per-connection SMTP state: where the client is in the command sequence
/// and what the current transaction has collected
#[derive(Debug, Default)]
pub struct SmtpSession {
    pub state: SmtpState,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub content: String,
    /// Domain given with the last HELO; survives RSET
    pub helo_domain: Option<String>,
}

impl SmtpSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&self, verb: SmtpVerb) -> Result<(), SmtpError> {
        if self.state.permits(verb) {
            return Ok(());
        }
        Err(SmtpError::BadSequence(format!(
            "{verb:?} not allowed in state {:?}",
            self.state
        )))
    }

    /// Abort the transaction (RSET)
    pub fn reset(&mut self) -> Result<(), SmtpError> {
        self.require(SmtpVerb::Rset)?;
        self.abort_transaction();
        Ok(())
    }

    /// Drop the transaction without delivering it (QUIT during DATA)
    pub fn abandon(&mut self) {
        self.abort_transaction();
    }

    fn abort_transaction(&mut self) {
        self.state = SmtpState::Greeted;
        self.sender = None;
        self.recipients.clear();
        self.content.clear();
    }

    /// HELO: start over with a clean transaction
    pub fn greet(&mut self, domain: String) -> Result<(), SmtpError> {
        self.require(SmtpVerb::Helo)?;
        self.helo_domain = Some(domain);
        self.abort_transaction();
        Ok(())
    }

    pub fn set_sender(&mut self, sender: String) -> Result<(), SmtpError> {
        self.require(SmtpVerb::Mail)?;
        self.sender = Some(sender);
        self.state = SmtpState::SenderReceived;
        Ok(())
    }

    /// Add a local recipient.
    ///
    /// A recipient already in the list is accepted again without being
    /// added twice; the return value tells whether it was new.
    pub fn add_recipient(&mut self, user: String) -> Result<bool, SmtpError> {
        self.require(SmtpVerb::Rcpt)?;
        self.state = SmtpState::RecipientsReceived;

        if self.recipients.contains(&user) {
            return Ok(false);
        }
        self.recipients.push(user);
        Ok(true)
    }

    pub fn start_data_mode(&mut self) -> Result<(), SmtpError> {
        self.require(SmtpVerb::Data)?;
        self.content.clear();
        self.state = SmtpState::Receiving;
        Ok(())
    }

    pub fn in_data_mode(&self) -> bool {
        self.state == SmtpState::Receiving
    }

    /// Append one content line, terminator included
    pub fn add_data_line(&mut self, line: &str) {
        self.content.push_str(line);
    }

    /// Hand back the completed transaction and return to the post-HELO
    /// state
    pub fn finish_data_collection(&mut self) -> Result<Delivery, SmtpError> {
        if !self.in_data_mode() {
            return Err(SmtpError::BadSequence("no DATA in progress".to_string()));
        }

        let delivery = Delivery {
            sender: self.sender.take().unwrap_or_default(),
            recipients: std::mem::take(&mut self.recipients),
            content: std::mem::take(&mut self.content),
        };
        self.abort_transaction();
        Ok(delivery)
    }
}
