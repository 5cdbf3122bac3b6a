//! POP3 session state management

use crate::mailbox::Message;
use crate::pop3::error::Pop3Error;

/// Represents the current state of a POP3 session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3State {
    /// Waiting for USER and PASS
    Authorization,
    /// Mailbox loaded - messages may be listed, read and deleted
    Transaction,
    /// QUIT received in TRANSACTION - deletions committed, session over
    Update,
}

/// Command verbs the transition table knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Verb {
    User,
    Pass,
    Stat,
    List,
    Uidl,
    Retr,
    Dele,
    Rset,
    Noop,
    Quit,
}

impl Pop3State {
    /// Transition table: whether `verb` may be issued in this state.
    ///
    /// USER and PASS further depend on whether a user name is already set.
    pub fn permits(self, verb: Pop3Verb, user_set: bool) -> bool {
        use Pop3State::*;
        use Pop3Verb::*;

        match verb {
            User => self == Authorization && !user_set,
            Pass => self == Authorization && user_set,
            Stat | List | Uidl | Retr | Dele | Rset | Noop => self == Transaction,
            Quit => matches!(self, Authorization | Transaction),
        }
    }
}

/// Manages the state and data for a single POP3 session
#[derive(Debug)]
pub struct Pop3Session {
    /// Current state of the session
    pub state: Pop3State,
    /// Mailbox owner named by USER
    pub user: Option<String>,
    /// Snapshot of the mailbox, with this session's deletion marks
    messages: Vec<Message>,
}

impl Pop3Session {
    /// Create a new POP3 session
    pub fn new() -> Self {
        Self {
            state: Pop3State::Authorization,
            user: None,
            messages: Vec::new(),
        }
    }

    pub fn require(&self, verb: Pop3Verb) -> Result<(), Pop3Error> {
        if self.state.permits(verb, self.user.is_some()) {
            Ok(())
        } else {
            Err(Pop3Error::BadSequence(format!(
                "{verb:?} not allowed in state {:?}",
                self.state
            )))
        }
    }

    /// Remember the mailbox owner; PASS is still required
    pub fn set_user(&mut self, user: String) -> Result<(), Pop3Error> {
        self.require(Pop3Verb::User)?;
        self.user = Some(user);
        Ok(())
    }

    /// Enter TRANSACTION with the freshly loaded mailbox
    pub fn authenticate(&mut self, messages: Vec<Message>) -> Result<(), Pop3Error> {
        self.require(Pop3Verb::Pass)?;
        self.messages = messages;
        self.state = Pop3State::Transaction;
        Ok(())
    }

    #[cfg(test)]
    fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replace the snapshot with a fresh load of the same mailbox.
    ///
    /// Uncommitted deletion marks are dropped along with the old snapshot.
    pub fn refresh(&mut self, fresh: Vec<Message>) {
        self.messages = fresh;
    }

    /// Message count and total octets of the messages not marked deleted
    pub fn stat(&self) -> (usize, usize) {
        self.live()
            .fold((0, 0), |(count, octets), (_, m)| (count + 1, octets + m.size()))
    }

    /// Messages not marked deleted, with their 1-based index
    pub fn live(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_deleted())
            .map(|(i, m)| (i + 1, m))
    }

    /// Parse a 1-based message number and check it names a message of the
    /// snapshot
    pub fn index(&self, argument: &str) -> Result<usize, Pop3Error> {
        let n = match argument.parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(Pop3Error::Syntax(format!(
                    "invalid message number {argument:?}"
                )));
            }
        };
        if n > self.messages.len() {
            return Err(Pop3Error::NoSuchMessage);
        }
        Ok(n)
    }

    /// The message numbered by `argument`, unless it is marked deleted
    pub fn message(&self, argument: &str) -> Result<(usize, &Message), Pop3Error> {
        let n = self.index(argument)?;
        let message = &self.messages[n - 1];
        if message.is_deleted() {
            return Err(Pop3Error::NoSuchMessage);
        }
        Ok((n, message))
    }

    /// Mark the message numbered by `argument` deleted
    pub fn delete(&mut self, argument: &str) -> Result<usize, Pop3Error> {
        let n = self.index(argument)?;
        let message = &mut self.messages[n - 1];
        if message.is_deleted() {
            return Err(Pop3Error::AlreadyDeleted(n));
        }
        message.mark_deleted();
        Ok(n)
    }

    /// Clear every deletion mark
    pub fn reset(&mut self) {
        self.messages.iter_mut().for_each(Message::unmark_deleted);
    }

    /// Enter UPDATE, handing back the snapshot to commit
    pub fn finish(&mut self) -> Vec<Message> {
        self.state = Pop3State::Update;
        std::mem::take(&mut self.messages)
    }
}

impl Default for Pop3Session {
    fn default() -> Self {
        Self::new()
    }
}
