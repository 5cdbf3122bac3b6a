//! Implementation of POP3 commands

use crate::framing;
use crate::mailbox::MailboxStore;
use crate::pop3::error::Pop3Error;
use crate::pop3::response::Pop3Response;
use crate::pop3::session::{Pop3Session, Pop3State, Pop3Verb};

use std::sync::Arc;
use tracing::{debug, info};

/// A recognized command line with its raw argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop3Command {
    User(String),
    Pass(String),
    Stat,
    /// Empty argument lists every message
    List(String),
    /// Empty argument lists every message
    Uidl(String),
    Retr(String),
    Dele(String),
    Rset,
    Noop,
    Quit,
}

impl Pop3Command {
    /// Recognize a command line by its four-byte verb
    pub fn parse(line: &str) -> Result<Self, Pop3Error> {
        let verb = framing::verb(line).ok_or(Pop3Error::NotSupported)?;
        let argument = framing::argument(line).to_string();

        match verb.as_str() {
            "USER" => Ok(Pop3Command::User(argument)),
            "PASS" => Ok(Pop3Command::Pass(argument)),
            "STAT" => Ok(Pop3Command::Stat),
            "LIST" => Ok(Pop3Command::List(argument)),
            "UIDL" => Ok(Pop3Command::Uidl(argument)),
            "RETR" => Ok(Pop3Command::Retr(argument)),
            "DELE" => Ok(Pop3Command::Dele(argument)),
            "RSET" => Ok(Pop3Command::Rset),
            "NOOP" => Ok(Pop3Command::Noop),
            "QUIT" => Ok(Pop3Command::Quit),
            _ => Err(Pop3Error::NotSupported),
        }
    }

    /// Row of the session transition table this command falls under
    pub fn verb(&self) -> Pop3Verb {
        match self {
            Pop3Command::User(_) => Pop3Verb::User,
            Pop3Command::Pass(_) => Pop3Verb::Pass,
            Pop3Command::Stat => Pop3Verb::Stat,
            Pop3Command::List(_) => Pop3Verb::List,
            Pop3Command::Uidl(_) => Pop3Verb::Uidl,
            Pop3Command::Retr(_) => Pop3Verb::Retr,
            Pop3Command::Dele(_) => Pop3Verb::Dele,
            Pop3Command::Rset => Pop3Verb::Rset,
            Pop3Command::Noop => Pop3Verb::Noop,
            Pop3Command::Quit => Pop3Verb::Quit,
        }
    }
}

/// Handles POP3 commands and returns appropriate responses
#[derive(Debug, Clone)]
pub struct Pop3CommandHandler {
    password: String,
    store: Arc<MailboxStore>,
}

impl Pop3CommandHandler {
    /// Create a new command handler accepting `password` for every mailbox
    pub fn new(password: &str, store: Arc<MailboxStore>) -> Self {
        Self {
            password: password.to_owned(),
            store,
        }
    }

    /// Process a command line and return a response
    pub fn process_command(
        &self,
        line: &str,
        session: &mut Pop3Session,
    ) -> Result<Pop3Response, Pop3Error> {
        let command = Pop3Command::parse(line)?;
        session.require(command.verb())?;

        match command {
            Pop3Command::User(name) => self.handle_user(name, session),
            Pop3Command::Pass(secret) => self.handle_pass(&secret, session),
            Pop3Command::Stat => self.handle_stat(session),
            Pop3Command::List(argument) => handle_list(&argument, session),
            Pop3Command::Uidl(argument) => handle_uidl(&argument, session),
            Pop3Command::Retr(argument) => handle_retr(&argument, session),
            Pop3Command::Dele(argument) => {
                let n = session.delete(&argument)?;
                Ok(Pop3Response::ok(&format!("message {n} deleted")))
            }
            Pop3Command::Rset => {
                session.reset();
                Ok(Pop3Response::ok(""))
            }
            Pop3Command::Noop => Ok(Pop3Response::ok("")),
            Pop3Command::Quit => self.handle_quit(session),
        }
    }

    /// Handle USER command
    fn handle_user(
        &self,
        name: String,
        session: &mut Pop3Session,
    ) -> Result<Pop3Response, Pop3Error> {
        if name.is_empty() {
            return Err(Pop3Error::Syntax("USER requires a name".to_string()));
        }
        if !self.store.has_mailbox(&name) {
            return Err(Pop3Error::UnknownMailbox(name));
        }

        let response = Pop3Response::ok(&format!("{name} is a valid mailbox"));
        session.set_user(name)?;
        Ok(response)
    }

    /// Handle PASS command
    fn handle_pass(
        &self,
        secret: &str,
        session: &mut Pop3Session,
    ) -> Result<Pop3Response, Pop3Error> {
        let user = session.user.clone().unwrap_or_default();
        if secret != self.password {
            debug!(user = %user, "Authentication failed");
            return Err(Pop3Error::InvalidPassword);
        }

        let messages = self.store.load(&user)?;
        let count = messages.len();
        session.authenticate(messages)?;
        info!(user = %user, count, "Maildrop opened");

        Ok(Pop3Response::ok(&format!(
            "{user}'s maildrop has {count} messages"
        )))
    }

    /// Handle STAT command: reload the mailbox, dropping uncommitted
    /// deletions and picking up mail delivered since the last load
    fn handle_stat(&self, session: &mut Pop3Session) -> Result<Pop3Response, Pop3Error> {
        let user = session.user.clone().unwrap_or_default();
        session.refresh(self.store.load(&user)?);

        let (count, octets) = session.stat();
        Ok(Pop3Response::ok(&format!("{count} {octets}")))
    }

    /// Handle QUIT command, committing deletions when in TRANSACTION
    fn handle_quit(&self, session: &mut Pop3Session) -> Result<Pop3Response, Pop3Error> {
        let signoff = match session.user.as_deref() {
            Some(user) => format!("{user} POP3 server signing off"),
            None => "POP3 server signing off".to_string(),
        };

        if session.state != Pop3State::Transaction {
            return Ok(Pop3Response::ok(&signoff).closing());
        }

        let user = session.user.clone().unwrap_or_default();
        let messages = session.finish();
        let left = self.store.commit(&user, &messages)?;
        info!(user = %user, left, removed = messages.len() - left, "Maildrop updated");

        let message = if left == 0 {
            format!("{signoff} (maildrop empty)")
        } else {
            format!("{signoff} ({left} messages left)")
        };
        Ok(Pop3Response::ok(&message).closing())
    }
}

/// Handle LIST command
fn handle_list(argument: &str, session: &Pop3Session) -> Result<Pop3Response, Pop3Error> {
    if !argument.is_empty() {
        let (n, message) = session.message(argument)?;
        return Ok(Pop3Response::ok(&format!("{n} {}", message.size())));
    }

    let (count, octets) = session.stat();
    let lines = session
        .live()
        .map(|(n, message)| format!("{n} {}", message.size()))
        .collect();
    Ok(Pop3Response::multiline(
        &format!("{count} messages ({octets} octets)"),
        lines,
    ))
}

/// Handle UIDL command
fn handle_uidl(argument: &str, session: &Pop3Session) -> Result<Pop3Response, Pop3Error> {
    if !argument.is_empty() {
        let (n, message) = session.message(argument)?;
        return Ok(Pop3Response::ok(&format!("{n} {}", message.uid())));
    }

    let lines = session
        .live()
        .map(|(n, message)| format!("{n} {}", message.uid()))
        .collect();
    Ok(Pop3Response::multiline("", lines))
}

/// Handle RETR command
fn handle_retr(argument: &str, session: &Pop3Session) -> Result<Pop3Response, Pop3Error> {
    let (_, message) = session.message(argument)?;
    let lines = message
        .lines()
        .map(|line| line.trim_end_matches(['\r', '\n']).to_string())
        .collect();
    Ok(Pop3Response::multiline(
        &format!("{} octets", message.size()),
        lines,
    ))
}
