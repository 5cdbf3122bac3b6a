//! Error types for the POP3 server

use crate::mailbox::StoreError;
use crate::pop3::response::Pop3Response;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Pop3Error {
    #[error("Bad sequence of commands: {0}")]
    BadSequence(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("No such message")]
    NoSuchMessage,

    #[error("Message {0} already deleted")]
    AlreadyDeleted(usize),

    #[error("Unknown mailbox {0}")]
    UnknownMailbox(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Command not supported")]
    NotSupported,

    #[error("Mailbox store error: {0}")]
    Store(#[from] StoreError),
}

impl Pop3Error {
    /// Text of the `-ERR` reply; details carried by the error stay in logs
    pub fn to_response_message(&self) -> String {
        match self {
            Pop3Error::BadSequence(_) => "Bad sequence of commands".to_string(),
            Pop3Error::Syntax(_) => "Syntax error in parameters or arguments".to_string(),
            Pop3Error::NoSuchMessage => "no such message".to_string(),
            Pop3Error::AlreadyDeleted(n) => format!("message {n} already deleted"),
            Pop3Error::UnknownMailbox(user) => {
                format!("Sorry, never heard of mailbox for {user} here")
            }
            Pop3Error::InvalidPassword => "invalid password".to_string(),
            Pop3Error::NotSupported => "Not supported".to_string(),
            Pop3Error::Store(_) => "Mailbox unavailable".to_string(),
        }
    }

    pub fn to_response(&self) -> Pop3Response {
        Pop3Response::err(&self.to_response_message())
    }
}
