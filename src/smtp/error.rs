//! Error types for the SMTP server

use crate::mailbox::StoreError;
use crate::smtp::response::SmtpResponse;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Command unrecognized")]
    Unrecognized,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Bad sequence of commands: {0}")]
    BadSequence(String),

    #[error("Mailbox unavailable: {0}")]
    MailboxUnavailable(String),

    #[error("Mailbox store error: {0}")]
    Store(#[from] StoreError),
}

/// Maps SMTP errors to appropriate response codes
impl SmtpError {
    pub fn to_response_code(&self) -> u16 {
        match self {
            SmtpError::Unrecognized => 500,
            SmtpError::InvalidSyntax(_) => 501,
            SmtpError::BadSequence(_) => 503,
            SmtpError::MailboxUnavailable(_) => 550,
            SmtpError::Store(_) => 451,
        }
    }

    /// Reply text sent on the wire; the detail carried by the error is for
    /// logs only
    pub fn to_response_message(&self) -> &'static str {
        match self {
            SmtpError::Unrecognized => "Syntax error, command unrecognized",
            SmtpError::InvalidSyntax(_) => "Syntax error in parameters or arguments",
            SmtpError::BadSequence(_) => "Bad sequence of commands",
            SmtpError::MailboxUnavailable(_) => "Requested action not taken: mailbox unavailable",
            SmtpError::Store(_) => "Requested action aborted: local error in processing",
        }
    }

    pub fn to_response(&self) -> SmtpResponse {
        SmtpResponse::new(self.to_response_code(), self.to_response_message())
    }
}
