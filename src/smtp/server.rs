//! SMTP server implementation

use crate::mailbox::MailboxStore;
use crate::server::{Reply, Service, Session};
use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

use std::sync::Arc;
use tracing::{debug, error};

/// SMTP service delivering accepted mail into the mailbox store
#[derive(Debug, Clone)]
pub struct SmtpService {
    /// Server hostname
    hostname: String,
    store: Arc<MailboxStore>,
}

impl SmtpService {
    /// Create a new SMTP service
    pub fn new(hostname: &str, store: Arc<MailboxStore>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            store,
        }
    }
}

impl Service for SmtpService {
    type Session = SmtpConnection;

    const NAME: &'static str = "SMTP";

    fn new_session(&self) -> SmtpConnection {
        SmtpConnection {
            handler: SmtpCommandHandler::new(&self.hostname, Arc::clone(&self.store)),
            session: SmtpSession::new(),
        }
    }

    fn greeting(&self) -> String {
        SmtpResponse::greeting(&self.hostname).format()
    }

    fn oversize_reply(&self) -> String {
        SmtpResponse::too_much_data().format()
    }

    fn shutdown_notice(&self) -> String {
        SmtpResponse::service_unavailable(&self.hostname).format()
    }
}

/// State of one SMTP client connection
#[derive(Debug)]
pub struct SmtpConnection {
    handler: SmtpCommandHandler,
    session: SmtpSession,
}

impl Session for SmtpConnection {
    fn handle_line(&mut self, line: &str) -> Reply {
        let response = match self.handler.process_line(line, &mut self.session) {
            Ok(Some(response)) => response,
            Ok(None) => return Reply::Silent,
            Err(e) => {
                match e {
                    SmtpError::Store(_) => error!("{e}"),
                    _ => debug!("{e}"),
                }
                e.to_response()
            }
        };

        if response.is_closing() {
            Reply::Close(response.format())
        } else {
            Reply::Send(response.format())
        }
    }
}
