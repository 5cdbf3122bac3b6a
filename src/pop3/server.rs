//! POP3 server implementation

use crate::mailbox::MailboxStore;
use crate::pop3::commands::Pop3CommandHandler;
use crate::pop3::error::Pop3Error;
use crate::pop3::response::Pop3Response;
use crate::pop3::session::{Pop3Session, Pop3State};
use crate::server::{Reply, Service, Session};

use std::sync::Arc;
use tracing::{debug, error};

/// POP3 service reading mail out of the mailbox store
#[derive(Debug, Clone)]
pub struct Pop3Service {
    hostname: String,
    password: String,
    store: Arc<MailboxStore>,
}

impl Pop3Service {
    /// Create a new POP3 service; `password` opens every mailbox
    pub fn new(hostname: &str, password: &str, store: Arc<MailboxStore>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            password: password.to_owned(),
            store,
        }
    }
}

impl Service for Pop3Service {
    type Session = Pop3Connection;

    const NAME: &'static str = "POP3";

    fn new_session(&self) -> Pop3Connection {
        Pop3Connection {
            handler: Pop3CommandHandler::new(&self.password, Arc::clone(&self.store)),
            session: Pop3Session::new(),
        }
    }

    fn greeting(&self) -> String {
        Pop3Response::greeting(&self.hostname).format()
    }

    fn oversize_reply(&self) -> String {
        Pop3Response::too_much_data().format()
    }

    fn shutdown_notice(&self) -> String {
        Pop3Response::service_unavailable(&self.hostname).format()
    }
}

/// State of one POP3 client connection
#[derive(Debug)]
pub struct Pop3Connection {
    handler: Pop3CommandHandler,
    session: Pop3Session,
}

impl Session for Pop3Connection {
    fn handle_line(&mut self, line: &str) -> Reply {
        let response = match self.handler.process_command(line, &mut self.session) {
            Ok(response) => response,
            Err(e) => {
                match e {
                    Pop3Error::Store(_) => error!("{e}"),
                    _ => debug!("{e}"),
                }
                e.to_response()
            }
        };

        // UPDATE is terminal even when the commit failed
        if response.is_closing() || self.session.state == Pop3State::Update {
            Reply::Close(response.format())
        } else {
            Reply::Send(response.format())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> Pop3Service {
        fs::write(
            dir.path().join("alice.mbox"),
            "From <bob@localhost> Mon Jan  6 10:00:00 2025\r\nhi\r\n",
        )
        .unwrap();
        let store = Arc::new(MailboxStore::open(dir.path()).unwrap());
        Pop3Service::new("localhost", "secret", store)
    }

    #[test]
    fn test_service_texts() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);

        assert_eq!(service.greeting(), "+OK POP3 server ready [localhost]\r\n");
        assert_eq!(service.oversize_reply(), "-ERR Too much mail data\r\n");
        assert!(service.shutdown_notice().starts_with("-ERR [localhost] "));
    }

    #[test]
    fn test_connection_replies() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = service(&dir).new_session();

        assert_eq!(
            conn.handle_line("USER alice\r\n"),
            Reply::Send("+OK alice is a valid mailbox\r\n".to_string())
        );
        assert_eq!(
            conn.handle_line("PASS secret\r\n"),
            Reply::Send("+OK alice's maildrop has 1 messages\r\n".to_string())
        );
        assert_eq!(
            conn.handle_line("RETR 1\r\n"),
            Reply::Send("+OK 4 octets\r\nhi\r\n.\r\n".to_string())
        );
        assert_eq!(
            conn.handle_line("QUIT\r\n"),
            Reply::Close("+OK alice POP3 server signing off (1 messages left)\r\n".to_string())
        );
    }

    #[test]
    fn test_quit_before_login_closes() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = service(&dir).new_session();

        assert_eq!(
            conn.handle_line("QUIT\r\n"),
            Reply::Close("+OK POP3 server signing off\r\n".to_string())
        );
    }
}
