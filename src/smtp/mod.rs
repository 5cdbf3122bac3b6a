//! SMTP delivery agent

pub mod commands;
pub mod error;
pub mod response;
pub mod server;
pub mod session;

pub use commands::{SmtpCommand, SmtpCommandHandler};
pub use error::SmtpError;
pub use response::SmtpResponse;
pub use server::{SmtpConnection, SmtpService};
pub use session::{Delivery, SmtpSession, SmtpState, SmtpVerb};
