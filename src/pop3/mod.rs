//! POP3 retrieval agent

pub mod commands;
pub mod error;
pub mod response;
pub mod server;
pub mod session;

pub use commands::{Pop3Command, Pop3CommandHandler};
pub use error::Pop3Error;
pub use response::Pop3Response;
pub use server::{Pop3Connection, Pop3Service};
pub use session::{Pop3Session, Pop3State, Pop3Verb};
