//! Flat per-user mailbox files

pub mod message;
pub mod store;

pub use message::Message;
pub use store::{MAILBOX_SUFFIX, MailboxStore, StoreError};
