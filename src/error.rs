//! Errors surfaced by the server runtime

use crate::mailbox::StoreError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
