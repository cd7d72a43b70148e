use std::fmt::Display;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the ledger, the node registry and the operations built
/// on top of them.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was missing or empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// A node with the same url is already registered.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A storage mutation failed and was rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The node list could not be read.
    #[error("registry error: {0}")]
    Registry(String),

    /// A call to a peer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    pub fn persistence(err: impl Display) -> Self {
        Error::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
