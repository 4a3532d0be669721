//! Error types for the core library.

use thiserror::Error;

use crate::attachment::AttachmentError;
use crate::config::ConfigError;
use crate::retry::Categorized;
use crate::transport::TransportError;

/// Errors that can occur while preparing or delivering an email.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An attachment could not be read or added.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// Sending or saving the draft failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Stable name of the failure kind.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(err) => err.category(),
            Self::Attachment(err) => err.category(),
            Self::Transport(err) => err.category(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
