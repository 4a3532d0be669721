//! Network strategies: send over SMTP or save to IMAP Drafts.

mod drafts;
mod smtp;
mod tls;

use std::time::Duration;

pub use drafts::{
    DRAFTS_FOLDER, DraftError, DraftSession, DraftStore, ImapDraftSession, ImapDraftStore,
    SaveDraftStrategy,
};
pub use smtp::{
    LettreConnector, LettreSession, Security, SendError, SendStrategy, SmtpConnector, SmtpSession,
};

use crate::compose::ComposeError;
use crate::retry::{Categorized, RetryError};

/// Errors raised by either strategy.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The message could not be rendered.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Connecting or logging in to the SMTP server failed.
    #[error("Failed to connect to SMTP server due to {cat}. Details: {0}", cat = .0.category())]
    Connect(SendError),

    /// Transmission failed permanently.
    #[error(transparent)]
    Send(#[from] RetryError<SendError>),

    /// Saving the draft failed.
    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl Categorized for TransportError {
    fn category(&self) -> &'static str {
        match self {
            Self::Compose(err) => err.category(),
            Self::Connect(err) => err.category(),
            Self::Send(err) => err.category(),
            Self::Draft(err) => err.category(),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Attempts the transmission took.
    pub attempts: u32,
    /// Wall-clock time spent in the retry loop.
    pub elapsed: Duration,
}

impl Delivery {
    /// Elapsed time in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
