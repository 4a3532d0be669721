//! # emailtool-core
//!
//! Compose an email from a JSON configuration file and deliver it.
//!
//! This crate provides:
//! - Configuration loading and validation (`appsettings.json`)
//! - Attachment loading from paths or in-memory buffers
//! - Message composition and MIME rendering
//! - A bounded, immediate retry policy
//! - Two transports: SMTP send and IMAP save-to-Drafts
//!
//! ```no_run
//! # async fn example() -> emailtool_core::Result<()> {
//! let config = emailtool_core::EmailConfig::load("appsettings.json")?;
//! let outcome = emailtool_core::Mailer::default().run(&config).await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachment;
pub mod compose;
pub mod config;
mod error;
pub mod retry;
pub mod service;
pub mod transport;

pub use attachment::{AttachError, AttachmentBuilder, AttachmentError, AttachmentPart, AttachmentSink};
pub use compose::{BodyFormat, ComposeError, ComposedMessage, RenderOptions, compose};
pub use config::{
    AttachmentSource, ConfigError, DEFAULT_CONFIG_FILE, EmailConfig, EmailContent, RecipientList,
    SenderIdentity,
};
pub use error::{Error, Result};
pub use retry::{Attempted, Categorized, DEFAULT_MAX_ATTEMPTS, RetryError, RetryPolicy};
pub use service::{Mailer, Outcome, save_draft, send_email};
pub use transport::{
    DRAFTS_FOLDER, Delivery, DraftError, DraftSession, DraftStore, ImapDraftStore,
    LettreConnector, SaveDraftStrategy, Security, SendError, SendStrategy, SmtpConnector,
    SmtpSession, TransportError,
};
