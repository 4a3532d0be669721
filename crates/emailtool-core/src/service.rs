//! Orchestration of one run: compose, attach, then send or save a draft.

use std::fmt;

use tracing::{info, instrument};

use crate::attachment::AttachmentBuilder;
use crate::compose::{ComposedMessage, compose};
use crate::config::EmailConfig;
use crate::error::Result;
use crate::transport::{
    Delivery, DraftStore, ImapDraftStore, LettreConnector, SaveDraftStrategy, SendStrategy,
    SmtpConnector,
};

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message was transmitted.
    Sent(Delivery),
    /// The message was stored as a draft.
    Drafted {
        /// Folder the draft was appended to.
        folder: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent(delivery) => write!(
                f,
                "Email sent! Time taken to send email: {} seconds",
                delivery.elapsed_seconds()
            ),
            Self::Drafted { folder } => write!(f, "Draft saved to {folder}"),
        }
    }
}

/// Runs the pipeline with a pair of transport strategies.
#[derive(Debug, Clone)]
pub struct Mailer<C = LettreConnector, S = ImapDraftStore> {
    attachments: AttachmentBuilder,
    send: SendStrategy<C>,
    draft: SaveDraftStrategy<S>,
}

impl Default for Mailer {
    fn default() -> Self {
        Self::new(
            AttachmentBuilder::default(),
            SendStrategy::default(),
            SaveDraftStrategy::default(),
        )
    }
}

impl<C, S> Mailer<C, S>
where
    C: SmtpConnector,
    S: DraftStore + Clone + Send + 'static,
{
    /// Creates a mailer from its parts.
    pub const fn new(
        attachments: AttachmentBuilder,
        send: SendStrategy<C>,
        draft: SaveDraftStrategy<S>,
    ) -> Self {
        Self {
            attachments,
            send,
            draft,
        }
    }

    /// Saves a draft when `draft_only` is set, otherwise sends.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the chosen path.
    pub async fn run(&self, config: &EmailConfig) -> Result<Outcome> {
        if config.content.draft_only {
            info!("Draft mode selected");
            let folder = self.save_draft(config).await?;
            Ok(Outcome::Drafted { folder })
        } else {
            info!("Send mode selected");
            Ok(Outcome::Sent(self.send_email(config).await?))
        }
    }

    /// Composes, attaches and sends the configured message.
    ///
    /// # Errors
    ///
    /// Returns an error if an attachment fails, or if sending fails.
    #[instrument(skip_all, fields(subject = %config.content.subject))]
    pub async fn send_email(&self, config: &EmailConfig) -> Result<Delivery> {
        let message = self.prepare(config).await?;
        Ok(self.send.deliver(&config.sender, &message).await?)
    }

    /// Composes, attaches and stores the configured message as a draft.
    /// Returns the folder it was stored in.
    ///
    /// # Errors
    ///
    /// Returns an error if an attachment fails, or if any IMAP step fails.
    #[instrument(skip_all, fields(subject = %config.content.subject))]
    pub async fn save_draft(&self, config: &EmailConfig) -> Result<String> {
        let message = self.prepare(config).await?;
        self.draft.save(&config.sender, &message).await?;
        Ok(self.draft.folder().to_string())
    }

    async fn prepare(&self, config: &EmailConfig) -> Result<ComposedMessage> {
        let mut message = compose(&config.sender, &config.recipients, &config.content);
        self.attachments
            .attach_all(&mut message, &config.content.attachments)
            .await?;
        Ok(message)
    }
}

/// Sends the configured message over SMTP.
///
/// # Errors
///
/// See [`Mailer::send_email`].
pub async fn send_email(config: &EmailConfig) -> Result<Delivery> {
    Mailer::default().send_email(config).await
}

/// Stores the configured message in the IMAP Drafts folder.
///
/// # Errors
///
/// See [`Mailer::save_draft`].
pub async fn save_draft(config: &EmailConfig) -> Result<()> {
    Mailer::default().save_draft(config).await.map(|_| ())
}
