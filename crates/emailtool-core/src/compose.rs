//! Message composition.
//!
//! [`compose`] copies the configuration records into a [`ComposedMessage`];
//! attachments are added through [`AttachmentSink`]. Rendering to a
//! transport-ready [`lettre::Message`] happens last, with [`RenderOptions`]
//! chosen by the transport.

use lettre::Message;
use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use tracing::debug;

use crate::attachment::{AttachError, AttachmentPart, AttachmentSink};
use crate::config::{EmailContent, RecipientList, SenderIdentity};

/// Errors raised while rendering a composed message.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// An address could not be parsed.
    #[error("Invalid {field} address {address:?}: {source}")]
    InvalidAddress {
        /// Header the address belongs to (`From`, `To`, `Cc` or `Bcc`).
        field: &'static str,
        /// The address as configured.
        address: String,
        /// Parser error.
        source: AddressError,
    },

    /// To, Cc and Bcc are all empty.
    #[error("Message has no recipients. Please check the appsettings.json file.")]
    NoRecipients,

    /// An attachment carries an unparseable media type.
    #[error("Invalid content type {content_type:?} for attachment {file_name}")]
    InvalidContentType {
        /// Attachment file name.
        file_name: String,
        /// Offending media type.
        content_type: String,
    },

    /// The MIME builder rejected the message.
    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
}

impl ComposeError {
    /// Stable name of the failure kind.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "InvalidAddress",
            Self::NoRecipients => "NoRecipients",
            Self::InvalidContentType { .. } => "InvalidContentType",
            Self::Build(_) => "MessageBuild",
        }
    }
}

/// Media type of the body part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyFormat {
    /// `text/plain`.
    #[default]
    Plain,
    /// `text/html`.
    Html,
}

/// How a [`ComposedMessage`] is turned into MIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render an HTML body as `text/html`; otherwise every body is `text/plain`.
    pub honor_html: bool,
    /// Keep the `Bcc` header in the output.
    pub keep_bcc: bool,
    /// Wrap the body in `multipart/mixed` even without attachments.
    pub always_multipart: bool,
}

impl RenderOptions {
    /// Options for transmission over SMTP.
    pub const SEND: Self = Self {
        honor_html: true,
        keep_bcc: false,
        always_multipart: false,
    };

    /// Options for a message stored in the Drafts folder.
    pub const DRAFT: Self = Self {
        honor_html: false,
        keep_bcc: true,
        always_multipart: true,
    };

    /// Returns a copy with a different HTML setting.
    #[must_use]
    pub const fn with_html(mut self, honor_html: bool) -> Self {
        self.honor_html = honor_html;
        self
    }
}

/// Fully assembled email prior to transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Sender display name.
    pub from_name: String,
    /// Sender address.
    pub from_email: String,
    /// `To` addresses in configuration order.
    pub to: Vec<String>,
    /// `Cc` addresses in configuration order.
    pub cc: Vec<String>,
    /// `Bcc` addresses in configuration order.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Declared body format.
    pub body_format: BodyFormat,
    /// Attached parts in the order they were added.
    pub attachments: Vec<AttachmentPart>,
}

/// Builds a message from the configuration records. Attachments are not
/// loaded here; add them through [`AttachmentSink`].
#[must_use]
pub fn compose(
    sender: &SenderIdentity,
    recipients: &RecipientList,
    content: &EmailContent,
) -> ComposedMessage {
    ComposedMessage {
        from_name: sender.name.clone(),
        from_email: sender.email.clone(),
        to: recipients.to.clone(),
        cc: recipients.cc.clone(),
        bcc: recipients.bcc.clone(),
        subject: content.subject.clone(),
        body: content.body.clone(),
        body_format: if content.is_body_html {
            BodyFormat::Html
        } else {
            BodyFormat::Plain
        },
        attachments: Vec::new(),
    }
}

impl ComposedMessage {
    /// Number of addresses across To, Cc and Bcc.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Renders the message into MIME.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is malformed, there are no
    /// recipients, or the MIME builder rejects the result.
    pub fn render(&self, options: RenderOptions) -> Result<Message, ComposeError> {
        if self.recipient_count() == 0 {
            return Err(ComposeError::NoRecipients);
        }

        let from_address = self
            .from_email
            .parse()
            .map_err(|source| ComposeError::InvalidAddress {
                field: "From",
                address: self.from_email.clone(),
                source,
            })?;

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(self.from_name.clone()), from_address))
            .subject(self.subject.clone());

        for address in &self.to {
            builder = builder.to(parse_mailbox("To", address)?);
        }
        for address in &self.cc {
            builder = builder.cc(parse_mailbox("Cc", address)?);
        }
        for address in &self.bcc {
            builder = builder.bcc(parse_mailbox("Bcc", address)?);
        }
        if options.keep_bcc {
            builder = builder.keep_bcc();
        }

        let body = match (self.body_format, options.honor_html) {
            (BodyFormat::Html, true) => SinglePart::html(self.body.clone()),
            _ => SinglePart::plain(self.body.clone()),
        };

        let message = if self.attachments.is_empty() && !options.always_multipart {
            builder.singlepart(body)?
        } else {
            let mut parts = MultiPart::mixed().singlepart(body);
            for part in &self.attachments {
                parts = parts.singlepart(render_attachment(part)?);
            }
            builder.multipart(parts)?
        };

        debug!(
            recipients = self.recipient_count(),
            attachments = self.attachments.len(),
            ?options,
            "Message rendered"
        );
        Ok(message)
    }
}

impl AttachmentSink for ComposedMessage {
    fn add_attachment(&mut self, part: &AttachmentPart) -> Result<(), AttachError> {
        if part.file_name.trim().is_empty() {
            return Err(AttachError::EmptyFileName);
        }
        if ContentType::parse(&part.content_type).is_err() {
            return Err(AttachError::InvalidContentType {
                file_name: part.file_name.clone(),
                content_type: part.content_type.clone(),
            });
        }
        self.attachments.push(part.clone());
        Ok(())
    }
}

fn parse_mailbox(field: &'static str, address: &str) -> Result<Mailbox, ComposeError> {
    address
        .parse()
        .map_err(|source| ComposeError::InvalidAddress {
            field,
            address: address.to_string(),
            source,
        })
}

fn render_attachment(part: &AttachmentPart) -> Result<SinglePart, ComposeError> {
    let content_type =
        ContentType::parse(&part.content_type).map_err(|_| ComposeError::InvalidContentType {
            file_name: part.file_name.clone(),
            content_type: part.content_type.clone(),
        })?;
    Ok(Attachment::new(part.file_name.clone()).body(part.data.clone(), content_type))
}
