//! Configuration record types.

use std::path::{Path, PathBuf};

/// Ports the sender is expected to use for submission.
pub const RECOMMENDED_PORTS: [u16; 2] = [587, 25];

/// Port that is discouraged for this tool (implicit TLS submission).
pub const DISCOURAGED_PORT: u16 = 465;

/// Sender account and server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    /// Display name used in the `From` header.
    pub name: String,
    /// Email address, also used as the login user name.
    pub email: String,
    /// Password or app token used for authentication.
    pub token: String,
    /// SMTP or IMAP server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl SenderIdentity {
    /// Returns `true` if the port is one of the recommended submission ports.
    #[must_use]
    pub fn uses_recommended_port(&self) -> bool {
        RECOMMENDED_PORTS.contains(&self.port)
    }
}

/// Message recipients, each list in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientList {
    /// `To` addresses.
    pub to: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `Bcc` addresses.
    pub bcc: Vec<String>,
}

impl RecipientList {
    /// Total number of addresses across all three lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Returns `true` if there are no recipients at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An in-memory buffer with the file name it should carry.
    Bytes {
        /// Logical file name, e.g. `report.pdf`.
        file_name: String,
        /// Raw content.
        data: Vec<u8>,
    },
}

impl AttachmentSource {
    /// Creates a path-based source.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a buffer-based source.
    pub fn bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Name used in error messages and as the attachment file name.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => file_name_of(path),
            Self::Bytes { file_name, .. } => file_name.clone(),
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Subject, body, mode flags and attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailContent {
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Whether the body is HTML.
    pub is_body_html: bool,
    /// Save to Drafts instead of sending.
    pub draft_only: bool,
    /// Attachments in the order they should appear.
    pub attachments: Vec<AttachmentSource>,
}

impl EmailContent {
    /// Creates plain-text content without attachments.
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Appends an attachment source.
    #[must_use]
    pub fn with_attachment(mut self, source: AttachmentSource) -> Self {
        self.attachments.push(source);
        self
    }
}

/// Fully loaded and validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    /// Sender settings.
    pub sender: SenderIdentity,
    /// Recipients.
    pub recipients: RecipientList,
    /// Message content.
    pub content: EmailContent,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_uses_final_component() {
        let source = AttachmentSource::path("/tmp/reports/q3.pdf");
        assert_eq!(source.display_name(), "q3.pdf");

        let source = AttachmentSource::bytes("inline.txt", b"hi".to_vec());
        assert_eq!(source.display_name(), "inline.txt");
    }

    #[test]
    fn test_recipient_count() {
        let recipients = RecipientList {
            to: vec!["a@x.com".into()],
            cc: vec!["b@x.com".into(), "c@x.com".into()],
            bcc: Vec::new(),
        };
        assert_eq!(recipients.len(), 3);
        assert!(!recipients.is_empty());
        assert!(RecipientList::default().is_empty());
    }

    #[test]
    fn test_recommended_ports() {
        let mut sender = SenderIdentity {
            name: "Jane".into(),
            email: "jane@example.com".into(),
            token: "secret".into(),
            host: "smtp.example.com".into(),
            port: 587,
        };
        assert!(sender.uses_recommended_port());
        sender.port = DISCOURAGED_PORT;
        assert!(!sender.uses_recommended_port());
    }
}
