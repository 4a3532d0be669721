//! Attachment loading and the retried add step.
//!
//! Opening a file happens once; failures there are configuration mistakes
//! and surface immediately. Adding the loaded part to a message goes through
//! the [`RetryPolicy`].

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::config::AttachmentSource;
use crate::retry::{Categorized, RetryError, RetryPolicy};

/// A loaded attachment ready to be embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// File name shown to the recipient.
    pub file_name: String,
    /// Media type, e.g. `application/pdf`.
    pub content_type: String,
    /// Raw content.
    pub data: Vec<u8>,
}

impl AttachmentPart {
    /// Creates a part, guessing the media type from the file name.
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name);
        Self {
            file_name,
            content_type,
            data: data.into(),
        }
    }

    /// Size of the content in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn guess_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string()
}

/// Something attachments can be added to.
pub trait AttachmentSink {
    /// Adds one part. Implementations must leave the sink unchanged on error.
    ///
    /// # Errors
    ///
    /// Returns an error if the part cannot be accepted.
    fn add_attachment(&mut self, part: &AttachmentPart) -> Result<(), AttachError>;
}

/// Failure while adding a loaded part to a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    /// The part has no file name.
    #[error("attachment has an empty file name")]
    EmptyFileName,

    /// The media type is not a valid MIME type.
    #[error("invalid content type {content_type:?} for {file_name}")]
    InvalidContentType {
        /// File name of the part.
        file_name: String,
        /// Offending media type.
        content_type: String,
    },

    /// The message refused the part.
    #[error("attachment {file_name} rejected: {reason}")]
    Rejected {
        /// File name of the part.
        file_name: String,
        /// Why it was refused.
        reason: String,
    },
}

impl Categorized for AttachError {
    fn category(&self) -> &'static str {
        match self {
            Self::EmptyFileName => "EmptyFileName",
            Self::InvalidContentType { .. } => "InvalidContentType",
            Self::Rejected { .. } => "AttachmentRejected",
        }
    }
}

/// Errors raised while attaching files.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// The file does not exist.
    #[error(
        "Attachment path is invalid, {} was not found. Please check the appsettings.json file.",
        .path.display()
    )]
    NotFound {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A directory in the path does not exist.
    #[error(
        "Attachment directory is invalid, {} was not found. Please check the appsettings.json file.",
        .path.display()
    )]
    DirectoryNotFound {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file exists but could not be read.
    #[error(
        "Failed to open file {}: {source}. Please check the appsettings.json file.",
        .path.display()
    )]
    Unreadable {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Adding the part failed on every attempt or with a non-retryable error.
    #[error(transparent)]
    Add(#[from] RetryError<AttachError>),
}

impl AttachmentError {
    fn from_io(path: &Path, source: io::Error, parent_exists: bool) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound if !parent_exists => Self::DirectoryNotFound { path, source },
            io::ErrorKind::NotFound => Self::NotFound { path, source },
            _ => Self::Unreadable { path, source },
        }
    }

    /// Whether the error comes from reading the source file.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        !matches!(self, Self::Add(_))
    }
}

impl Categorized for AttachmentError {
    fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "FileNotFound",
            Self::DirectoryNotFound { .. } => "DirectoryNotFound",
            Self::Unreadable { .. } => "FileUnreadable",
            Self::Add(err) => err.category(),
        }
    }
}

/// Loads attachment sources and adds them to a sink under a retry policy.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentBuilder {
    policy: RetryPolicy<AttachError>,
}

impl Default for AttachmentBuilder {
    fn default() -> Self {
        Self::new(RetryPolicy::retry_all())
    }
}

impl AttachmentBuilder {
    /// Creates a builder that retries adds according to `policy`.
    #[must_use]
    pub const fn new(policy: RetryPolicy<AttachError>) -> Self {
        Self { policy }
    }

    /// Retry policy used for adds.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy<AttachError> {
        &self.policy
    }

    /// Turns a source into a part. Buffer sources never fail.
    ///
    /// # Errors
    ///
    /// Returns an error naming the path if the file cannot be opened or read.
    pub async fn load(&self, source: &AttachmentSource) -> Result<AttachmentPart, AttachmentError> {
        match source {
            AttachmentSource::Bytes { file_name, data } => {
                Ok(AttachmentPart::new(file_name.clone(), data.clone()))
            }
            AttachmentSource::Path(path) => {
                let data = match tokio::fs::read(path).await {
                    Ok(data) => data,
                    Err(err) => {
                        let parent_exists = parent_exists(path).await;
                        return Err(AttachmentError::from_io(path, err, parent_exists));
                    }
                };
                debug!(path = %path.display(), bytes = data.len(), "Read attachment");
                Ok(AttachmentPart::new(source.display_name(), data))
            }
        }
    }

    /// Adds one part to `sink`, retrying according to the policy.
    /// Returns the number of attempts it took.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Add`] once the policy gives up.
    pub fn add<S: AttachmentSink>(
        &self,
        sink: &mut S,
        part: &AttachmentPart,
    ) -> Result<u32, AttachmentError> {
        let outcome = self
            .policy
            .run("add attachment", Some(&part.file_name), |_| {
                sink.add_attachment(part)
            })?;
        Ok(outcome.attempts)
    }

    /// Loads and adds every source in order.
    ///
    /// Parts already added stay in the sink when a later one fails; the
    /// remaining sources are not touched.
    ///
    /// # Errors
    ///
    /// Returns the first load or add failure.
    #[instrument(skip_all, fields(count = sources.len()))]
    pub async fn attach_all<S: AttachmentSink>(
        &self,
        sink: &mut S,
        sources: &[AttachmentSource],
    ) -> Result<usize, AttachmentError> {
        for source in sources {
            let part = self.load(source).await?;
            let attempts = self.add(sink, &part)?;
            debug!(
                file_name = %part.file_name,
                content_type = %part.content_type,
                attempts,
                "Attachment added"
            );
        }
        if !sources.is_empty() {
            info!(count = sources.len(), "Attachments added");
        }
        Ok(sources.len())
    }
}

async fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::metadata(parent)
            .await
            .is_ok_and(|meta| meta.is_dir()),
        _ => true,
    }
}
