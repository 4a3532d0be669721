//! Configuration records and their JSON loader.
//!
//! The rest of the crate only ever sees validated [`EmailConfig`] values;
//! nothing past this module re-checks for missing fields.

mod loader;
mod model;
mod validation;

use std::path::PathBuf;

pub use loader::{
    DEFAULT_CONFIG_FILE, RawAttachment, RawConfig, RawEmail, RawRecipients, RawSender,
};
pub use model::{
    AttachmentSource, DISCOURAGED_PORT, EmailConfig, EmailContent, RECOMMENDED_PORTS,
    RecipientList, SenderIdentity,
};
pub use validation::validate_config;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("Configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required section is missing keys.
    #[error(
        "{section} configuration is not complete, some fields are missing ({}). \
         Please check the appsettings.json file.",
        .missing.join(", ")
    )]
    Incomplete {
        /// Section name (`Sender`, `Recipients` or `Email`).
        section: &'static str,
        /// Keys that are absent, null or empty.
        missing: Vec<String>,
    },
}

impl ConfigError {
    pub(crate) const fn incomplete(section: &'static str, missing: Vec<String>) -> Self {
        Self::Incomplete { section, missing }
    }

    /// Stable name of the failure kind.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Read { .. } => "ConfigurationUnreadable",
            Self::Parse(_) => "ConfigurationMalformed",
            Self::Incomplete { .. } => "ConfigurationIncomplete",
        }
    }
}
