//! JSON configuration loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::ConfigError;
use super::model::EmailConfig;
use super::validation::validate_config;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

/// Top-level layout of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawConfig {
    /// `Sender` section.
    pub sender: Option<RawSender>,
    /// `Recipients` section.
    pub recipients: Option<RawRecipients>,
    /// `Email` section.
    pub email: Option<RawEmail>,
}

/// `Sender` section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawSender {
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Password or app token.
    pub token: Option<String>,
    /// Server hostname.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
}

/// `Recipients` section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawRecipients {
    /// `To` list.
    pub to: Option<Vec<String>>,
    /// `Cc` list.
    pub cc: Option<Vec<String>>,
    /// `Bcc` list.
    pub bcc: Option<Vec<String>>,
}

/// `Email` section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawEmail {
    /// Subject line.
    pub subject: Option<String>,
    /// Body text.
    pub body: Option<String>,
    /// HTML body flag.
    pub is_body_html: Option<bool>,
    /// Draft mode flag.
    pub draft_only: Option<bool>,
    /// Attachment entries.
    pub attachments: Option<Vec<RawAttachment>>,
}

/// One `Email.Attachments` entry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawAttachment {
    /// Local file path.
    pub path: Option<PathBuf>,
}

impl EmailConfig {
    /// Reads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// is missing required keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading configuration");

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            recipients = config.recipients.len(),
            attachments = config.content.attachments.len(),
            draft_only = config.content.draft_only,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or is missing
    /// required keys.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        let config = validate_config(raw)?;

        if !config.sender.uses_recommended_port() {
            warn!(
                port = config.sender.port,
                "SMTP port is not one of the recommended ports 587 or 25"
            );
        }

        Ok(config)
    }
}
