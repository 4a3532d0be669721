//! Save-draft strategy: append the message to an IMAP folder.
//!
//! The IMAP client is blocking, so the whole connect, select, append and
//! logout sequence runs on one blocking task. There is no retry here.

use std::io::{Read, Write};

use tracing::{debug, info, instrument, warn};

use super::{TransportError, tls};
use crate::compose::{ComposedMessage, RenderOptions};
use crate::config::SenderIdentity;
use crate::retry::Categorized;

/// Folder drafts are stored in.
pub const DRAFTS_FOLDER: &str = "Drafts";

/// IMAP failures. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// Could not reach the server or complete the TLS handshake.
    #[error("Failed to connect to IMAP server {host}:{port}: {reason}")]
    Connection {
        /// Server hostname.
        host: String,
        /// Server port.
        port: u16,
        /// Underlying failure.
        reason: String,
    },

    /// The server rejected the login.
    #[error("IMAP authentication failed for {user}: {reason}")]
    Authentication {
        /// Login name.
        user: String,
        /// Server response.
        reason: String,
    },

    /// The folder could not be opened read-write.
    #[error("Failed to open folder {folder}: {reason}")]
    Folder {
        /// Folder name.
        folder: String,
        /// Server response.
        reason: String,
    },

    /// The server refused the appended message.
    #[error("Failed to append draft to {folder}: {reason}")]
    Append {
        /// Folder name.
        folder: String,
        /// Server response.
        reason: String,
    },

    /// Logging out failed.
    #[error("Failed to disconnect from IMAP server: {0}")]
    Disconnect(String),

    /// The blocking task did not finish.
    #[error("Draft task was interrupted: {0}")]
    Interrupted(String),
}

impl Categorized for DraftError {
    fn category(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ImapConnection",
            Self::Authentication { .. } => "ImapAuthentication",
            Self::Folder { .. } => "FolderAccess",
            Self::Append { .. } => "ImapAppend",
            Self::Disconnect(_) => "ImapDisconnect",
            Self::Interrupted(_) => "Interrupted",
        }
    }
}

/// Opens authenticated IMAP sessions. Calls block.
pub trait DraftStore {
    /// Session type produced by [`DraftStore::connect`].
    type Session: DraftSession;

    /// Connects with TLS and logs in as `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::Connection`] or [`DraftError::Authentication`].
    fn connect(&self, sender: &SenderIdentity) -> Result<Self::Session, DraftError>;
}

/// An authenticated IMAP session.
pub trait DraftSession {
    /// Opens `folder` read-write.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::Folder`] if the folder cannot be selected.
    fn select(&mut self, folder: &str) -> Result<(), DraftError>;

    /// Appends a raw RFC 5322 message to `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::Append`] if the server refuses it.
    fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), DraftError>;

    /// Logs out and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::Disconnect`] if the logout is not acknowledged.
    fn logout(self) -> Result<(), DraftError>;
}

/// Store backed by the `imap` crate over rustls (TLS on connect).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapDraftStore;

impl DraftStore for ImapDraftStore {
    type Session = ImapDraftSession<tls::TlsStream>;

    fn connect(&self, sender: &SenderIdentity) -> Result<Self::Session, DraftError> {
        let connection_error = |reason: String| DraftError::Connection {
            host: sender.host.clone(),
            port: sender.port,
            reason,
        };

        let stream = tls::connect(&sender.host, sender.port).map_err(connection_error)?;
        let mut client = imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|err| connection_error(err.to_string()))?;

        let session = client
            .login(&sender.email, &sender.token)
            .map_err(|(err, _)| DraftError::Authentication {
                user: sender.email.clone(),
                reason: err.to_string(),
            })?;
        debug!(host = %sender.host, port = sender.port, "IMAP login succeeded");

        Ok(ImapDraftSession { session })
    }
}

/// Session produced by [`ImapDraftStore`].
pub struct ImapDraftSession<T: Read + Write> {
    session: imap::Session<T>,
}

impl<T: Read + Write> DraftSession for ImapDraftSession<T> {
    fn select(&mut self, folder: &str) -> Result<(), DraftError> {
        let mailbox = self
            .session
            .select(folder)
            .map_err(|err| DraftError::Folder {
                folder: folder.to_string(),
                reason: err.to_string(),
            })?;
        debug!(folder, exists = mailbox.exists, "Folder opened");
        Ok(())
    }

    fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), DraftError> {
        self.session
            .append(folder, message)
            .map_err(|err| DraftError::Append {
                folder: folder.to_string(),
                reason: err.to_string(),
            })
    }

    fn logout(mut self) -> Result<(), DraftError> {
        self.session
            .logout()
            .map_err(|err| DraftError::Disconnect(err.to_string()))
    }
}

/// Stores a composed message in the Drafts folder.
#[derive(Debug, Clone)]
pub struct SaveDraftStrategy<S = ImapDraftStore> {
    store: S,
    folder: String,
    honor_html: bool,
}

impl Default for SaveDraftStrategy {
    fn default() -> Self {
        Self::new(ImapDraftStore)
    }
}

impl<S> SaveDraftStrategy<S>
where
    S: DraftStore + Clone + Send + 'static,
{
    /// Creates a strategy that stores plain-text drafts in [`DRAFTS_FOLDER`].
    pub fn new(store: S) -> Self {
        Self {
            store,
            folder: DRAFTS_FOLDER.to_string(),
            honor_html: false,
        }
    }

    /// Renders HTML bodies as `text/html` instead of plain text.
    #[must_use]
    pub const fn honor_html(mut self, honor_html: bool) -> Self {
        self.honor_html = honor_html;
        self
    }

    /// Stores drafts in `folder` instead of [`DRAFTS_FOLDER`].
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Target folder.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Renders `message` and appends it to the folder. Once a session is
    /// open it is logged out on every path.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or any IMAP step fails.
    #[instrument(skip_all, fields(host = %sender.host, port = sender.port, folder = %self.folder))]
    pub async fn save(
        &self,
        sender: &SenderIdentity,
        message: &ComposedMessage,
    ) -> Result<(), TransportError> {
        let options = RenderOptions::DRAFT.with_html(self.honor_html);
        let raw = message.render(options)?.formatted();

        let store = self.store.clone();
        let sender = sender.clone();
        let folder = self.folder.clone();
        tokio::task::spawn_blocking(move || append_draft(&store, &sender, &folder, &raw))
            .await
            .map_err(|err| DraftError::Interrupted(err.to_string()))??;

        info!(folder = %self.folder, "Draft saved");
        Ok(())
    }
}

fn append_draft<S: DraftStore>(
    store: &S,
    sender: &SenderIdentity,
    folder: &str,
    raw: &[u8],
) -> Result<(), DraftError> {
    let mut session = store.connect(sender)?;

    let result = session
        .select(folder)
        .and_then(|()| session.append(folder, raw));

    if let Err(err) = session.logout() {
        warn!(error = %err, "Failed to log out of IMAP session");
    }
    result
}
