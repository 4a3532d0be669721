//! Send strategy: SMTP submission with bounded retry.
//!
//! A send run owns exactly one SMTP connection. The connection is opened
//! and authenticated before the first attempt and ended with `QUIT` after
//! the last one. If a failed attempt left the connection unusable, the
//! next attempt reconnects before transmitting.

use std::time::Instant;

use lettre::address::Envelope;
use lettre::message::Message;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Code;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{Delivery, TransportError};
use crate::compose::{ComposedMessage, RenderOptions};
use crate::config::{DISCOURAGED_PORT, SenderIdentity};
use crate::retry::{Categorized, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

/// Reply codes that mean the server refused the credentials.
const AUTH_FAILURE_CODES: [&str; 4] = ["530", "534", "535", "538"];

/// Mechanisms offered to the server, in order of preference.
const AUTH_MECHANISMS: [Mechanism; 2] = [Mechanism::Plain, Mechanism::Login];

/// SMTP failures, classified for retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Network, TLS, timeout or server reply failure.
    #[error("SMTP protocol error: {0}")]
    Protocol(String),

    /// The server rejected the credentials.
    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    /// The message or its envelope was refused before transmission.
    #[error("Message rejected: {0}")]
    InvalidMessage(String),
}

impl SendError {
    /// Only protocol failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl Categorized for SendError {
    fn category(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "SmtpProtocol",
            Self::Authentication(_) => "SmtpAuthentication",
            Self::InvalidMessage(_) => "InvalidMessage",
        }
    }
}

/// Maps a failure to a [`SendError`] from the server's reply code, if
/// any, and whether lettre refused the request locally.
///
/// Credential rejections win over everything else. Local refusals are
/// message problems. Anything left is a protocol failure.
fn classify(status: Option<Code>, is_client: bool, detail: String) -> SendError {
    let refused_login = status
        .map(|code| code.to_string())
        .is_some_and(|code| AUTH_FAILURE_CODES.contains(&code.as_str()));

    if refused_login {
        SendError::Authentication(detail)
    } else if is_client {
        SendError::InvalidMessage(detail)
    } else {
        SendError::Protocol(detail)
    }
}

impl From<lettre::transport::smtp::Error> for SendError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        classify(err.status(), err.is_client(), err.to_string())
    }
}

/// Opens authenticated SMTP sessions.
#[allow(async_fn_in_trait)]
pub trait SmtpConnector {
    /// Session type produced by [`SmtpConnector::connect`].
    type Session: SmtpSession;

    /// Connects and authenticates as `sender`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or refuses the login.
    async fn connect(&self, sender: &SenderIdentity) -> Result<Self::Session, SendError>;
}

/// An authenticated SMTP session.
#[allow(async_fn_in_trait)]
pub trait SmtpSession {
    /// Transmits one message.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    async fn send(&self, message: &Message) -> Result<(), SendError>;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server did not acknowledge the close.
    async fn close(self) -> Result<(), SendError>;
}

/// Connection security for SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// No encryption. Only for local test servers.
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Port 465 uses implicit TLS; every other port uses STARTTLS.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        if port == DISCOURAGED_PORT {
            Self::Tls
        } else {
            Self::StartTls
        }
    }
}

/// Connector backed by a single lettre SMTP connection per session.
///
/// Security follows the port unless overridden with
/// [`LettreConnector::with_security`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreConnector {
    security: Option<Security>,
}

impl LettreConnector {
    /// Forces `security` regardless of the configured port.
    #[must_use]
    pub const fn with_security(security: Security) -> Self {
        Self {
            security: Some(security),
        }
    }
}

impl SmtpConnector for LettreConnector {
    type Session = LettreSession;

    async fn connect(&self, sender: &SenderIdentity) -> Result<LettreSession, SendError> {
        let endpoint = Endpoint {
            host: sender.host.clone(),
            port: sender.port,
            security: self.security.unwrap_or(Security::for_port(sender.port)),
            hello: ClientId::default(),
            credentials: Credentials::new(sender.email.clone(), sender.token.clone()),
        };
        let connection = endpoint.open().await?;

        Ok(LettreSession {
            endpoint,
            connection: Mutex::new(connection),
        })
    }
}

/// Where and how to (re)open the session's connection.
struct Endpoint {
    host: String,
    port: u16,
    security: Security,
    hello: ClientId,
    credentials: Credentials,
}

impl Endpoint {
    /// Connects, negotiates TLS and logs in.
    async fn open(&self) -> Result<AsyncSmtpConnection, SendError> {
        let tls = match self.security {
            Security::None => None,
            Security::Tls | Security::StartTls => Some(TlsParameters::new(self.host.clone())?),
        };
        let wrapped = if self.security == Security::Tls {
            tls.clone()
        } else {
            None
        };

        let mut connection = AsyncSmtpConnection::connect_tokio1(
            (self.host.as_str(), self.port),
            None,
            &self.hello,
            wrapped,
            None,
        )
        .await?;

        if let (Security::StartTls, Some(tls)) = (self.security, tls) {
            connection.starttls(tls, &self.hello).await?;
        }

        connection.auth(&AUTH_MECHANISMS, &self.credentials).await?;
        debug!(
            host = %self.host,
            port = self.port,
            security = ?self.security,
            "SMTP login accepted"
        );
        Ok(connection)
    }
}

/// Session produced by [`LettreConnector`]: one authenticated connection.
pub struct LettreSession {
    endpoint: Endpoint,
    connection: Mutex<AsyncSmtpConnection>,
}

impl LettreSession {
    async fn transmit(
        connection: &mut AsyncSmtpConnection,
        envelope: &Envelope,
        raw: &[u8],
    ) -> Result<(), SendError> {
        let response = connection.send(envelope, raw).await?;
        debug!(code = %response.code(), "Server accepted message");
        Ok(())
    }
}

impl SmtpSession for LettreSession {
    async fn send(&self, message: &Message) -> Result<(), SendError> {
        let mut connection = self.connection.lock().await;

        // lettre drops the connection after a failed transaction.
        if connection.has_broken() {
            info!(host = %self.endpoint.host, "Reconnecting after failed attempt");
            *connection = self.endpoint.open().await?;
        }

        Self::transmit(&mut connection, message.envelope(), &message.formatted()).await
    }

    async fn close(self) -> Result<(), SendError> {
        let mut connection = self.connection.into_inner();
        if connection.has_broken() {
            return Ok(());
        }
        connection.quit().await?;
        Ok(())
    }
}

/// Transmits a composed message over SMTP.
#[derive(Debug, Clone)]
pub struct SendStrategy<C = LettreConnector> {
    connector: C,
    policy: RetryPolicy<SendError>,
}

impl Default for SendStrategy {
    fn default() -> Self {
        Self::new(LettreConnector::default())
    }
}

impl<C: SmtpConnector> SendStrategy<C> {
    /// Creates a strategy that retries protocol failures up to
    /// [`DEFAULT_MAX_ATTEMPTS`] times.
    pub const fn new(connector: C) -> Self {
        Self {
            connector,
            policy: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, SendError::is_retryable),
        }
    }

    /// Renders `message`, connects as `sender` and transmits under the
    /// retry policy. The session is closed on every path once opened.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or connecting fails, or once the
    /// retry policy gives up.
    #[instrument(skip_all, fields(host = %sender.host, port = sender.port))]
    pub async fn deliver(
        &self,
        sender: &SenderIdentity,
        message: &ComposedMessage,
    ) -> Result<Delivery, TransportError> {
        let mime = message.render(RenderOptions::SEND)?;

        let session = self
            .connector
            .connect(sender)
            .await
            .map_err(TransportError::Connect)?;

        let started = Instant::now();
        let result = {
            let session = &session;
            let mime = &mime;
            self.policy
                .run_async("send email", None, move |_| session.send(mime))
                .await
        };
        let elapsed = started.elapsed();

        if let Err(err) = session.close().await {
            warn!(error = %err, "Failed to close SMTP session");
        }

        let attempts = result?.attempts;
        info!(
            attempts,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Email sent"
        );
        Ok(Delivery { attempts, elapsed })
    }
}
