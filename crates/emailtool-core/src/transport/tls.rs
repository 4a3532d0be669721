//! Blocking TLS streams for the IMAP client.

use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

/// TLS stream over a blocking TCP socket.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Opens a TCP connection to `host:port` and wraps it in TLS.
///
/// The handshake itself completes on first read or write.
///
/// # Errors
///
/// Returns a description of the failure if the socket cannot be opened,
/// the hostname is not a valid server name, or the TLS setup fails.
pub fn connect(host: &str, port: u16) -> Result<TlsStream, String> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| format!("Invalid hostname: {host}"))?;
    let connection = ClientConnection::new(client_config()?, server_name)
        .map_err(|err| format!("TLS setup failed: {err}"))?;
    let socket = TcpStream::connect((host, port)).map_err(|err| err.to_string())?;

    Ok(StreamOwned::new(connection, socket))
}

/// Client configuration trusting the webpki root set.
fn client_config() -> Result<Arc<ClientConfig>, String> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|err| format!("TLS configuration failed: {err}"))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

    Ok(Arc::new(config))
}
