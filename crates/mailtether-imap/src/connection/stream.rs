//! Transport types for IMAP connections.
//!
//! The connection works over any [`Transport`]; TCP and TLS streams are the
//! usual ones, `tokio::io::duplex` halves the usual ones in tests.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::{Error, Result};

/// A duplex byte stream the connection can own.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Type-erased transport.
pub type BoxedStream = Box<dyn Transport>;

/// Negotiates TLS on an existing stream (STARTTLS).
pub trait TlsUpgrade: Send + Sync {
    /// Performs the TLS handshake over `stream` and returns the encrypted stream.
    fn upgrade(&self, stream: BoxedStream) -> impl Future<Output = Result<BoxedStream>> + Send;
}

/// [`TlsUpgrade`] backed by `tokio-rustls`.
#[derive(Clone)]
pub struct RustlsUpgrade {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl RustlsUpgrade {
    /// Creates an upgrader trusting the `webpki-roots` certificate set.
    pub fn new(host: &str) -> Result<Self> {
        Self::with_config(host, default_client_config())
    }

    /// Creates an upgrader with a caller-supplied rustls configuration.
    pub fn with_config(host: &str, config: Arc<rustls::ClientConfig>) -> Result<Self> {
        Ok(Self {
            connector: TlsConnector::from(config),
            server_name: ServerName::try_from(host.to_string())?,
        })
    }
}

impl std::fmt::Debug for RustlsUpgrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsUpgrade")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl TlsUpgrade for RustlsUpgrade {
    async fn upgrade(&self, stream: BoxedStream) -> Result<BoxedStream> {
        debug!(server_name = ?self.server_name, "starting TLS handshake");
        let tls = self
            .connector
            .connect(self.server_name.clone(), stream)
            .await?;
        Ok(Box::new(tls))
    }
}

/// Returns a rustls client configuration with the `webpki-roots` trust anchors.
#[must_use]
pub fn default_client_config() -> Arc<rustls::ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Connects to a server without TLS (for STARTTLS or testing).
pub async fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<BoxedStream> {
    let addr = format!("{host}:{port}");
    let tcp = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Connection(format!("connect to {addr} timed out after {timeout:?}")))?
        .map_err(|e| Error::Connection(format!("connect to {addr}: {e}")))?;
    debug!(%addr, "TCP connected");
    Ok(Box::new(tcp))
}

/// Connects to a server with TLS from the start.
///
/// A failed handshake is reported as [`Error::Connection`], like any other
/// failure before the greeting.
pub async fn connect_tls(host: &str, port: u16, timeout: Duration) -> Result<BoxedStream> {
    let tcp = connect_plain(host, port, timeout).await?;
    let upgrade = RustlsUpgrade::new(host)?;
    tokio::time::timeout(timeout, upgrade.upgrade(tcp))
        .await
        .map_err(|_| Error::Connection(format!("TLS handshake timed out after {timeout:?}")))?
        .map_err(|e| Error::Connection(format!("TLS handshake with {host}:{port} failed: {e}")))
}
