//! Channel construction: address, security mode and credentials.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use streams_auth::{IdentityTokenProvider, TokenSource};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, instrument, warn};

use crate::error::ChannelError;
use crate::options::{ChannelSecurity, ConnectionOptions};

/// A duplex byte stream to the server.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Boxed connection, plain or TLS.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Builds channels from connection options.
///
/// Secure channels attach a bearer token. Without an explicit token source
/// the factory falls back to an [`IdentityTokenProvider`] configured from the
/// environment, created on first use.
#[derive(Clone, Default)]
pub struct ChannelFactory {
    token_source: Option<Arc<dyn TokenSource>>,
}

impl fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("token_source", &self.token_source.as_ref().map(|_| ".."))
            .finish()
    }
}

impl ChannelFactory {
    /// Create a factory that uses `token_source` for secure channels.
    pub fn new(token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            token_source: Some(token_source),
        }
    }

    /// Validate the options and produce a channel ready to connect.
    ///
    /// The token is obtained here, once, and fetching it may block. Root
    /// certificates are read when the channel connects.
    #[instrument(name = "build_channel", skip(self, options), fields(addr = %options.target_address))]
    pub fn build_channel(&self, options: &ConnectionOptions) -> Result<Channel, ChannelError> {
        let security = options.security()?;

        let authorization = match security {
            ChannelSecurity::Insecure => {
                debug!("Using insecure channel");
                None
            }
            ChannelSecurity::Secure { ref domain, .. } => {
                debug!(domain = %domain, "Using secure channel");
                let token = match self.token_source {
                    Some(ref source) => source.token()?,
                    None => IdentityTokenProvider::from_env()?.token()?,
                };
                Some(format!("Bearer {token}"))
            }
        };

        Ok(Channel {
            target: options.target_address.clone(),
            security,
            authorization,
            connect_timeout: options.connect_timeout(),
        })
    }
}

/// A configured, not yet connected channel.
#[derive(Clone)]
pub struct Channel {
    target: String,
    security: ChannelSecurity,
    authorization: Option<String>,
    connect_timeout: Duration,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("target", &self.target)
            .field("security", &self.security)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Channel {
    /// Server address.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolved security mode.
    pub fn security(&self) -> &ChannelSecurity {
        &self.security
    }

    /// Check if the channel uses TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self.security, ChannelSecurity::Secure { .. })
    }

    /// `Bearer <token>` for secure channels.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Bound on connecting plus session setup.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Open the connection.
    pub async fn connect(&self) -> Result<BoxedStream, ChannelError> {
        // Certificates first, so a bad path fails before any network traffic.
        let tls = match self.security {
            ChannelSecurity::Insecure => None,
            ChannelSecurity::Secure {
                ref domain,
                ref root_cert_path,
            } => Some((tls_connector(root_cert_path)?, server_name(domain)?)),
        };

        let tcp = TcpStream::connect(&self.target)
            .await
            .map_err(|source| ChannelError::Connect {
                target: self.target.clone(),
                source,
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        match tls {
            None => {
                info!(addr = %self.target, "Connected");
                Ok(Box::new(tcp))
            }
            Some((connector, name)) => {
                let stream = connector
                    .connect(name, tcp)
                    .await
                    .map_err(|e| ChannelError::Tls(format!("handshake with {} failed: {e}", self.target)))?;
                info!(addr = %self.target, "Connected over TLS");
                Ok(Box::new(stream))
            }
        }
    }
}

fn server_name(domain: &str) -> Result<ServerName<'static>, ChannelError> {
    ServerName::try_from(domain.to_string())
        .map_err(|_| ChannelError::Tls(format!("invalid ssl_domain_name {domain:?}")))
}

fn tls_connector(root_cert_path: &Path) -> Result<TlsConnector, ChannelError> {
    let roots = load_root_certs(root_cert_path)?;

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ChannelError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

fn load_root_certs(path: &Path) -> Result<RootCertStore, ChannelError> {
    let file = File::open(path).map_err(|source| ChannelError::RootCert {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|source| ChannelError::RootCert {
            path: path.to_path_buf(),
            source,
        })?;
        roots
            .add(cert)
            .map_err(|e| ChannelError::Tls(format!("rejected root certificate: {e}")))?;
    }

    if roots.is_empty() {
        return Err(ChannelError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    debug!(count = roots.len(), "Loaded root certificates");
    Ok(roots)
}
