//! A stream that may have been upgraded to TLS

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_native_tls::{TlsConnector, TlsStream};
use pin_project::pin_project;
use tokio::io::{AsyncRead as Read, AsyncWrite as Write, ReadBuf};

/// Parameters to use for secure clients
pub struct ClientTlsParameters {
    /// A connector from `native-tls`
    pub connector: TlsConnector,
    /// The domain to send during the TLS handshake
    pub domain: String,
}

impl fmt::Debug for ClientTlsParameters {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ClientTlsParameters")
            .field("connector", &"TlsConnector")
            .field("domain", &self.domain)
            .finish()
    }
}

impl ClientTlsParameters {
    /// Creates a `ClientTlsParameters`
    pub fn new(domain: String, connector: TlsConnector) -> ClientTlsParameters {
        ClientTlsParameters { connector, domain }
    }

    /// Parameters for opportunistic encryption.
    ///
    /// Unless `verify` is set, any certificate is accepted for any name: the
    /// handshake only has to complete.
    pub fn opportunistic(domain: String, verify: bool) -> ClientTlsParameters {
        let connector = TlsConnector::new()
            .danger_accept_invalid_certs(!verify)
            .danger_accept_invalid_hostnames(!verify);
        ClientTlsParameters::new(domain, connector)
    }
}

/// Represents the different types of underlying network streams
#[pin_project(project = NetworkStreamProj)]
#[allow(missing_debug_implementations)]
pub enum NetworkStream<S> {
    /// Cleartext stream
    Plain(#[pin] S),
    /// Encrypted stream
    Tls(#[pin] TlsStream<S>),
}

impl<S: Read + Write + Unpin> NetworkStream<S> {
    /// Upgrades to TLS connection
    pub async fn upgrade_tls(
        self,
        tls_parameters: &ClientTlsParameters,
    ) -> Result<Self, async_native_tls::Error> {
        match self {
            NetworkStream::Plain(stream) => {
                let tls_stream = tls_parameters
                    .connector
                    .connect(&tls_parameters.domain, stream)
                    .await?;
                Ok(NetworkStream::Tls(tls_stream))
            }
            NetworkStream::Tls(_) => Ok(self),
        }
    }
}

impl<S: Read + Write + Unpin> Read for NetworkStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Plain(s) => s.poll_read(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_read(cx, buf),
        }
    }
}

impl<S: Read + Write + Unpin> Write for NetworkStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.project() {
            NetworkStreamProj::Plain(s) => s.poll_write(cx, buf),
            NetworkStreamProj::Tls(s) => s.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Plain(s) => s.poll_flush(cx),
            NetworkStreamProj::Tls(s) => s.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.project() {
            NetworkStreamProj::Plain(s) => s.poll_shutdown(cx),
            NetworkStreamProj::Tls(s) => s.poll_shutdown(cx),
        }
    }
}
