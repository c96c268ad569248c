//! Opening the tunnel to the SMTP server

use async_trait::async_trait;
use fast_socks5::client::{Config, Socks5Stream};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::Error;

/// Loopback address the SOCKS5 proxy listens on
pub const PROXY_HOST: &str = "127.0.0.1";
/// Default SOCKS5 proxy port
pub const DEFAULT_PROXY_PORT: u16 = 9050;

/// Opens a connection to `host:port`
#[async_trait]
pub trait Dialer: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Stream, Error>;
}

/// Connects through the local SOCKS5 proxy; name resolution is left to the proxy.
#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    proxy_addr: String,
}

impl Socks5Dialer {
    pub fn new(proxy_port: u16) -> Socks5Dialer {
        Socks5Dialer {
            proxy_addr: format!("{}:{}", PROXY_HOST, proxy_port),
        }
    }

    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }
}

impl Default for Socks5Dialer {
    fn default() -> Self {
        Socks5Dialer::new(DEFAULT_PROXY_PORT)
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    type Stream = Socks5Stream<TcpStream>;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Stream, Error> {
        debug!("socks5 connect to {}:{} via {}", host, port, self.proxy_addr);
        let stream = Socks5Stream::connect(
            self.proxy_addr.as_str(),
            host.to_string(),
            port,
            Config::default(),
        )
        .await?;
        Ok(stream)
    }
}
