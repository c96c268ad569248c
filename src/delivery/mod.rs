//! One SMTP submission through the proxy tunnel.
//!
//! The session walks a fixed sequence of states, failing as a whole on the
//! first fatal step:
//!
//! ProxyConnect, Greet, TlsUpgrade, Authenticate, Envelope, DataTransfer, Quit.
//!
//! STARTTLS is opportunistic and fails open: if it cannot be negotiated the
//! message is sent in cleartext through the tunnel. A failed QUIT is ignored.

pub mod dialer;

use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

pub use self::dialer::{Dialer, Socks5Dialer, DEFAULT_PROXY_PORT, PROXY_HOST};

use crate::authentication::{Credentials, DEFAULT_MECHANISMS};
use crate::error::Error;
use crate::message::PreparedMessage;
use crate::net::{ClientTlsParameters, NetworkStream};
use crate::runtime::with_timeout;
use crate::smtp_client::{SmtpClient, SmtpTransport};

/// Where and how to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub host: String,
    pub port: u16,
    pub proxy_port: u16,
    pub username: String,
    pub password: String,
    /// Check the server certificate and name during STARTTLS
    pub verify_certificates: bool,
    /// Bound on every network step
    pub timeout: Option<Duration>,
}

impl DeliveryTarget {
    pub fn new(host: String, port: u16) -> DeliveryTarget {
        DeliveryTarget {
            host,
            port,
            proxy_port: DEFAULT_PROXY_PORT,
            username: String::new(),
            password: String::new(),
            verify_certificates: false,
            timeout: None,
        }
    }

    /// Credentials, when both username and password are set
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(&self.username, &self.password)
    }
}

/// A fatal step of the session
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("Error connecting: {0}")]
    Connect(#[source] Error),
    #[error("Error creating SMTP client: {0}")]
    Client(#[source] Error),
    #[error("Error authenticating: {0}")]
    Auth(#[source] Error),
    #[error("Error MAIL FROM: {0}")]
    MailFrom(#[source] Error),
    #[error("Error RCPT TO: {0}")]
    RcptTo(#[source] Error),
    #[error("Error getting data writer: {0}")]
    Data(#[source] Error),
    #[error("Error writing message: {0}")]
    Write(#[source] Error),
    #[error("Error closing writer: {0}")]
    Close(#[source] Error),
}

type Transport<S> = SmtpTransport<NetworkStream<S>>;

enum State<S: AsyncRead + AsyncWrite + Unpin> {
    ProxyConnect,
    Greet(NetworkStream<S>),
    TlsUpgrade(Transport<S>),
    Authenticate(Transport<S>),
    Envelope(Transport<S>),
    DataTransfer(Transport<S>),
    Quit(Transport<S>),
    Done,
}

/// A single delivery attempt
#[derive(Debug)]
pub struct Session<'a, D: Dialer> {
    target: &'a DeliveryTarget,
    dialer: &'a D,
    message: &'a PreparedMessage,
}

impl<'a, D: Dialer> Session<'a, D> {
    pub fn new(target: &'a DeliveryTarget, dialer: &'a D, message: &'a PreparedMessage) -> Self {
        Session {
            target,
            dialer,
            message,
        }
    }

    /// Runs every step in order.
    pub async fn run(&self) -> Result<(), DeliveryError> {
        let mut state = State::ProxyConnect;
        loop {
            state = match state {
                State::ProxyConnect => self.proxy_connect().await?,
                State::Greet(stream) => self.greet(stream).await?,
                State::TlsUpgrade(transport) => self.tls_upgrade(transport).await?,
                State::Authenticate(transport) => self.authenticate(transport).await?,
                State::Envelope(transport) => self.envelope(transport).await?,
                State::DataTransfer(transport) => self.data_transfer(transport).await?,
                State::Quit(transport) => self.quit(transport).await,
                State::Done => return Ok(()),
            };
        }
    }

    async fn timed<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        with_timeout(self.target.timeout, f).await
    }

    async fn dial(&self) -> Result<NetworkStream<D::Stream>, DeliveryError> {
        debug!(
            "Connecting to {}:{} via SOCKS5 proxy",
            self.target.host, self.target.port
        );
        let stream = self
            .timed(self.dialer.dial(&self.target.host, self.target.port))
            .await
            .map_err(DeliveryError::Connect)?;
        Ok(NetworkStream::Plain(stream))
    }

    async fn open(
        &self,
        stream: NetworkStream<D::Stream>,
    ) -> Result<Transport<D::Stream>, DeliveryError> {
        debug!("Connected, establishing SMTP session");
        self.timed(SmtpTransport::new(SmtpClient::new(), stream))
            .await
            .map_err(DeliveryError::Client)
    }

    async fn proxy_connect(&self) -> Result<State<D::Stream>, DeliveryError> {
        Ok(State::Greet(self.dial().await?))
    }

    async fn greet(
        &self,
        stream: NetworkStream<D::Stream>,
    ) -> Result<State<D::Stream>, DeliveryError> {
        Ok(State::TlsUpgrade(self.open(stream).await?))
    }

    async fn tls_upgrade(
        &self,
        mut transport: Transport<D::Stream>,
    ) -> Result<State<D::Stream>, DeliveryError> {
        debug!("Starting TLS");
        if let Err(err) = self.timed(transport.starttls()).await {
            warn!("STARTTLS not negotiated, continuing in cleartext: {}", err);
            return Ok(State::Authenticate(transport));
        }

        match self.secure(transport.into_inner()).await {
            Ok(transport) => {
                debug!("connection encrypted");
                Ok(State::Authenticate(transport))
            }
            Err(err) => {
                // The old connection is mid-handshake and cannot carry SMTP anymore.
                warn!("TLS handshake failed, reconnecting in cleartext: {}", err);
                let stream = self.dial().await?;
                Ok(State::Authenticate(self.open(stream).await?))
            }
        }
    }

    async fn secure(
        &self,
        stream: NetworkStream<D::Stream>,
    ) -> Result<Transport<D::Stream>, Error> {
        let parameters = ClientTlsParameters::opportunistic(
            self.target.host.clone(),
            self.target.verify_certificates,
        );
        let stream = self
            .timed(async { stream.upgrade_tls(&parameters).await.map_err(Error::from) })
            .await?;
        self.timed(SmtpTransport::new(SmtpClient::new().without_greeting(), stream))
            .await
    }

    async fn authenticate(
        &self,
        mut transport: Transport<D::Stream>,
    ) -> Result<State<D::Stream>, DeliveryError> {
        if let Some(credentials) = self.target.credentials() {
            debug!("SMTP: AUTH");
            self.timed(transport.try_login(&credentials, DEFAULT_MECHANISMS))
                .await
                .map_err(DeliveryError::Auth)?;
        }
        Ok(State::Envelope(transport))
    }

    async fn envelope(
        &self,
        mut transport: Transport<D::Stream>,
    ) -> Result<State<D::Stream>, DeliveryError> {
        let envelope = &self.message.envelope;

        debug!("SMTP: MAIL FROM:{}", envelope.from());
        self.timed(transport.mail(envelope.from()))
            .await
            .map_err(DeliveryError::MailFrom)?;

        debug!("SMTP: RCPT TO:{}", envelope.to());
        self.timed(transport.rcpt(envelope.to()))
            .await
            .map_err(DeliveryError::RcptTo)?;

        Ok(State::DataTransfer(transport))
    }

    async fn data_transfer(
        &self,
        mut transport: Transport<D::Stream>,
    ) -> Result<State<D::Stream>, DeliveryError> {
        let payload = self.message.message.to_bytes();
        let timeout = self.target.timeout;

        let mut writer = with_timeout(timeout, transport.data())
            .await
            .map_err(DeliveryError::Data)?;
        debug!("SMTP: DATA");
        debug!(
            "Headers being sent:\n{}--- Message body omitted ---",
            self.message.message.headers()
        );

        with_timeout(timeout, writer.write(&payload))
            .await
            .map_err(DeliveryError::Write)?;
        let response = with_timeout(timeout, writer.close())
            .await
            .map_err(DeliveryError::Close)?;
        info!(
            "{} accepted: {}",
            self.message.message_id,
            response.first_line().unwrap_or("no response")
        );

        Ok(State::Quit(transport))
    }

    async fn quit(&self, mut transport: Transport<D::Stream>) -> State<D::Stream> {
        debug!("SMTP: QUIT");
        if let Err(err) = self.timed(transport.quit()).await {
            debug!("QUIT failed, ignoring: {}", err);
        }
        State::Done
    }
}

/// Delivers `message` to `target`.
pub async fn deliver<D: Dialer>(
    message: &PreparedMessage,
    target: &DeliveryTarget,
    dialer: &D,
) -> Result<(), DeliveryError> {
    Session::new(target, dialer, message).run().await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::{compose, BuildOptions};
    use crate::mock::{MockStream, ScriptedDialer};

    fn prepared(input: &str) -> PreparedMessage {
        compose(input, BuildOptions::default()).unwrap()
    }

    fn target() -> DeliveryTarget {
        DeliveryTarget::new("mx.example.org".to_string(), 25)
    }

    const PLAIN_SERVER: &[u8] = b"220 mx ESMTP\r\n\
        250 mx\r\n\
        502 not implemented\r\n\
        250 sender ok\r\n\
        250 recipient ok\r\n\
        354 go ahead\r\n\
        250 queued\r\n\
        221 bye\r\n";

    #[test]
    fn test_target_defaults() {
        let target = target();
        assert_eq!(target.proxy_port, 9050);
        assert!(!target.verify_certificates);
        assert_eq!(target.timeout, None);
        assert!(target.credentials().is_none());
    }

    #[test]
    fn test_target_credentials_need_both_parts() {
        let mut target = target();
        target.username = "alice".to_string();
        assert!(target.credentials().is_none());
        target.password = "secret".to_string();
        assert_eq!(target.credentials().unwrap().username(), "alice");
    }

    #[tokio::test]
    async fn test_cleartext_session() {
        let mock = MockStream::with_vec(PLAIN_SERVER.to_vec());
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("From: A <a@x.com>\nTo: B <b@y.com>\n\nhello\n");

        deliver(&message, &target(), &dialer).await.unwrap();

        let sent = transcript.contents();
        assert!(sent.starts_with("EHLO localhost\r\nSTARTTLS\r\nMAIL FROM:<a@x.com>\r\nRCPT TO:<b@y.com>\r\nDATA\r\n"));
        assert!(sent.ends_with("\r\n\r\nhello\r\n.\r\nQUIT\r\n"));
        assert_eq!(dialer.dials(), 1);
        assert_eq!(dialer.targets(), vec![("mx.example.org".to_string(), 25)]);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let dialer = ScriptedDialer::new(vec![]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Connect(_)));
    }

    #[tokio::test]
    async fn test_bad_greeting() {
        let dialer = ScriptedDialer::new(vec![MockStream::with_vec(b"554 no\r\n".to_vec())]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Client(_)));
        assert!(err.to_string().starts_with("Error creating SMTP client"));
    }

    #[tokio::test]
    async fn test_rejected_sender() {
        let mock = MockStream::with_vec(b"220 mx\r\n250 mx\r\n502 not implemented\r\n553 not you\r\n".to_vec());
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::MailFrom(Error::Permanent(_))));
        assert!(!transcript.contents().contains("RCPT"));
    }

    #[tokio::test]
    async fn test_rejected_recipient() {
        let mock = MockStream::with_vec(b"220 mx\r\n250 mx\r\n502 not implemented\r\n250 ok\r\n450 mailbox busy\r\n".to_vec());
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::RcptTo(Error::Transient(_))));
        assert_eq!(err.to_string(), "Error RCPT TO: transient: mailbox busy");
    }

    #[tokio::test]
    async fn test_rejected_data() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250 mx\r\n502 not implemented\r\n250 ok\r\n250 ok\r\n554 no data for you\r\n".to_vec(),
        );
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Data(_)));
    }

    #[tokio::test]
    async fn test_rejected_message() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250 mx\r\n502 not implemented\r\n250 ok\r\n250 ok\r\n354 go\r\n552 too big\r\n".to_vec(),
        );
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        let err = deliver(&message, &target(), &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Close(_)));
    }

    #[tokio::test]
    async fn test_quit_failure_is_ignored() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250 mx\r\n502 not implemented\r\n250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n".to_vec(),
        );
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        assert!(deliver(&message, &target(), &dialer).await.is_ok());
    }

    #[tokio::test]
    async fn test_starttls_refused_continues_in_cleartext() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250-mx\r\n250 STARTTLS\r\n454 TLS not available\r\n\
              250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n"
                .to_vec(),
        );
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        deliver(&message, &target(), &dialer).await.unwrap();
        assert!(transcript
            .contents()
            .starts_with("EHLO localhost\r\nSTARTTLS\r\nMAIL FROM:<bounce.me@mini.mailer.msg>\r\n"));
        assert_eq!(dialer.dials(), 1);
    }

    #[tokio::test]
    async fn test_authentication() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250-mx\r\n250 AUTH PLAIN\r\n502 not implemented\r\n235 ok\r\n\
              250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n"
                .to_vec(),
        );
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");
        let mut target = target();
        target.username = "user".to_string();
        target.password = "password".to_string();

        deliver(&message, &target, &dialer).await.unwrap();
        assert!(transcript
            .contents()
            .contains("EHLO localhost\r\nSTARTTLS\r\nAUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\nMAIL FROM:"));
    }

    #[tokio::test]
    async fn test_failed_authentication() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250-mx\r\n250 AUTH PLAIN\r\n502 not implemented\r\n535 nope\r\n".to_vec(),
        );
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");
        let mut target = target();
        target.username = "user".to_string();
        target.password = "wrong".to_string();

        let err = deliver(&message, &target, &dialer).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Auth(_)));
    }

    #[tokio::test]
    async fn test_starttls_sent_when_not_advertised() {
        let mock = MockStream::with_vec(PLAIN_SERVER.to_vec());
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");

        deliver(&message, &target(), &dialer).await.unwrap();
        assert!(transcript
            .contents()
            .starts_with("EHLO localhost\r\nSTARTTLS\r\nMAIL FROM:"));
        assert_eq!(dialer.dials(), 1);
    }

    #[tokio::test]
    async fn test_authentication_when_not_advertised() {
        let mock = MockStream::with_vec(
            b"220 mx\r\n250 mx\r\n502 not implemented\r\n235 ok\r\n\
              250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n"
                .to_vec(),
        );
        let transcript = mock.transcript();
        let dialer = ScriptedDialer::new(vec![mock]);
        let message = prepared("To: c@z.com\n\nhi\n");
        let mut target = target();
        target.username = "u".to_string();
        target.password = "p".to_string();

        deliver(&message, &target, &dialer).await.unwrap();
        assert!(transcript
            .contents()
            .starts_with("EHLO localhost\r\nSTARTTLS\r\nAUTH PLAIN AHUAcA==\r\nMAIL FROM:"));
    }
}
