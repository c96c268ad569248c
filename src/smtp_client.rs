use log::{debug, info};
use tokio::io::{AsyncRead as Read, AsyncWrite as Write};

use crate::authentication::{Credentials, Mechanism};
use crate::commands::*;
use crate::error::{Error, SmtpResult};
use crate::extension::{ClientId, Extension, MailBodyParameter, MailParameter, ServerInfo};
use crate::stream::{DataWriter, SmtpStream};
use crate::types::EmailAddress;

/// Contains client configuration
#[derive(Debug, Clone)]
pub struct SmtpClient {
    /// Name sent during EHLO
    hello_name: ClientId,
    /// Whether to expect greeting.
    /// Normally the server sends a greeting after connection,
    /// but not after STARTTLS.
    expect_greeting: bool,
}

impl Default for SmtpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the SMTP `SmtpTransport`
impl SmtpClient {
    /// Creates a new SMTP client.
    ///
    /// It does not connect to the server, but only creates the `SmtpTransport`.
    ///
    /// The EHLO name is always `localhost`.
    pub fn new() -> Self {
        SmtpClient {
            hello_name: Default::default(),
            expect_greeting: true,
        }
    }

    /// Do not expect greeting.
    ///
    /// Could be used for STARTTLS connections.
    pub fn without_greeting(self) -> SmtpClient {
        Self {
            expect_greeting: false,
            ..self
        }
    }
}

/// Structure that implements the high level SMTP client
#[derive(Debug)]
pub struct SmtpTransport<S: Read + Write + Unpin> {
    /// Information about the server
    server_info: ServerInfo,
    /// Low level client
    stream: SmtpStream<S>,
}

impl<S: Read + Write + Unpin> SmtpTransport<S> {
    /// Creates a new SMTP transport: reads the greeting, then says EHLO.
    pub async fn new(builder: SmtpClient, stream: S) -> Result<Self, Error> {
        let mut stream = SmtpStream::new(stream);
        if builder.expect_greeting {
            let _greeting = stream.read_response().await?;
        }
        let ehlo_response = stream.ehlo(builder.hello_name.clone()).await?;
        let server_info = ServerInfo::from_response(&ehlo_response)?;

        // Print server information
        debug!("server {}", server_info);

        let transport = SmtpTransport {
            server_info,
            stream,
        };
        Ok(transport)
    }

    /// Try to login with the given accepted mechanisms.
    ///
    /// The first mechanism of `accepted_mechanisms` the server supports is
    /// used. When the server advertises none of them, PLAIN is tried anyway.
    pub async fn try_login(
        &mut self,
        credentials: &Credentials,
        accepted_mechanisms: &[Mechanism],
    ) -> SmtpResult {
        let mechanism = match accepted_mechanisms
            .iter()
            .find(|mechanism| self.server_info.supports_auth_mechanism(**mechanism))
        {
            Some(mechanism) => *mechanism,
            None => {
                debug!("no accepted AUTH mechanism advertised, trying PLAIN");
                Mechanism::Plain
            }
        };
        info!("authenticating as {} with {}", credentials.username(), mechanism);
        self.auth(mechanism, credentials).await
    }

    /// Sends STARTTLS, whether or not the server advertised it.
    ///
    /// On success the caller should upgrade the stream returned by
    /// [`SmtpTransport::into_inner`]. On failure the cleartext session is
    /// still usable.
    pub async fn starttls(&mut self) -> SmtpResult {
        if !self.supports_feature(Extension::StartTls) {
            debug!("STARTTLS not advertised, sending it anyway");
        }

        self.stream.command(StarttlsCommand).await
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn supports_feature(&self, keyword: Extension) -> bool {
        self.server_info.supports_feature(keyword)
    }

    /// Closes the SMTP transaction if possible.
    pub async fn quit(&mut self) -> SmtpResult {
        self.stream.command(QuitCommand).await
    }

    /// Sends an AUTH command with the given mechanism, and handles challenge if needed
    pub async fn auth(&mut self, mechanism: Mechanism, credentials: &Credentials) -> SmtpResult {
        let mut challenges = 10;
        let mut response = self
            .stream
            .command(AuthCommand::new(mechanism, credentials.clone(), None)?)
            .await?;

        while challenges > 0 && response.has_code(334) {
            challenges -= 1;
            response = self
                .stream
                .command(AuthCommand::new_from_response(
                    mechanism,
                    credentials.clone(),
                    &response,
                )?)
                .await?;
        }

        if challenges == 0 {
            Err(Error::ResponseParsing("Unexpected number of challenges"))
        } else {
            Ok(response)
        }
    }

    /// Sends `MAIL FROM` with the parameters the server supports.
    pub async fn mail(&mut self, sender: &EmailAddress) -> SmtpResult {
        let mut mail_options = vec![];

        if self.supports_feature(Extension::EightBitMime) {
            mail_options.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }

        if self.supports_feature(Extension::SmtpUtfEight) {
            mail_options.push(MailParameter::SmtpUtfEight);
        } else if !sender.is_ascii() {
            debug!("sender is not ASCII but SMTPUTF8 is not in use");
        }

        self.stream
            .command(MailCommand::new(Some(sender.clone()), mail_options))
            .await
    }

    /// Sends `RCPT TO`.
    pub async fn rcpt(&mut self, recipient: &EmailAddress) -> SmtpResult {
        let response = self
            .stream
            .command(RcptCommand::new(recipient.clone()))
            .await?;
        debug!("to=<{}>", recipient);
        Ok(response)
    }

    /// Sends `DATA` and returns the writer for the message content.
    pub async fn data(&mut self) -> Result<DataWriter<'_, S>, Error> {
        self.stream.data().await
    }
}
