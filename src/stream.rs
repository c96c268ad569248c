use std::fmt::Display;
use std::string::String;

use log::debug;
use tokio::io::{
    AsyncBufReadExt, AsyncRead as Read, AsyncWrite as Write, AsyncWriteExt, BufReader,
};

use crate::codec::ClientCodec;
use crate::commands::*;
use crate::error::{Error, SmtpResult};
use crate::extension::ClientId;
use crate::response::parse_response;

/// SMTP stream.
#[derive(Debug)]
pub struct SmtpStream<S: Read + Write + Unpin> {
    /// Inner stream.
    inner: BufReader<S>,
}

impl<S: Read + Write + Unpin> SmtpStream<S> {
    /// Creates new SMTP stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    /// Returns inner stream.
    ///
    /// Should only be used when there are no unread responses,
    /// because the buffer of `BufReader` may be lost.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Sends EHLO command and returns server response.
    pub async fn ehlo(&mut self, client_id: ClientId) -> SmtpResult {
        self.command(EhloCommand::new(client_id)).await
    }

    /// Send the given SMTP command to the server.
    pub async fn command(&mut self, command: impl Display) -> SmtpResult {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Sends the given SMTP command to the server without waiting for response.
    pub async fn send_command(&mut self, command: impl Display) -> Result<(), Error> {
        self.write(command.to_string().as_bytes()).await
    }

    /// Writes the given data to the server.
    async fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.inner.get_mut().write_all(string).await?;
        self.inner.get_mut().flush().await?;

        debug!(
            ">> {}",
            escape_crlf(String::from_utf8_lossy(string).as_ref())
        );
        Ok(())
    }

    /// Read an SMTP response from the wire.
    pub async fn read_response(&mut self) -> SmtpResult {
        let reader = &mut self.inner;
        let mut buffer = String::with_capacity(100);

        loop {
            let read = reader.read_line(&mut buffer).await?;
            if read == 0 {
                break;
            }
            debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    if response.is_positive() {
                        return Ok(response);
                    }

                    return Err(response.into());
                }
                Err(nom::Err::Failure(e)) => {
                    return Err(Error::Parsing(e.code));
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Error(e)) => {
                    return Err(Error::Parsing(e.code));
                }
            }
        }

        Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "incomplete response").into())
    }

    /// Sends DATA and returns a writer for the message content.
    pub async fn data(&mut self) -> Result<DataWriter<'_, S>, Error> {
        self.command(DataCommand).await?;
        Ok(DataWriter {
            stream: self,
            codec: ClientCodec::new(),
        })
    }
}

/// Message content writer, available between `DATA` and the end-of-data marker
#[derive(Debug)]
pub struct DataWriter<'a, S: Read + Write + Unpin> {
    stream: &'a mut SmtpStream<S>,
    codec: ClientCodec,
}

impl<'a, S: Read + Write + Unpin> DataWriter<'a, S> {
    /// Writes message content, applying transparency.
    pub async fn write(&mut self, content: &[u8]) -> Result<(), Error> {
        let inner = self.stream.inner.get_mut();
        self.codec.encode(content, inner).await?;
        debug!(">> [{} bytes of message content]", content.len());
        Ok(())
    }

    /// Sends the end-of-data marker and reads the final reply.
    pub async fn close(mut self) -> SmtpResult {
        let inner = self.stream.inner.get_mut();
        self.codec.finish(inner).await?;
        inner.flush().await?;
        debug!(">> .<CRLF>");

        self.stream.read_response().await
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
/// Used for debug displays
fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}
