//! Turns raw input into a complete message.
//!
//! Missing fields are filled in, the header block is put in a fixed order and
//! every line is terminated by CRLF.

pub mod address;
pub mod headers;
pub mod message_id;

use log::debug;

pub use self::address::Address;
pub use self::headers::HeaderSet;

use crate::types::Envelope;

/// Display name used when the input has no `From:`
pub const DEFAULT_FROM_NAME: &str = "Mini Mailer";
/// Envelope sender used when the input has no `From:`
pub const DEFAULT_FROM_ADDRESS: &str = "bounce.me@mini.mailer.msg";
/// Value of the `User-Agent` header
pub const USER_AGENT: &str = "Mini Mailer v0.1.2";

/// Input errors, detected before any connection is made
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// No usable `To:` header
    #[error("missing recipient: no To header")]
    MissingRecipient,
    /// `From:` does not hold a usable envelope address
    #[error("invalid sender address: {0:?}")]
    InvalidSender(String),
    /// `To:` does not hold a usable envelope address
    #[error("invalid recipient address: {0:?}")]
    InvalidRecipient(String),
}

/// Message composition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Add the `User-Agent` header
    pub user_agent: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { user_agent: true }
    }
}

/// Rendered message: header block and body, both CRLF-terminated
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Message {
    headers: String,
    body: String,
}

impl Message {
    pub fn headers(&self) -> &str {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Header block, one empty line, body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.headers.len() + 2 + self.body.len());
        bytes.extend_from_slice(self.headers.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(self.body.as_bytes());
        bytes
    }
}

/// A message ready for delivery, with its envelope
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PreparedMessage {
    /// Envelope sender, taken from the `From:` header
    pub sender: Address,
    /// Envelope recipient, taken from the `To:` header
    pub recipient: Address,
    /// `sender` and `recipient`, checked for use in `MAIL FROM` and `RCPT TO`
    pub envelope: Envelope,
    /// Value of the `Message-ID` header
    pub message_id: String,
    pub message: Message,
}

/// Builds a message from raw input.
pub fn compose(input: &str, options: BuildOptions) -> Result<PreparedMessage, MessageError> {
    let (mut headers, rest) = HeaderSet::parse(input);

    let recipient = extract_recipient(&headers)?;
    let sender = ensure_from(&mut headers);
    let envelope = Envelope::new(
        sender
            .envelope()
            .map_err(|_| MessageError::InvalidSender(sender.address.clone()))?,
        recipient
            .envelope()
            .map_err(|_| MessageError::InvalidRecipient(recipient.address.clone()))?,
    );
    let message_id = ensure_message_id(&mut headers);
    ensure_date(&mut headers);
    if options.user_agent {
        headers.remove("User-Agent");
        headers.insert("User-Agent", USER_AGENT);
    }

    let message = Message {
        headers: headers.serialize(),
        body: normalize_body(rest),
    };
    debug!("composed message {} for <{}>", message_id, recipient.address);

    Ok(PreparedMessage {
        sender,
        recipient,
        envelope,
        message_id,
        message,
    })
}

/// Envelope recipient from the `To:` header.
pub fn extract_recipient(headers: &HeaderSet) -> Result<Address, MessageError> {
    match headers.get("To") {
        Some((_, value)) => {
            let recipient = Address::parse(value);
            if recipient.address.is_empty() {
                Err(MessageError::MissingRecipient)
            } else {
                Ok(recipient)
            }
        }
        None => Err(MessageError::MissingRecipient),
    }
}

/// Envelope sender from the `From:` header, inserting the default one if absent.
pub fn ensure_from(headers: &mut HeaderSet) -> Address {
    match headers.get("From") {
        Some((_, value)) => Address::parse(value),
        None => {
            let from = Address::new(
                Some(DEFAULT_FROM_NAME.to_string()),
                DEFAULT_FROM_ADDRESS.to_string(),
            );
            headers.insert("From", &from.to_string());
            from
        }
    }
}

/// Keeps a supplied `Message-ID` as written, otherwise generates one.
pub fn ensure_message_id(headers: &mut HeaderSet) -> String {
    match headers.remove("Message-ID") {
        Some((name, value)) => {
            headers.insert(&name, &value);
            value
        }
        None => {
            let id = message_id::generate();
            headers.insert("Message-ID", &id);
            id
        }
    }
}

/// Keeps a supplied `Date` as written; never makes one up.
pub fn ensure_date(headers: &mut HeaderSet) {
    if let Some((name, value)) = headers.remove("Date") {
        headers.insert(&name, &value);
    }
}

/// Re-terminates every body line with CRLF.
fn normalize_body(body: &str) -> String {
    let mut normalized = String::with_capacity(body.len() + body.len() / 32);
    for line in body.lines() {
        normalized.push_str(line);
        normalized.push_str("\r\n");
    }
    normalized
}
