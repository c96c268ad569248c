use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::Error;

/// Envelope address, as sent in `MAIL FROM` and `RCPT TO`
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(address: String) -> Result<EmailAddress, Error> {
        // Do basic checks to avoid injection of control characters into SMTP protocol.  Actual
        // email validation should be done by the server.
        if address.is_empty()
            || address.chars().any(|c| {
                c.is_ascii_control() || c.is_whitespace() || c == '<' || c == '>'
            })
        {
            return Err(Error::InvalidAddress(address));
        }

        Ok(EmailAddress(address))
    }

    /// Whether the address needs the `SMTPUTF8` extension
    pub fn is_ascii(&self) -> bool {
        self.0.is_ascii()
    }
}

impl FromStr for EmailAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailAddress::new(s.to_string())
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Envelope of a message: one sender, one recipient
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipient address
    forward_path: EmailAddress,
    /// The envelope sender address
    reverse_path: EmailAddress,
}

impl Envelope {
    pub fn new(from: EmailAddress, to: EmailAddress) -> Envelope {
        Envelope {
            forward_path: to,
            reverse_path: from,
        }
    }

    /// Destination address of the envelope
    pub fn to(&self) -> &EmailAddress {
        &self.forward_path
    }

    /// Source address of the envelope
    pub fn from(&self) -> &EmailAddress {
        &self.reverse_path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_email_address() {
        assert!(EmailAddress::new("foobar@example.org".to_string()).is_ok());
        assert!(EmailAddress::new("bounce.me@mini.mailer.msg".to_string()).is_ok());
        assert!(EmailAddress::new("foo\rbar@localhost".to_string()).is_err());
        assert!(EmailAddress::new(
            "617b5772c6d10feda41fc6e0e43b976c4cc9383d3729310d3dc9e1332f0d9acd@yggmail".to_string()
        )
        .is_ok());
        assert!(EmailAddress::new(">foobar@example.org".to_string()).is_err());
        assert!(EmailAddress::new("foo bar@example.org".to_string()).is_err());
        assert!(EmailAddress::new("foobar@exa\r\nmple.org".to_string()).is_err());
        assert!(EmailAddress::new(String::new()).is_err());
    }

    #[test]
    fn test_utf8_address() {
        let address: EmailAddress = "jörg@example.org".parse().unwrap();
        assert!(!address.is_ascii());
        assert!(EmailAddress::new("joerg@example.org".to_string())
            .unwrap()
            .is_ascii());
    }
}
