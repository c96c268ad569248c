//! Addresses found in `From:` and `To:` header lines

use std::fmt::{self, Display, Formatter};

use crate::error::Error;
use crate::types::EmailAddress;

/// Field prefixes removed before an address is parsed
const FIELD_PREFIXES: &[&str] = &["to:", "from:"];

/// A mailbox with an optional display name
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

impl Address {
    pub fn new(name: Option<String>, address: String) -> Address {
        Address { name, address }
    }

    /// Parses a header line or value.
    ///
    /// `Name <address>` wins over `address (Name)`; anything else is taken
    /// whole as the address. Never fails: the worst case is an address equal
    /// to the trimmed input.
    pub fn parse(line: &str) -> Address {
        let line = strip_field_prefix(line).trim();

        let parsed = if let Some(idx) = line.rfind('<') {
            let inner = &line[idx + 1..];
            let inner = match inner.find('>') {
                Some(end) => &inner[..end],
                None => inner,
            };
            Address::new(non_empty(&line[..idx]), inner.trim().to_string())
        } else if let Some(idx) = line.find('(') {
            let inner = &line[idx + 1..];
            let inner = match inner.rfind(')') {
                Some(end) => &inner[..end],
                None => inner,
            };
            Address::new(non_empty(inner), line[..idx].trim().to_string())
        } else {
            Address::new(None, line.to_string())
        };

        if parsed.address.is_empty() {
            Address::new(parsed.name, line.to_string())
        } else {
            parsed
        }
    }

    /// The address as used in the SMTP envelope
    pub fn envelope(&self) -> Result<EmailAddress, Error> {
        EmailAddress::new(self.address.clone())
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

fn strip_field_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    for prefix in FIELD_PREFIXES {
        if trimmed.len() >= prefix.len()
            && trimmed.is_char_boundary(prefix.len())
            && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return &trimmed[prefix.len()..];
        }
    }
    trimmed
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
