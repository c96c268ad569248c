//! Header storage and rendering
//!
//! Headers are kept in a plain map; the emission order is only decided when
//! the block is rendered.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Headers emitted first, by rank. Everything else follows sorted by name.
const HEADER_PRIORITY: &[&str] = &[
    "from",
    "reply-to",
    "newsgroups",
    "subject",
    "date",
    "message-id",
    "mime-version",
    "content-transfer-encoding",
    "content-type",
    "references",
    "organization",
];

/// Rank of a header in the priority table, starting at 1
pub fn priority(name: &str) -> Option<usize> {
    HEADER_PRIORITY
        .iter()
        .position(|known| known.eq_ignore_ascii_case(name))
        .map(|idx| idx + 1)
}

/// Emission order: ranked headers by rank, then the others by name.
fn compare(a: &str, b: &str) -> Ordering {
    match (priority(a), priority(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Header fields keyed by their name as written
///
/// A name holds a single value; inserting it again replaces the value.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct HeaderSet {
    fields: HashMap<String, String>,
}

impl HeaderSet {
    pub fn new() -> HeaderSet {
        HeaderSet::default()
    }

    /// Parses `Name: Value` lines up to the first empty line.
    ///
    /// Returns the headers and whatever follows the empty line. Lines
    /// without a colon are skipped. Without an empty line, everything is
    /// header and the remainder is empty.
    pub fn parse(input: &str) -> (HeaderSet, &str) {
        let mut headers = HeaderSet::new();
        let mut rest = input;

        while !rest.is_empty() {
            let (line, next) = match rest.find('\n') {
                Some(idx) => (&rest[..idx], &rest[idx + 1..]),
                None => (rest, ""),
            };
            rest = next;

            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }

        (headers, rest)
    }

    /// Sets `name` to `value`, replacing a field of the exact same name
    pub fn insert(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
    }

    /// First field whose name matches case-insensitively, as `(name, value)`
    pub fn get(&self, name: &str) -> Option<(&str, &str)> {
        let mut matches: Vec<(&str, &str)> = self
            .fields
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        matches.sort_unstable();
        matches.into_iter().next()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes every field matching `name` case-insensitively, returning the
    /// one [`HeaderSet::get`] would have returned.
    pub fn remove(&mut self, name: &str) -> Option<(String, String)> {
        let mut removed: Vec<(String, String)> = Vec::new();
        self.fields.retain(|key, value| {
            if key.eq_ignore_ascii_case(name) {
                removed.push((key.clone(), value.clone()));
                false
            } else {
                true
            }
        });
        removed.sort_unstable();
        removed.into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in emission order
    pub fn ordered(&self) -> Vec<(&str, &str)> {
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        fields.sort_by(|a, b| compare(a.0, b.0));
        fields
    }

    /// Renders the block, every field terminated by CRLF
    pub fn serialize(&self) -> String {
        let mut block = String::new();
        for (name, value) in self.ordered() {
            block.push_str(name);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        block
    }
}
