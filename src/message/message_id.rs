//! Message-ID generation

use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use rand::rngs::OsRng;
use rand::RngCore;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Used in place of a letter group when the random source fails
pub const FALLBACK_LETTERS: &str = "xxxxx";

/// Number of random bytes rendered in hex before the timestamp
const ID_BYTES: usize = 5;

/// Generates `<{hex}.{unix seconds}@{5 letters}.{2 letters}>` from the OS random source.
pub fn generate() -> String {
    generate_with(&mut OsRng)
}

/// Same as [`generate`] with a caller-supplied random source.
///
/// A failing source never makes this fail: letter groups fall back to
/// [`FALLBACK_LETTERS`] and the hex part is rendered from zero bytes.
pub fn generate_with<R: RngCore>(rng: &mut R) -> String {
    let mut bytes = [0u8; ID_BYTES];
    if let Err(err) = rng.try_fill_bytes(&mut bytes) {
        warn!("random source failed, message id uses zero bytes: {}", err);
        bytes = [0u8; ID_BYTES];
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let domain = random_letters(rng, 5);
    let tld = random_letters(rng, 2);

    format!("<{}.{}@{}.{}>", hex::encode(bytes), timestamp, domain, tld)
}

/// `n` random lowercase letters, or [`FALLBACK_LETTERS`]
pub fn random_letters<R: RngCore>(rng: &mut R, n: usize) -> String {
    let mut bytes = vec![0u8; n];
    match rng.try_fill_bytes(&mut bytes) {
        Ok(()) => bytes
            .iter()
            .map(|b| LETTERS[usize::from(*b) % LETTERS.len()] as char)
            .collect(),
        Err(err) => {
            warn!("random source failed, using fallback letters: {}", err);
            FALLBACK_LETTERS.to_string()
        }
    }
}
