//! Per-request identifiers for correlating log lines.
//!
//! An id is eight random ASCII letters followed by the current unix time in
//! seconds, in lowercase hex: `qZbTnKxa66f1c2d0`. The timestamp keeps ids from
//! different seconds apart even if the letters collide. Ids are practically
//! unique within one process run and nothing more; they are not meant to
//! identify requests across services.
//!
//! # When the OS has no randomness
//!
//! If the operating system's random source fails, the letters come from a
//! process-wide counter instead and a `WARN` event is emitted. Log
//! correlation keeps working; ids become guessable, which does not matter for
//! logging.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TOKEN_LEN: usize = 8;
/// Largest multiple of 52 that fits in a byte. Bytes at or above it are
/// rejected so every letter is equally likely.
const UNBIASED_LIMIT: u8 = (256 - 256 % ALPHABET.len()) as u8;

/// Counter behind the fallback tokens.
static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An opaque request identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh id.
    pub fn generate() -> Self {
        let token = match random_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "os random source unavailable, using counter request id");
                counter_token(FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed))
            }
        };
        Self(format!("{token}{:x}", unix_seconds()))
    }

    /// Wraps an existing id, e.g. one propagated by an upstream proxy.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn random_token() -> Result<String, rand::Error> {
    let mut token = String::with_capacity(TOKEN_LEN);
    let mut bytes = [0u8; TOKEN_LEN * 2];
    while token.len() < TOKEN_LEN {
        OsRng.try_fill_bytes(&mut bytes)?;
        let missing = TOKEN_LEN - token.len();
        token.extend(unbiased_letters(&bytes).take(missing));
    }
    Ok(token)
}

/// Maps random bytes to letters, skipping the ones that would skew the
/// distribution.
fn unbiased_letters(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    bytes
        .iter()
        .filter(|&&b| b < UNBIASED_LIMIT)
        .map(|&b| letter(usize::from(b)))
}

/// Encodes `n` as `TOKEN_LEN` base-52 letters, least significant first.
fn counter_token(mut n: u64) -> String {
    let base = ALPHABET.len() as u64;
    (0..TOKEN_LEN)
        .map(|_| {
            let digit = (n % base) as usize;
            n /= base;
            letter(digit)
        })
        .collect()
}

fn letter(n: usize) -> char {
    char::from(ALPHABET[n % ALPHABET.len()])
}

fn unix_seconds() -> u64 {
    // A clock before 1970 only degrades the suffix, never the request.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
