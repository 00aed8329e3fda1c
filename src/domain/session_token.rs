//! Unguessable, URL-safe session tokens.
//!
//! A [`SessionToken`] is `n` bytes from the thread-local CSPRNG encoded as
//! unpadded base64url, so it can be dropped straight into a `?join=` or
//! `?watch=` query string. Possession of the token is the only credential.

use std::borrow::Borrow;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Default number of random bytes per token (16 characters once encoded).
pub const DEFAULT_TOKEN_BYTES: usize = 12;

/// Tokens shorter than this are never generated, whatever the config says.
pub const MIN_TOKEN_BYTES: usize = 8;

/// Secret string granting access to a session as a player or spectator.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh random token from `len` bytes of entropy
    /// (at least [`MIN_TOKEN_BYTES`]).
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let mut bytes = vec![0u8; len.max(MIN_TOKEN_BYTES)];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Tokens are credentials: keep them out of `{:?}` log output.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}
