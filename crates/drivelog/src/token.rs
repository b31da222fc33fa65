//! Tamper-evident tokens standing in for reference-table identifiers.
//!
//! A token is the first 16 hex characters of `HMAC-SHA256(secret, "<id>|<tag>")`
//! followed by the URL-safe base64 of `"<id>|<tag>"`. The identifier is *not*
//! hidden, anyone can base64-decode the tail. What the prefix buys is that a
//! client cannot forge or alter a token without the secret, so raw ids coming
//! back from a form are never trusted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::category::Category;
use crate::error::Result;
use crate::storage::Storage;

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters of the MAC kept at the front of a token.
pub const MAC_PREFIX_LEN: usize = 16;

/// Bytes of randomness in a generated secret.
const GENERATED_SECRET_LEN: usize = 32;

/// A fresh random secret, hex encoded.
#[must_use]
pub fn generate_secret() -> String {
    let bytes: [u8; GENERATED_SECRET_LEN] = rand::random();
    hex::encode(bytes)
}

/// A token failed to decode.
///
/// Deliberately carries no detail: callers must not be able to tell a bad
/// signature from a wrong category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Encodes and verifies identifier tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenCodec {
    /// Create a codec keyed by `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// The codec for `storage`: keyed by the configured secret if there is
    /// one, otherwise by the secret kept in the database, which is generated
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored secret cannot be read or created.
    pub fn resolve(configured: Option<&str>, storage: &Storage) -> Result<Self> {
        match configured {
            Some(secret) => Ok(Self::new(secret)),
            None => {
                debug!("No token secret configured; using the one stored in the database");
                Ok(Self::new(storage.token_secret()?))
            }
        }
    }

    /// Produce the token for `id` in `category`.
    #[must_use]
    pub fn encode(&self, id: i64, category: Category) -> String {
        let payload = format!("{id}|{}", category.tag());
        let digest = self.mac(payload.as_bytes()).finalize().into_bytes();
        let mut token = hex::encode(digest);
        token.truncate(MAC_PREFIX_LEN);
        token.push_str(&URL_SAFE_NO_PAD.encode(payload.as_bytes()));
        token
    }

    /// Recover the identifier from `token`, which must have been issued for
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidToken`] if the token is malformed, was not produced
    /// with this codec's secret, or belongs to another category.
    pub fn decode(&self, token: &str, expected: Category) -> std::result::Result<i64, InvalidToken> {
        if token.len() < MAC_PREFIX_LEN || !token.is_char_boundary(MAC_PREFIX_LEN) {
            return Err(InvalidToken);
        }
        let (prefix, data) = token.split_at(MAC_PREFIX_LEN);

        // Lowercase only: hex decoding alone would accept an upper-cased
        // prefix as the same bytes.
        if !prefix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(InvalidToken);
        }
        let tag = hex::decode(prefix).map_err(|_| InvalidToken)?;

        let payload = URL_SAFE_NO_PAD.decode(data).map_err(|_| InvalidToken)?;
        self.mac(&payload)
            .verify_truncated_left(&tag)
            .map_err(|_| InvalidToken)?;

        let payload = std::str::from_utf8(&payload).map_err(|_| InvalidToken)?;
        let (id, category) = payload.split_once('|').ok_or(InvalidToken)?;
        if category != expected.tag() {
            return Err(InvalidToken);
        }
        id.parse().map_err(|_| InvalidToken)
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(payload);
        mac
    }
}
