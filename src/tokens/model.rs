use std::fmt;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Length of a plaintext token: 16 random bytes, base32 without padding.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

const PLAINTEXT_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// Limits what a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
    PasswordReset,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
            Scope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued token. `plaintext` exists only in memory for one-time
/// delivery; storage keeps `hash`.
#[derive(Clone)]
pub struct Token {
    pub plaintext: String,
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: OffsetDateTime,
    pub scope: Scope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

pub fn generate_token(user_id: i64, ttl: Duration, scope: Scope) -> Result<Token, rand::Error> {
    let mut random = [0u8; 16];
    OsRng.try_fill_bytes(&mut random)?;

    let plaintext = encode_plaintext(&random);
    let hash = hash_plaintext(&plaintext);
    Ok(Token {
        plaintext,
        hash,
        user_id,
        expiry: OffsetDateTime::now_utc() + ttl,
        scope,
    })
}

pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

fn encode_plaintext(bytes: &[u8]) -> String {
    base32::encode(PLAINTEXT_ALPHABET, bytes)
}
