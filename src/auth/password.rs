use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    /// Hash checked when no account matches, so unknown and known emails
    /// cost the same argon2 work.
    static ref DECOY: Option<Credential> = Credential::set("teamfinder-decoy-password").ok();
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(password_hash::Error),

    #[error("stored password hash is unusable: {0}")]
    Verify(password_hash::Error),
}

/// A user's password. Only the hash is ever persisted; the plaintext is kept
/// in memory after [`Credential::set`] so it can be validated.
#[derive(Clone)]
pub struct Credential {
    plaintext: Option<String>,
    hash: String,
}

impl Credential {
    pub fn set(plaintext: &str) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                CredentialError::Hashing(e)
            })?
            .to_string();
        Ok(Self {
            plaintext: Some(plaintext.to_string()),
            hash,
        })
    }

    /// Rehydrates a credential loaded from storage.
    pub fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash,
        }
    }

    /// A mismatch is `Ok(false)`; only an unusable stored hash is an error.
    pub fn matches(&self, plaintext: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            CredentialError::Verify(e)
        })?;
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Verify(e)),
        }
    }

    /// Runs a full verification against the decoy hash. Always `false`.
    pub fn match_decoy(plaintext: &str) -> bool {
        if let Some(decoy) = DECOY.as_ref() {
            let _ = decoy.matches(plaintext);
        }
        false
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").finish_non_exhaustive()
    }
}
