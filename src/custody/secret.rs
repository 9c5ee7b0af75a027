//! Wrappers for plaintext secret material
//!
//! Both types zero their buffer on drop and never print their contents.

use crate::error::WalletError;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// A recovery phrase in plaintext
pub struct SecretPhrase(Zeroizing<String>);

impl SecretPhrase {
    pub fn new(phrase: String) -> Self {
        Self(Zeroizing::new(phrase))
    }

    /// Borrow the plaintext; callers must not copy it into long-lived buffers
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl From<String> for SecretPhrase {
    fn from(phrase: String) -> Self {
        Self::new(phrase)
    }
}

impl From<&str> for SecretPhrase {
    fn from(phrase: &str) -> Self {
        Self::new(phrase.to_string())
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretPhrase(<{} words redacted>)", self.word_count())
    }
}

/// Opaque secret bytes (derived keys, decrypted blobs, key material)
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reinterpret decrypted bytes as a phrase without leaving a copy behind
    pub fn into_phrase(mut self) -> Result<SecretPhrase, WalletError> {
        let bytes = std::mem::take(&mut *self.0);
        match String::from_utf8(bytes) {
            Ok(phrase) => Ok(SecretPhrase::new(phrase)),
            Err(err) => {
                let mut bytes = err.into_bytes();
                bytes.zeroize();
                Err(WalletError::AuthenticationFailure)
            }
        }
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(<{} bytes redacted>)", self.0.len())
    }
}
