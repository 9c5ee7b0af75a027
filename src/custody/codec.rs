//! Encryption of secret material at rest
//!
//! Envelope layout:
//!
//! ```text
//! version (1) | m_cost (4, BE) | t_cost (4, BE) | p_cost (4, BE) | salt (16) | nonce (12) | AES-256-GCM ciphertext + tag
//! ```
//!
//! The key is Argon2id(key material, salt). The header up to the salt is
//! authenticated as associated data, so tampering with the KDF parameters
//! fails the tag check like any other corruption.

use super::secret::SecretBytes;
use crate::error::WalletError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

const ENVELOPE_VERSION: u8 = 1;
const KEY_SIZE: usize = 32;
pub const SALT_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 12;
const PARAMS_SIZE: usize = 12;
const HEADER_SIZE: usize = 1 + PARAMS_SIZE + SALT_SIZE;
const TAG_SIZE: usize = 16;
/// Upper bound accepted from an envelope header (1 GiB)
const MAX_MEMORY_KIB: u32 = 1024 * 1024;

pub trait SecretCodec: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key_material: &[u8]) -> Result<Vec<u8>, WalletError>;

    /// Fails with `AuthenticationFailure` unless the tag verifies
    fn decrypt(&self, ciphertext: &[u8], key_material: &[u8]) -> Result<SecretBytes, WalletError>;
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn argon2(&self) -> Result<Argon2<'static>, WalletError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| WalletError::InvalidConfig(format!("argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn derive_key(
        &self,
        key_material: &[u8],
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>, WalletError> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        self.argon2()?
            .hash_password_into(key_material, salt, &mut *key)
            .map_err(|e| WalletError::Internal(format!("key derivation failed: {}", e)))?;
        Ok(key)
    }
}

/// AES-256-GCM with an Argon2id-derived key
#[derive(Debug, Clone, Default)]
pub struct AesGcmCodec {
    params: KdfParams,
}

impl AesGcmCodec {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    fn header(&self, salt: &[u8; SALT_SIZE]) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.push(ENVELOPE_VERSION);
        header.extend_from_slice(&self.params.memory_kib.to_be_bytes());
        header.extend_from_slice(&self.params.iterations.to_be_bytes());
        header.extend_from_slice(&self.params.parallelism.to_be_bytes());
        header.extend_from_slice(salt);
        header
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

impl SecretCodec for AesGcmCodec {
    fn encrypt(&self, plaintext: &[u8], key_material: &[u8]) -> Result<Vec<u8>, WalletError> {
        if key_material.is_empty() {
            return Err(WalletError::InvalidConfig(
                "device key material is empty".to_string(),
            ));
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let key = self.params.derive_key(key_material, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| WalletError::Internal(format!("cipher init failed: {}", e)))?;

        let header = self.header(&salt);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| WalletError::Internal("encryption failed".to_string()))?;

        let mut envelope = header;
        envelope.reserve(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    fn decrypt(&self, envelope: &[u8], key_material: &[u8]) -> Result<SecretBytes, WalletError> {
        if envelope.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE
            || envelope[0] != ENVELOPE_VERSION
        {
            return Err(WalletError::AuthenticationFailure);
        }

        let params = KdfParams {
            memory_kib: read_u32(&envelope[1..5]),
            iterations: read_u32(&envelope[5..9]),
            parallelism: read_u32(&envelope[9..13]),
        };
        if params.memory_kib > MAX_MEMORY_KIB {
            return Err(WalletError::AuthenticationFailure);
        }

        let (header, rest) = envelope.split_at(HEADER_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        let salt = &header[1 + PARAMS_SIZE..];

        let key = params
            .derive_key(key_material, salt)
            .map_err(|_| WalletError::AuthenticationFailure)?;
        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| WalletError::Internal(format!("cipher init failed: {}", e)))?;

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| WalletError::AuthenticationFailure)?;
        Ok(SecretBytes::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_codec() -> AesGcmCodec {
        AesGcmCodec::new(KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
    }

    const PHRASE: &[u8] = b"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_round_trip() {
        let codec = fast_codec();
        let blob = codec.encrypt(PHRASE, b"device-key").unwrap();
        assert_ne!(&blob[HEADER_SIZE + NONCE_SIZE..], PHRASE);
        let plain = codec.decrypt(&blob, b"device-key").unwrap();
        assert_eq!(plain.expose(), PHRASE);
    }

    #[test]
    fn test_wrong_key_fails() {
        let codec = fast_codec();
        let blob = codec.encrypt(PHRASE, b"device-key").unwrap();
        assert!(matches!(
            codec.decrypt(&blob, b"other-key"),
            Err(WalletError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampering_fails() {
        let codec = fast_codec();
        let blob = codec.encrypt(PHRASE, b"device-key").unwrap();

        let mut flipped = blob.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0x01;
        assert!(matches!(codec.decrypt(&flipped, b"device-key"), Err(WalletError::AuthenticationFailure)));

        // header is authenticated too
        let mut params = blob.clone();
        params[8] ^= 0x01;
        assert!(codec.decrypt(&params, b"device-key").is_err());

        assert!(matches!(codec.decrypt(&blob[..20], b"device-key"), Err(WalletError::AuthenticationFailure)));
    }

    #[test]
    fn test_empty_key_material_is_a_config_fault() {
        assert!(matches!(
            fast_codec().encrypt(PHRASE, b""),
            Err(WalletError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let codec = fast_codec();
        let a = codec.encrypt(PHRASE, b"k").unwrap();
        let b = codec.encrypt(PHRASE, b"k").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_uses_envelope_params() {
        let blob = fast_codec().encrypt(PHRASE, b"k").unwrap();
        let other = AesGcmCodec::new(KdfParams {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        });
        assert_eq!(other.decrypt(&blob, b"k").unwrap().expose(), PHRASE);
    }
}
