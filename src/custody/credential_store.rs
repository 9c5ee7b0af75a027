//! Persistence of the encrypted wallet record
//!
//! The record holds the address and two ciphertexts (recovery phrase and
//! derived private key) and is written with one `put`, so a wallet is either
//! fully stored or absent. Plaintext leaves this module only through the
//! reveal operations, which require an unlocked `BiometricGate`.

use super::codec::SecretCodec;
use super::gate::BiometricGate;
use super::keys::WalletCrypto;
use super::secret::{SecretBytes, SecretPhrase};
use crate::error::{StorageError, WalletError};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const WALLET_RECORD_KEY: &str = "wallet";

/// Public identity of the stored wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Serialize, Deserialize)]
struct WalletRecord {
    address: String,
    #[serde(with = "hex::serde")]
    encrypted_secret: Vec<u8>,
    #[serde(with = "hex::serde")]
    encrypted_key: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("encrypted_secret", &format_args!("<{} bytes>", self.encrypted_secret.len()))
            .field("encrypted_key", &format_args!("<{} bytes>", self.encrypted_key.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl From<&WalletRecord> for Wallet {
    fn from(record: &WalletRecord) -> Self {
        Self {
            address: record.address.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Clone, Copy)]
enum SecretKind {
    Phrase,
    PrivateKey,
}

pub struct SecureCredentialStore {
    storage: Arc<dyn KeyValueStore>,
    codec: Arc<dyn SecretCodec>,
    crypto: Arc<dyn WalletCrypto>,
    gate: Arc<BiometricGate>,
    key_material: Arc<SecretBytes>,
    /// Held from the existence check until the record is written
    create_lock: Mutex<()>,
}

impl SecureCredentialStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        codec: Arc<dyn SecretCodec>,
        crypto: Arc<dyn WalletCrypto>,
        gate: Arc<BiometricGate>,
        key_material: SecretBytes,
    ) -> Self {
        Self {
            storage,
            codec,
            crypto,
            gate,
            key_material: Arc::new(key_material),
            create_lock: Mutex::new(()),
        }
    }

    pub fn gate(&self) -> &Arc<BiometricGate> {
        &self.gate
    }

    // ============================================================================
    // Create / Import
    // ============================================================================

    /// Validate, encrypt and persist a wallet from its recovery phrase
    pub async fn create_wallet(&self, phrase: SecretPhrase) -> Result<Wallet, WalletError> {
        let _guard = self.create_lock.lock().await;
        if let Some(existing) = self.load_record().await? {
            return Err(WalletError::WalletExists(existing.address));
        }

        self.crypto.validate_phrase(phrase.expose())?;
        let keys = self.crypto.derive(phrase.expose())?;
        let address = keys.address.clone();

        let codec = self.codec.clone();
        let material = self.key_material.clone();
        let (encrypted_secret, encrypted_key) = tokio::task::spawn_blocking(move || {
            let secret = codec.encrypt(phrase.expose().as_bytes(), material.expose())?;
            let key = codec.encrypt(keys.private_key.expose(), material.expose())?;
            Ok::<_, WalletError>((secret, key))
        })
        .await
        .map_err(|e| WalletError::Internal(format!("encryption task failed: {}", e)))??;

        let record = WalletRecord {
            address,
            encrypted_secret,
            encrypted_key,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record).map_err(StorageError::from)?;
        self.storage.put(WALLET_RECORD_KEY, &bytes).await?;

        log::info!("Wallet {} stored", record.address);
        Ok(Wallet::from(&record))
    }

    /// Restore a wallet from a user-supplied phrase
    pub async fn import_wallet(&self, phrase: &str) -> Result<Wallet, WalletError> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        self.create_wallet(SecretPhrase::new(normalized)).await
    }

    // ============================================================================
    // Read
    // ============================================================================

    pub async fn load_wallet(&self) -> Result<Option<Wallet>, WalletError> {
        Ok(self.load_record().await?.as_ref().map(Wallet::from))
    }

    pub async fn get_address(&self) -> Result<Option<String>, WalletError> {
        Ok(self.load_record().await?.map(|record| record.address))
    }

    /// Decrypt the recovery phrase; the gate must be unlocked
    ///
    /// The returned phrase is for one-shot display. Drop it as soon as it has
    /// been shown.
    pub async fn reveal_secret(&self) -> Result<SecretPhrase, WalletError> {
        self.reveal(SecretKind::Phrase).await?.into_phrase()
    }

    /// Decrypt the derived private key; the gate must be unlocked
    pub async fn reveal_private_key(&self) -> Result<SecretBytes, WalletError> {
        self.reveal(SecretKind::PrivateKey).await
    }

    async fn reveal(&self, kind: SecretKind) -> Result<SecretBytes, WalletError> {
        self.gate.ensure_unlocked()?;

        let record = self
            .load_record()
            .await?
            .ok_or(WalletError::WalletNotFound)?;
        let ciphertext = match kind {
            SecretKind::Phrase => record.encrypted_secret,
            SecretKind::PrivateKey => record.encrypted_key,
        };

        let codec = self.codec.clone();
        let material = self.key_material.clone();
        let plaintext = tokio::task::spawn_blocking(move || {
            codec.decrypt(&ciphertext, material.expose())
        })
        .await
        .map_err(|e| WalletError::Internal(format!("decryption task failed: {}", e)))??;

        log::info!("Secret material released for {}", record.address);
        Ok(plaintext)
    }

    // ============================================================================
    // Delete
    // ============================================================================

    /// Erase the stored record; succeeds when nothing is stored
    pub async fn delete_wallet(&self) -> Result<(), WalletError> {
        self.storage.delete(WALLET_RECORD_KEY).await?;
        log::info!("Wallet record erased");
        Ok(())
    }

    async fn load_record(&self) -> Result<Option<WalletRecord>, WalletError> {
        let Some(bytes) = self.storage.get(WALLET_RECORD_KEY).await? else {
            return Ok(None);
        };
        let record: WalletRecord = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corrupted(format!("wallet record: {}", e)))?;
        Ok(Some(record))
    }
}
