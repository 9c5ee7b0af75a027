use super::secret::{SecretBytes, SecretPhrase};
use crate::error::WalletError;
use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use std::str::FromStr;
use zeroize::Zeroizing;

/// BIP-44 path of the first EVM account
pub const EVM_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Result of deriving a wallet from its phrase
#[derive(Debug)]
pub struct DerivedKeys {
    /// EIP-55 checksummed address
    pub address: String,
    pub private_key: SecretBytes,
}

/// Boundary to the key-derivation library
pub trait WalletCrypto: Send + Sync {
    /// Check word count and checksum
    fn validate_phrase(&self, phrase: &str) -> Result<(), WalletError>;

    fn derive(&self, phrase: &str) -> Result<DerivedKeys, WalletError>;
}

pub struct KeyManager;

impl KeyManager {
    /// Generate a new random recovery phrase (12 or 24 words)
    pub fn generate(word_count: usize) -> Result<SecretPhrase, WalletError> {
        let entropy_len = match word_count {
            12 => 16,
            24 => 32,
            other => {
                return Err(WalletError::InvalidSecretMaterial(format!(
                    "unsupported word count {}",
                    other
                )))
            }
        };
        let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
        rand::rngs::OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| WalletError::InvalidSecretMaterial(e.to_string()))?;
        Ok(SecretPhrase::new(mnemonic.to_string()))
    }

    fn parse(phrase: &str) -> Result<Mnemonic, WalletError> {
        Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| WalletError::InvalidSecretMaterial(e.to_string()))
    }

    /// EIP-55 mixed-case checksum encoding of a 20-byte address
    pub fn checksum_address(address: &[u8; 20]) -> String {
        let lower = hex::encode(address);
        let hash = Keccak256::digest(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl WalletCrypto for KeyManager {
    fn validate_phrase(&self, phrase: &str) -> Result<(), WalletError> {
        Self::parse(phrase).map(|_| ())
    }

    fn derive(&self, phrase: &str) -> Result<DerivedKeys, WalletError> {
        let mnemonic = Self::parse(phrase)?;
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let secp = Secp256k1::new();

        let master_key = Xpriv::new_master(Network::Bitcoin, &*seed)
            .map_err(|e| WalletError::Internal(format!("master key: {}", e)))?;
        let path = DerivationPath::from_str(EVM_DERIVATION_PATH)
            .map_err(|e| WalletError::Internal(format!("derivation path: {}", e)))?;
        let account_key = master_key
            .derive_priv(&secp, &path)
            .map_err(|e| WalletError::Internal(format!("key derivation: {}", e)))?;

        let public_key = account_key.private_key.public_key(&secp);
        let uncompressed = public_key.serialize_uncompressed();
        let hash = Keccak256::digest(&uncompressed[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        Ok(DerivedKeys {
            address: Self::checksum_address(&address),
            private_key: SecretBytes::new(account_key.private_key.secret_bytes().to_vec()),
        })
    }
}
