//! Credential custody
//!
//! - Secret wrappers and at-rest encryption
//! - Key derivation boundary
//! - Biometric gate
//! - Encrypted wallet record

pub mod codec;
pub mod credential_store;
pub mod gate;
pub mod keys;
pub mod secret;

pub use codec::{AesGcmCodec, KdfParams, SecretCodec};
pub use credential_store::{SecureCredentialStore, Wallet, WALLET_RECORD_KEY};
pub use gate::{
    AuthResult, BiometricCapability, BiometricGate, GateState, NoBiometric, UnavailablePolicy,
};
pub use keys::{DerivedKeys, KeyManager, WalletCrypto, EVM_DERIVATION_PATH};
pub use secret::{SecretBytes, SecretPhrase};
