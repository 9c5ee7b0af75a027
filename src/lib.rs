//! Chainvault: Wallet Credential Custody & Multi-Chain State Synchronization
//!
//! This crate keeps a wallet's secret material encrypted at rest, releases
//! it only behind a biometric gate, and maintains one deduplicated ledger of
//! the wallet's activity across every EVM chain it has used.
//!
//! # Architecture
//!
//! - **Custody**: `SecretCodec` encryption, `BiometricGate`, `SecureCredentialStore`
//! - **Discovery**: `ChainDiscoveryService` probes chain providers in parallel
//! - **Sync**: `TransactionSyncManager` canonicalizes and merges activity, single-flight
//! - **State**: `StateStore` owns the ledger and publishes read snapshots and events
//! - **Errors**: `classify` maps every failure to a severity for presentation
//!
//! # Example
//!
//! ```ignore
//! use chainvault::{ManagerDeps, NoBiometric, SecretBytes, WalletConfig, WalletManager};
//! use std::sync::Arc;
//!
//! let config = WalletConfig::from_env()?;
//! let deps = ManagerDeps::from_config(&config, Arc::new(NoBiometric), SecretBytes::from_slice(b"device key"));
//! let manager = WalletManager::new(config, deps);
//!
//! manager.import_wallet("test test test test test test test test test test test junk").await?;
//! manager.refresh().await?;
//! let sends = manager.transactions("send".parse()?);
//! ```

// Public modules
pub mod chain;
pub mod classifier;
pub mod config;
pub mod custody;
pub mod error;
pub mod manager;
pub mod profile;
pub mod state;
pub mod storage;
pub mod sync;

// Re-exports for convenience
pub use chain::{
    Chain, ChainConfig, ChainDiscoveryService, ChainProvider, EtherscanProvider, RawActivity,
    RawBalance, RawToken, RawTransaction, TokenStandard,
};
pub use classifier::{classify, ClassifiedError, ErrorReporter, Severity};
pub use config::{Environment, WalletConfig};
pub use custody::{
    AesGcmCodec, AuthResult, BiometricCapability, BiometricGate, GateState, KdfParams,
    KeyManager, NoBiometric, SecretBytes, SecretCodec, SecretPhrase, SecureCredentialStore,
    UnavailablePolicy, Wallet, WalletCrypto,
};
pub use error::{ProviderError, StorageError, WalletError};
pub use manager::{ManagerDeps, WalletManager};
pub use profile::{Profile, ProfileManager, SettlementMethod};
pub use state::{
    ActiveChain, Balance, CacheEntry, ChainStatus, StateSnapshot, StateStore, StoreEvent,
    SyncSummary, Transaction, TransactionFilter, TransactionStatus, TransactionType,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use sync::TransactionSyncManager;
