//! Error types for custody and synchronization
//!
//! `WalletError` is the taxonomy every public operation returns. Per-chain
//! provider failures are carried as `ProviderError` and only become a
//! `WalletError` once the chain they belong to is known.

use crate::chain::Chain;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid secret material: {0}")]
    InvalidSecretMaterial(String),

    /// Integrity tag did not verify (wrong key material or corrupted blob)
    #[error("Authentication failure: ciphertext could not be verified")]
    AuthenticationFailure,

    #[error("Authentication denied: {0}")]
    AuthenticationDenied(String),

    #[error("Biometric capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Provider for {chain} timed out after {timeout:?}")]
    ProviderTimeout { chain: Chain, timeout: Duration },

    #[error("Provider for {chain} failed: {source}")]
    ProviderError {
        chain: Chain,
        #[source]
        source: ProviderError,
    },

    #[error("Sync failed on every chain: {}", format_chains(.chains))]
    SyncFailed { chains: Vec<Chain> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Wallet already exists: {0}")]
    WalletExists(String),

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Attach a chain to a provider failure
    pub fn from_provider(chain: Chain, err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(timeout) => WalletError::ProviderTimeout { chain, timeout },
            other => WalletError::ProviderError {
                chain,
                source: other,
            },
        }
    }
}

fn format_chains(chains: &[Chain]) -> String {
    chains
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Transport-level failure reported by a chain provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}
