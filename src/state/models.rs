//! Canonical ledger records held by the state store

use crate::chain::Chain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A network on which the active wallet has observed activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChain {
    pub chain: Chain,
    pub chain_id: u64,
    pub chain_name: String,
    pub first_transaction_timestamp: Option<DateTime<Utc>>,
    pub last_transaction_timestamp: Option<DateTime<Utc>>,
}

impl ActiveChain {
    pub fn new(
        chain: Chain,
        first: Option<DateTime<Utc>>,
        last: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            chain,
            chain_id: chain.chain_id(),
            chain_name: chain.name().to_string(),
            first_transaction_timestamp: first,
            last_transaction_timestamp: last,
        }
    }

    /// Widen the observed range with another observation of the same chain
    pub fn absorb(&mut self, other: &ActiveChain) {
        self.first_transaction_timestamp =
            min_opt(self.first_transaction_timestamp, other.first_transaction_timestamp);
        self.last_transaction_timestamp =
            max_opt(self.last_transaction_timestamp, other.last_transaction_timestamp);
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Send,
    Receive,
    Swap,
    Stake,
    Defi,
    Nft,
    Approve,
    ContractDeployment,
    Failed,
    Gas,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Send => "send",
            TransactionType::Receive => "receive",
            TransactionType::Swap => "swap",
            TransactionType::Stake => "stake",
            TransactionType::Defi => "defi",
            TransactionType::Nft => "nft",
            TransactionType::Approve => "approve",
            TransactionType::ContractDeployment => "contract_deployment",
            TransactionType::Failed => "failed",
            TransactionType::Gas => "gas",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reverted,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Reverted)
    }
}

/// Filter for ledger views; `All` is the identity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    All,
    Type(TransactionType),
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            TransactionFilter::All => true,
            TransactionFilter::Type(t) => tx.tx_type == *t,
        }
    }
}

impl From<TransactionType> for TransactionFilter {
    fn from(t: TransactionType) -> Self {
        TransactionFilter::Type(t)
    }
}

impl FromStr for TransactionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower == "all" {
            return Ok(TransactionFilter::All);
        }
        const TYPES: [TransactionType; 10] = [
            TransactionType::Send,
            TransactionType::Receive,
            TransactionType::Swap,
            TransactionType::Stake,
            TransactionType::Defi,
            TransactionType::Nft,
            TransactionType::Approve,
            TransactionType::ContractDeployment,
            TransactionType::Failed,
            TransactionType::Gas,
        ];
        TYPES
            .iter()
            .find(|t| t.as_str() == lower)
            .map(|t| TransactionFilter::Type(*t))
            .ok_or_else(|| format!("unknown transaction type '{}'", s))
    }
}

/// Display hints carried alongside a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub symbol: String,
    pub decimals: u8,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Canonical ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// `chain:hash:log_index`, unique across chains and passes
    pub id: String,
    pub chain: Chain,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Human-unit decimal amount
    pub amount: String,
    /// Fiat equivalent, when the provider knows it
    pub value: Option<f64>,
    pub token_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub sender: String,
    pub recipient: Option<String>,
    pub is_internal: bool,
    /// Fee in native human units
    pub gas_fee: Option<String>,
    pub error_reason: Option<String>,
    pub metadata: TransactionMetadata,
}

impl Transaction {
    /// Stable identity of an on-chain event
    pub fn make_id(chain: Chain, hash: &str, log_index: Option<u32>) -> String {
        match log_index {
            Some(index) => format!("{}:{}:{}", chain.key(), hash.to_lowercase(), index),
            None => format!("{}:{}:-", chain.key(), hash.to_lowercase()),
        }
    }

    /// Apply a later observation of the same event; only mutable fields change
    ///
    /// Returns true when the record changed.
    pub fn apply_update(&mut self, newer: &Transaction) -> bool {
        debug_assert_eq!(self.id, newer.id);
        if newer.status == TransactionStatus::Pending && self.status.is_terminal() {
            return false;
        }
        let error_reason = if newer.status.is_failure() {
            newer.error_reason.clone().or_else(|| self.error_reason.clone())
        } else {
            None
        };
        if self.status == newer.status && self.error_reason == error_reason {
            return false;
        }
        self.status = newer.status;
        self.error_reason = error_reason;
        true
    }
}

/// Holding of one asset on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub chain: Chain,
    pub symbol: String,
    pub contract: Option<String>,
    /// Human-unit decimal amount
    pub amount: String,
    pub decimals: u8,
    pub value: Option<f64>,
}

/// Any fetched aggregate plus when it was fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self::fetched_at(value, Utc::now(), ttl)
    }

    pub fn fetched_at(value: T, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
        }
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        let ttl = match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => ttl,
            // out of range ttl never expires
            Err(_) => return false,
        };
        now - self.fetched_at > ttl
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}

/// Freshness of one chain's contribution to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    Fresh,
    /// Last fetch failed; previously merged data is kept
    Stale,
    /// Never fetched successfully this session
    Unavailable,
}

/// Outcome of one sync pass, cached per address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub address: String,
    pub chains_synced: Vec<Chain>,
    pub chains_failed: Vec<Chain>,
    pub transactions_added: usize,
    pub transactions_updated: usize,
}
