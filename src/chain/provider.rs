//! Chain provider contract
//!
//! Providers expose a single fetch-by-address capability per chain and return
//! data in a loosely provider-shaped form. Canonicalization into ledger
//! records happens in `sync::canonical`.

use super::types::Chain;
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn chain(&self) -> Chain;

    /// Provider-specific timeout; `None` uses the configured default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn fetch_activity(&self, address: &str) -> Result<RawActivity, ProviderError>;
}

/// Everything a provider knows about one address on its chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawActivity {
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub balances: Vec<RawBalance>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl RawActivity {
    /// True when the address has any observable footprint on the chain
    pub fn has_activity(&self) -> bool {
        !self.transactions.is_empty()
            || self.first_seen.is_some()
            || self.balances.iter().any(|b| !b.is_zero())
    }

    /// Earliest and latest activity, widened by the transaction timestamps
    pub fn seen_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let tx_times = self.transactions.iter().filter_map(|tx| tx.time());
        let mut first = self.first_seen;
        let mut last = self.last_seen;
        for ts in tx_times {
            first = Some(first.map_or(ts, |f| f.min(ts)));
            last = Some(last.map_or(ts, |l| l.max(ts)));
        }
        match (first, last) {
            (Some(f), Some(l)) => Some((f.min(l), f.max(l))),
            (Some(f), None) => Some((f, f)),
            (None, Some(l)) => Some((l, l)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToken {
    pub contract: String,
    pub symbol: String,
    pub decimals: u8,
    pub standard: TokenStandard,
    /// NFT token id, when the transfer moved one
    pub token_id: Option<String>,
}

/// A transfer or call as the provider reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Present for token transfers emitted as logs
    pub log_index: Option<u32>,
    pub from: String,
    /// Empty or absent for contract creation
    pub to: Option<String>,
    /// Amount in base units as a decimal string
    #[serde(default)]
    pub value: String,
    pub token: Option<RawToken>,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub is_error: bool,
    /// 1 success, 0 reverted, absent when unknown
    pub receipt_status: Option<u8>,
    pub error_reason: Option<String>,
    /// Decoded function name or signature (`approve(address,uint256)`)
    pub method: Option<String>,
    pub contract_address: Option<String>,
    pub gas_used: Option<u128>,
    pub gas_price: Option<u128>,
    pub fiat_value: Option<f64>,
}

impl RawTransaction {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBalance {
    pub symbol: String,
    pub decimals: u8,
    /// Amount in base units as a decimal string
    pub amount: String,
    pub contract: Option<String>,
    pub fiat_value: Option<f64>,
}

impl RawBalance {
    pub fn is_zero(&self) -> bool {
        self.amount.trim().trim_start_matches('0').is_empty()
    }
}
