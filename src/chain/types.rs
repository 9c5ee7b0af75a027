//! Supported networks and per-chain provider configuration

use crate::error::WalletError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Closed set of networks a wallet address can be discovered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[serde(rename = "eth")]
    Ethereum,
    Polygon,
    Bsc,
    Arbitrum,
    Optimism,
    Base,
    Avalanche,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Bsc,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Base,
        Chain::Avalanche,
    ];

    /// EIP-155 chain id
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Polygon => 137,
            Chain::Bsc => 56,
            Chain::Arbitrum => 42161,
            Chain::Optimism => 10,
            Chain::Base => 8453,
            Chain::Avalanche => 43114,
        }
    }

    /// Short key used in configuration and transaction ids
    pub fn key(&self) -> &'static str {
        match self {
            Chain::Ethereum => "eth",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Avalanche => "avalanche",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Polygon => "Polygon",
            Chain::Bsc => "BNB Smart Chain",
            Chain::Arbitrum => "Arbitrum One",
            Chain::Optimism => "Optimism",
            Chain::Base => "Base",
            Chain::Avalanche => "Avalanche C-Chain",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Polygon => "POL",
            Chain::Bsc => "BNB",
            Chain::Avalanche => "AVAX",
            Chain::Ethereum | Chain::Arbitrum | Chain::Optimism | Chain::Base => "ETH",
        }
    }

    pub fn native_decimals(&self) -> u8 {
        18
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.key() == lower || c.name().to_lowercase() == lower)
            .ok_or_else(|| WalletError::InvalidConfig(format!("unknown chain '{}'", s)))
    }
}

/// Validated provider configuration for one chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain: Chain,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Overrides the global per-chain fetch timeout
    pub timeout: Option<Duration>,
}

impl ChainConfig {
    pub fn new(chain: Chain, api_url: impl Into<String>) -> Result<Self, WalletError> {
        let api_url = api_url.into();
        let trimmed = api_url.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidConfig(format!(
                "chain '{}' has an empty api_url",
                chain.key()
            )));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(WalletError::InvalidConfig(format!(
                "chain '{}' api_url must be http(s): {}",
                chain.key(),
                trimmed
            )));
        }
        Ok(Self {
            chain,
            api_url: trimmed.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: None,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse a `[[chains]]` TOML document
    pub fn list_from_toml(source: &str) -> Result<Vec<ChainConfig>, WalletError> {
        let file: ChainsFile = toml::from_str(source)
            .map_err(|e| WalletError::InvalidConfig(format!("chains config: {}", e)))?;

        let mut configs: Vec<ChainConfig> = Vec::with_capacity(file.chains.len());
        for raw in file.chains {
            let config = ChainConfig::try_from(raw)?;
            if configs.iter().any(|c| c.chain == config.chain) {
                return Err(WalletError::InvalidConfig(format!(
                    "chain '{}' configured twice",
                    config.chain.key()
                )));
            }
            configs.push(config);
        }
        Ok(configs)
    }
}

#[derive(Debug, Deserialize)]
struct ChainsFile {
    #[serde(default)]
    chains: Vec<RawChainConfig>,
}

#[derive(Debug, Deserialize)]
struct RawChainConfig {
    chain: Option<String>,
    api_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl TryFrom<RawChainConfig> for ChainConfig {
    type Error = WalletError;

    fn try_from(raw: RawChainConfig) -> Result<Self, Self::Error> {
        let chain_name = raw
            .chain
            .ok_or_else(|| WalletError::InvalidConfig("chain entry without 'chain'".to_string()))?;
        let chain = Chain::from_str(&chain_name)?;
        let api_url = raw.api_url.ok_or_else(|| {
            WalletError::InvalidConfig(format!("chain '{}' is missing 'api_url'", chain.key()))
        })?;

        let mut config = ChainConfig::new(chain, api_url)?;
        if let Some(key) = raw.api_key.filter(|k| !k.trim().is_empty()) {
            config = config.with_api_key(key);
        }
        if let Some(secs) = raw.timeout_secs {
            if secs == 0 {
                return Err(WalletError::InvalidConfig(format!(
                    "chain '{}' timeout_secs must be positive",
                    chain.key()
                )));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}
