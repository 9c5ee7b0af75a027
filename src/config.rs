//! Engine configuration from environment variables
//!
//! Controls where wallet records live, how long an unlock stays fresh, how
//! chain providers are reached and how expensive the at-rest KDF is.
//! Defaults are production-safe: no biometric bypass, no providers.

use crate::chain::{ChainConfig, ChainProvider, EtherscanProvider};
use crate::custody::{KdfParams, UnavailablePolicy};
use crate::error::WalletError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Root directory of the file-backed record store
    pub data_dir: PathBuf,
    pub environment: Environment,
    pub biometric_policy: UnavailablePolicy,
    /// How long an unlock permits secret release
    pub freshness_window: Duration,
    /// Per-chain fetch timeout
    pub provider_timeout: Duration,
    pub discovery_concurrency: usize,
    pub sync_cache_ttl: Duration,
    pub chains: Vec<ChainConfig>,
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./wallets"),
            environment: Environment::Production,
            biometric_policy: UnavailablePolicy::Deny,
            freshness_window: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(15),
            discovery_concurrency: 4,
            sync_cache_ttl: Duration::from_secs(300),
            chains: Vec::new(),
            kdf: KdfParams::default(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WALLET_DATA_DIR`: record store root (default "./wallets")
    /// - `WALLET_ENV`: "production" (default) or "development"
    /// - `BIOMETRIC_DEV_BYPASS`: "true" grants access without biometrics, development only
    /// - `FRESHNESS_WINDOW_SECS`, `PROVIDER_TIMEOUT_SECS`, `SYNC_CACHE_TTL_SECS`
    /// - `DISCOVERY_CONCURRENCY`
    /// - `CHAINS_CONFIG`: path to a `[[chains]]` TOML file
    /// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Watch-only refresh against the configured explorers
    /// CHAINS_CONFIG=chains.toml cargo run -- 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
    /// ```
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup("WALLET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        log::info!("📁 Wallet data directory: {}", data_dir.display());

        let environment = match lookup("WALLET_ENV")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "development" | "dev" => {
                log::info!("🔧 Running in DEVELOPMENT mode");
                Environment::Development
            }
            "production" | "prod" | "" => Environment::Production,
            other => {
                log::warn!("⚠️  Unknown WALLET_ENV '{}', defaulting to production", other);
                Environment::Production
            }
        };

        let bypass_requested = lookup("BIOMETRIC_DEV_BYPASS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let biometric_policy = match (bypass_requested, environment) {
            (true, Environment::Development) => {
                log::warn!("⚠️  Biometric development bypass ENABLED");
                UnavailablePolicy::DevelopmentBypass
            }
            (true, Environment::Production) => {
                log::warn!("⚠️  BIOMETRIC_DEV_BYPASS ignored outside development");
                UnavailablePolicy::Deny
            }
            (false, _) => UnavailablePolicy::Deny,
        };

        let freshness_window = Duration::from_secs(parse_or(
            &lookup,
            "FRESHNESS_WINDOW_SECS",
            defaults.freshness_window.as_secs(),
        ));
        let provider_timeout = Duration::from_secs(parse_or(
            &lookup,
            "PROVIDER_TIMEOUT_SECS",
            defaults.provider_timeout.as_secs(),
        ));
        let discovery_concurrency =
            parse_or(&lookup, "DISCOVERY_CONCURRENCY", defaults.discovery_concurrency).max(1);
        let sync_cache_ttl = Duration::from_secs(parse_or(
            &lookup,
            "SYNC_CACHE_TTL_SECS",
            defaults.sync_cache_ttl.as_secs(),
        ));
        log::info!(
            "⏱️  Freshness window {:?}, provider timeout {:?}, cache ttl {:?}",
            freshness_window,
            provider_timeout,
            sync_cache_ttl
        );

        let kdf = KdfParams {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", defaults.kdf.memory_kib),
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", defaults.kdf.iterations).max(1),
            ..defaults.kdf
        };

        let chains = match lookup("CHAINS_CONFIG") {
            Some(path) => {
                let source = std::fs::read_to_string(&path).map_err(|e| {
                    WalletError::InvalidConfig(format!("cannot read chains config {}: {}", path, e))
                })?;
                let chains = ChainConfig::list_from_toml(&source)?;
                log::info!("🔗 Loaded {} chain provider(s) from {}", chains.len(), path);
                chains
            }
            None => {
                log::warn!("⚠️  CHAINS_CONFIG not set, no chain providers configured");
                Vec::new()
            }
        };

        Ok(Self {
            data_dir,
            environment,
            biometric_policy,
            freshness_window,
            provider_timeout,
            discovery_concurrency,
            sync_cache_ttl,
            chains,
            kdf,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Build one HTTP provider per configured chain
    pub fn providers(&self) -> Vec<Arc<dyn ChainProvider>> {
        self.chains
            .iter()
            .cloned()
            .map(|config| Arc::new(EtherscanProvider::new(config)) as Arc<dyn ChainProvider>)
            .collect()
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("⚠️  Invalid {} '{}', using {}", name, raw, default);
                default
            }
        },
        None => default,
    }
}
