//! Common test utilities for custody and sync integration tests
//!
//! This module provides shared test infrastructure including:
//! - Scripted chain providers with call counters, delays and failures
//! - A scripted biometric capability
//! - Test environment setup with a temp-dir backed store
//! - Collection of classified errors
#![allow(dead_code)]

use async_trait::async_trait;
use chainvault::{
    AuthResult, BiometricCapability, Chain, ChainProvider, ClassifiedError, KdfParams,
    ManagerDeps, ProviderError, RawActivity, RawBalance, RawTransaction, SecretBytes,
    SecretCodec, UnavailablePolicy, WalletConfig, WalletError, WalletManager, FileStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Address derived from `TEST_PHRASE` at m/44'/60'/0'/0/0
pub const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
pub const COUNTERPARTY: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

// ============================================================================
// Raw provider data
// ============================================================================

pub fn raw_tx(hash: &str, timestamp: i64, from: &str, to: &str, wei: &str) -> RawTransaction {
    RawTransaction {
        hash: hash.to_string(),
        log_index: None,
        from: from.to_string(),
        to: Some(to.to_string()),
        value: wei.to_string(),
        token: None,
        timestamp,
        pending: false,
        is_error: false,
        receipt_status: Some(1),
        error_reason: None,
        method: None,
        contract_address: None,
        gas_used: Some(21_000),
        gas_price: Some(1_000_000_000),
        fiat_value: None,
    }
}

pub fn sent(hash: &str, timestamp: i64) -> RawTransaction {
    raw_tx(hash, timestamp, &OWNER.to_lowercase(), COUNTERPARTY, "1000000000000000000")
}

pub fn received(hash: &str, timestamp: i64) -> RawTransaction {
    raw_tx(hash, timestamp, COUNTERPARTY, &OWNER.to_lowercase(), "500000000000000000")
}

pub fn activity(transactions: Vec<RawTransaction>) -> RawActivity {
    RawActivity {
        transactions,
        balances: vec![RawBalance {
            symbol: "ETH".to_string(),
            decimals: 18,
            amount: "2000000000000000000".to_string(),
            contract: None,
            fiat_value: None,
        }],
        first_seen: None,
        last_seen: None,
    }
}

// ============================================================================
// Mock chain provider
// ============================================================================

pub enum Script {
    Respond(RawActivity),
    Fail(ProviderError),
    /// Never answers; only the discovery timeout ends the call
    Hang,
}

pub struct MockProvider {
    chain: Chain,
    script: Mutex<Script>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(chain: Chain, script: Script) -> Arc<Self> {
        Arc::new(Self {
            chain,
            script: Mutex::new(script),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn responding(chain: Chain, transactions: Vec<RawTransaction>) -> Arc<Self> {
        Self::new(chain, Script::Respond(activity(transactions)))
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn fetch_activity(&self, _address: &str) -> Result<RawActivity, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = match &*self.script.lock().unwrap() {
            Script::Respond(activity) => Some(Ok(activity.clone())),
            Script::Fail(err) => Some(Err(err.clone())),
            Script::Hang => None,
        };
        match response {
            Some(result) => result,
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Transport("hung".to_string()))
            }
        }
    }
}

// ============================================================================
// Scripted biometric capability
// ============================================================================

pub struct ScriptedBiometric {
    pub enrolled: bool,
    pub succeed: Mutex<bool>,
    pub prompts: AtomicUsize,
}

impl ScriptedBiometric {
    pub fn enrolled(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            enrolled: true,
            succeed: Mutex::new(succeed),
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn not_enrolled() -> Arc<Self> {
        Arc::new(Self {
            enrolled: false,
            succeed: Mutex::new(false),
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricCapability for ScriptedBiometric {
    async fn has_hardware(&self) -> bool {
        true
    }

    async fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    async fn authenticate(&self, _prompt: &str) -> AuthResult {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if *self.succeed.lock().unwrap() {
            AuthResult::success()
        } else {
            AuthResult::failure("user cancelled")
        }
    }
}

// ============================================================================
// Codec that counts decryption attempts
// ============================================================================

pub struct CountingCodec {
    inner: Arc<dyn SecretCodec>,
    pub decrypts: AtomicUsize,
}

impl CountingCodec {
    pub fn new(inner: Arc<dyn SecretCodec>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            decrypts: AtomicUsize::new(0),
        })
    }

    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

impl SecretCodec for CountingCodec {
    fn encrypt(&self, plaintext: &[u8], key_material: &[u8]) -> Result<Vec<u8>, WalletError> {
        self.inner.encrypt(plaintext, key_material)
    }

    fn decrypt(&self, ciphertext: &[u8], key_material: &[u8]) -> Result<SecretBytes, WalletError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext, key_material)
    }
}

// ============================================================================
// Test environment
// ============================================================================

pub struct EnvOptions {
    pub biometric: Arc<dyn BiometricCapability>,
    pub policy: UnavailablePolicy,
    pub key_material: &'static [u8],
    pub providers: Vec<Arc<dyn ChainProvider>>,
    pub codec: Option<Arc<dyn SecretCodec>>,
    pub provider_timeout: Duration,
    pub freshness_window: Duration,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            biometric: ScriptedBiometric::enrolled(true),
            policy: UnavailablePolicy::Deny,
            key_material: b"test-device-key",
            providers: Vec::new(),
            codec: None,
            provider_timeout: Duration::from_millis(300),
            freshness_window: Duration::from_secs(60),
        }
    }
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub manager: Arc<WalletManager>,
    pub errors: Arc<Mutex<Vec<ClassifiedError>>>,
}

impl TestEnvironment {
    pub fn new(options: EnvOptions) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());
        Ok(Self::in_dir(temp_dir, options))
    }

    /// Build a second manager over an existing directory
    pub fn in_dir(temp_dir: TempDir, options: EnvOptions) -> Self {
        init_logger();

        let config = WalletConfig {
            data_dir: temp_dir.path().to_path_buf(),
            biometric_policy: options.policy,
            freshness_window: options.freshness_window,
            provider_timeout: options.provider_timeout,
            sync_cache_ttl: Duration::from_secs(300),
            kdf: fast_kdf(),
            ..WalletConfig::default()
        };

        let deps = ManagerDeps {
            storage: Arc::new(FileStore::new_with_base_dir(temp_dir.path().to_path_buf())),
            biometric: options.biometric,
            key_material: SecretBytes::from_slice(options.key_material),
            providers: options.providers,
            codec: options.codec,
            crypto: None,
        };
        let manager = Arc::new(WalletManager::new(config, deps));

        let errors = Arc::new(Mutex::new(Vec::new()));
        {
            let errors = errors.clone();
            manager.reporter().register(move |classified| {
                errors.lock().unwrap().push(classified.clone());
            });
        }

        Self {
            temp_dir,
            manager,
            errors,
        }
    }

    pub fn errors(&self) -> Vec<ClassifiedError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn clear_errors(&self) {
        self.errors.lock().unwrap().clear();
    }
}

pub fn providers(mocks: &[Arc<MockProvider>]) -> Vec<Arc<dyn ChainProvider>> {
    mocks
        .iter()
        .cloned()
        .map(|mock| mock as Arc<dyn ChainProvider>)
        .collect()
}
