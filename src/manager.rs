//! Wallet Manager - Orchestration Layer
//!
//! Owns the state store and wires custody, synchronization and profile
//! services around it. Every error returned from here has already been
//! routed through the `ErrorReporter`.

use crate::chain::{Chain, ChainDiscoveryService, ChainProvider};
use crate::classifier::ErrorReporter;
use crate::config::WalletConfig;
use crate::custody::{
    AesGcmCodec, BiometricCapability, BiometricGate, GateState, KeyManager, SecretBytes,
    SecretCodec, SecretPhrase, SecureCredentialStore, Wallet, WalletCrypto,
};
use crate::error::WalletError;
use crate::profile::{Profile, ProfileManager};
use crate::state::{
    ActiveChain, Balance, Notification, NotificationLevel, StateSnapshot, StateStore, StoreEvent,
    SyncSummary, Transaction, TransactionFilter,
};
use crate::storage::{FileStore, KeyValueStore};
use crate::sync::TransactionSyncManager;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collaborators supplied by the host platform
pub struct ManagerDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub biometric: Arc<dyn BiometricCapability>,
    /// Device-bound material the at-rest key is derived from
    pub key_material: SecretBytes,
    pub providers: Vec<Arc<dyn ChainProvider>>,
    /// Defaults to `AesGcmCodec` with the configured KDF cost
    pub codec: Option<Arc<dyn SecretCodec>>,
    /// Defaults to `KeyManager`
    pub crypto: Option<Arc<dyn WalletCrypto>>,
}

impl ManagerDeps {
    /// File-backed storage and HTTP providers taken from the configuration
    pub fn from_config(
        config: &WalletConfig,
        biometric: Arc<dyn BiometricCapability>,
        key_material: SecretBytes,
    ) -> Self {
        Self {
            storage: Arc::new(FileStore::new_with_base_dir(config.data_dir.clone())),
            biometric,
            key_material,
            providers: config.providers(),
            codec: None,
            crypto: None,
        }
    }
}

pub struct WalletManager {
    pub config: WalletConfig,
    store: Arc<StateStore>,
    reporter: Arc<ErrorReporter>,
    gate: Arc<BiometricGate>,
    credentials: SecureCredentialStore,
    sync: TransactionSyncManager,
    profiles: ProfileManager,
}

impl WalletManager {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new(config: WalletConfig, deps: ManagerDeps) -> Self {
        let store = Arc::new(StateStore::new());

        let reporter = Arc::new(ErrorReporter::new());
        {
            let store = store.clone();
            reporter.register(move |classified| {
                store.publish(StoreEvent::Error(classified.clone()));
            });
        }

        let gate = Arc::new(BiometricGate::new(
            deps.biometric,
            config.freshness_window,
            config.biometric_policy,
        ));

        let codec = deps
            .codec
            .unwrap_or_else(|| Arc::new(AesGcmCodec::new(config.kdf)));
        let crypto = deps.crypto.unwrap_or_else(|| Arc::new(KeyManager));
        let credentials = SecureCredentialStore::new(
            deps.storage.clone(),
            codec,
            crypto,
            gate.clone(),
            deps.key_material,
        );

        let discovery = ChainDiscoveryService::new(
            deps.providers,
            config.provider_timeout,
            config.discovery_concurrency,
            reporter.clone(),
        );
        let sync = TransactionSyncManager::new(
            discovery,
            store.clone(),
            reporter.clone(),
            config.sync_cache_ttl,
        );

        let profiles = ProfileManager::new(deps.storage, store.clone());

        log::info!(
            "Wallet manager ready ({} chain provider(s))",
            sync.discovery().configured_chains().len()
        );

        Self {
            config,
            store,
            reporter,
            gate,
            credentials,
            sync,
            profiles,
        }
    }

    /// Route a failure through the classifier before handing it back
    fn reported<T>(&self, result: Result<T, WalletError>) -> Result<T, WalletError> {
        result.map_err(|e| {
            self.reporter.report(&e);
            e
        })
    }

    fn toast(&self, level: NotificationLevel, message: impl Into<String>) {
        self.store
            .publish(StoreEvent::Toast(Notification::new(level, message)));
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    // ============================================================================
    // Wallet Lifecycle
    // ============================================================================

    /// Restore the persisted wallet (and profile) into a new session
    pub async fn load_existing_wallet(&self) -> Result<Option<Wallet>, WalletError> {
        let wallet = self.reported(self.credentials.load_wallet().await)?;
        if let Some(wallet) = &wallet {
            self.start_session(&wallet.address);
        }
        self.reported(self.profiles.load_profile().await)?;
        Ok(wallet)
    }

    /// Persist a wallet from a phrase the caller already holds
    pub async fn create_wallet(&self, phrase: SecretPhrase) -> Result<Wallet, WalletError> {
        let wallet = self.reported(self.credentials.create_wallet(phrase).await)?;
        self.start_session(&wallet.address);
        self.toast(NotificationLevel::Success, "Wallet created");
        Ok(wallet)
    }

    /// Generate a fresh phrase and persist it; back it up via `reveal_secret`
    pub async fn create_new_wallet(&self, word_count: usize) -> Result<Wallet, WalletError> {
        let phrase = self.reported(KeyManager::generate(word_count))?;
        self.create_wallet(phrase).await
    }

    pub async fn import_wallet(&self, phrase: &str) -> Result<Wallet, WalletError> {
        let wallet = self.reported(self.credentials.import_wallet(phrase).await)?;
        self.start_session(&wallet.address);
        self.toast(NotificationLevel::Success, "Wallet imported");
        Ok(wallet)
    }

    /// Follow an address without holding its keys
    pub fn watch_address(&self, address: &str) -> Result<(), WalletError> {
        let address = address.trim();
        let valid = address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return self.reported(Err(WalletError::InvalidAddress(address.to_string())));
        }
        self.start_session(address);
        Ok(())
    }

    /// Erase the wallet record and every derived view
    ///
    /// In-flight refreshes are cancelled and the store is cleared before the
    /// record goes, so nothing fetched for the old address can reappear.
    pub async fn delete_wallet(&self) -> Result<(), WalletError> {
        self.sync.cancel_all();
        self.store.clear_wallets();
        self.gate.lock();
        self.reported(self.credentials.delete_wallet().await)?;
        self.toast(NotificationLevel::Info, "Wallet removed from this device");
        Ok(())
    }

    fn start_session(&self, address: &str) {
        self.sync.cancel_all();
        self.store.begin_session(address);
    }

    pub fn address(&self) -> Option<String> {
        self.store.address()
    }

    // ============================================================================
    // Authentication & Secret Release
    // ============================================================================

    pub async fn unlock(&self, prompt: &str) -> Result<(), WalletError> {
        self.reported(self.gate.request_unlock(prompt).await)
    }

    pub fn lock(&self) {
        self.gate.lock();
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// One-shot display value; never persist or log it
    pub async fn reveal_secret(&self) -> Result<SecretPhrase, WalletError> {
        self.reported(self.credentials.reveal_secret().await)
    }

    pub async fn reveal_private_key(&self) -> Result<SecretBytes, WalletError> {
        self.reported(self.credentials.reveal_private_key().await)
    }

    // ============================================================================
    // Chains & Transactions
    // ============================================================================

    fn active_address(&self) -> Result<String, WalletError> {
        self.reported(self.store.address().ok_or(WalletError::WalletNotFound))
    }

    /// Refresh the active address; per-chain failures are already reported
    pub async fn refresh(&self) -> Result<SyncSummary, WalletError> {
        let address = self.active_address()?;
        self.sync.refresh(&address).await.map_err(|e| {
            if !matches!(e, WalletError::SyncFailed { .. } | WalletError::Cancelled) {
                self.reporter.report(&e);
            }
            e
        })
    }

    pub async fn refresh_if_stale(&self) -> Result<SyncSummary, WalletError> {
        let address = self.active_address()?;
        self.sync.refresh_if_stale(&address).await.map_err(|e| {
            if !matches!(e, WalletError::SyncFailed { .. } | WalletError::Cancelled) {
                self.reporter.report(&e);
            }
            e
        })
    }

    pub fn cancel_refresh(&self) {
        self.sync.cancel_all();
    }

    pub fn is_refreshing(&self) -> bool {
        self.store
            .address()
            .map_or(false, |address| self.sync.is_refreshing(&address))
    }

    /// Probe providers without touching the ledger
    pub async fn discover_active_chains(&self) -> Result<Vec<ActiveChain>, WalletError> {
        let address = self.active_address()?;
        Ok(self.sync.discovery().discover_active_chains(&address).await)
    }

    pub fn active_chains(&self) -> Vec<ActiveChain> {
        self.store.active_chains()
    }

    pub fn transactions(&self, filter: TransactionFilter) -> Vec<Transaction> {
        self.sync.get_transactions_by_type(filter)
    }

    pub fn balances(&self, chain: Chain) -> Vec<Balance> {
        self.store.balances(chain)
    }

    // ============================================================================
    // Profile
    // ============================================================================

    pub async fn save_profile(&self, profile: Profile) -> Result<Profile, WalletError> {
        let saved = self.reported(self.profiles.save_profile(profile).await)?;
        self.toast(NotificationLevel::Success, "Profile saved");
        Ok(saved)
    }

    pub async fn load_profile(&self) -> Result<Option<Profile>, WalletError> {
        self.reported(self.profiles.load_profile().await)
    }

    pub async fn delete_profile(&self) -> Result<(), WalletError> {
        self.reported(self.profiles.delete_profile().await)
    }

    // ============================================================================
    // Published State
    // ============================================================================

    pub fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.store
    }
}
