//! Process-wide state container
//!
//! The store owns the authoritative copies of the active address, the
//! discovered chain set and the transaction ledger. Readers take cloned
//! snapshots; writers go through the crate-internal mutation API, which
//! serializes under a single write lock.
//!
//! Every mutation coming from a sync pass carries the `SyncEpoch` that was
//! current when the pass started. `begin_session` and `clear_wallets` bump the
//! epoch, so a merge from a pass that started before either call is rejected.

use super::models::{
    ActiveChain, Balance, CacheEntry, ChainStatus, SyncSummary, Transaction, TransactionFilter,
};
use crate::chain::Chain;
use crate::classifier::ClassifiedError;
use crate::error::WalletError;
use crate::profile::Profile;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// Generation counter for store contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncEpoch(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
        }
    }
}

/// Published to presentation subscribers
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Error(ClassifiedError),
    Toast(Notification),
    StateChanged,
}

/// Data produced by one chain's fetch, ready to merge
#[derive(Debug, Clone)]
pub struct ChainMerge {
    pub active: ActiveChain,
    pub transactions: Vec<Transaction>,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
}

/// Read-only copy of the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSnapshot {
    pub address: Option<String>,
    pub active_chains: Vec<ActiveChain>,
    pub transactions: Vec<Transaction>,
    pub balances: Vec<Balance>,
    pub chain_status: BTreeMap<Chain, ChainStatus>,
    pub last_sync: Option<CacheEntry<SyncSummary>>,
    pub profile: Option<Profile>,
}

#[derive(Default)]
struct StoreInner {
    epoch: u64,
    address: Option<String>,
    active_chains: BTreeMap<Chain, ActiveChain>,
    transactions: HashMap<String, Transaction>,
    balances: BTreeMap<Chain, Vec<Balance>>,
    chain_status: BTreeMap<Chain, ChainStatus>,
    last_sync: Option<CacheEntry<SyncSummary>>,
    profile: Option<Profile>,
}

impl StoreInner {
    fn check_epoch(&self, epoch: SyncEpoch) -> Result<(), WalletError> {
        if epoch.0 != self.epoch {
            log::debug!(
                "Discarding write from epoch {} (current {})",
                epoch.0,
                self.epoch
            );
            return Err(WalletError::Cancelled);
        }
        Ok(())
    }

    fn reset_wallet_views(&mut self) {
        self.active_chains.clear();
        self.transactions.clear();
        self.balances.clear();
        self.chain_status.clear();
        self.last_sync = None;
    }

    fn sorted_transactions(&self, filter: TransactionFilter) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        txs
    }
}

pub struct StateStore {
    inner: RwLock<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================================
    // Read API
    // ============================================================================

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.read();
        StateSnapshot {
            address: inner.address.clone(),
            active_chains: inner.active_chains.values().cloned().collect(),
            transactions: inner.sorted_transactions(TransactionFilter::All),
            balances: inner.balances.values().flatten().cloned().collect(),
            chain_status: inner.chain_status.clone(),
            last_sync: inner.last_sync.clone(),
            profile: inner.profile.clone(),
        }
    }

    pub fn address(&self) -> Option<String> {
        self.read().address.clone()
    }

    pub fn epoch(&self) -> SyncEpoch {
        SyncEpoch(self.read().epoch)
    }

    pub fn active_chains(&self) -> Vec<ActiveChain> {
        self.read().active_chains.values().cloned().collect()
    }

    /// Ledger view ordered newest first
    pub fn transactions(&self, filter: TransactionFilter) -> Vec<Transaction> {
        self.read().sorted_transactions(filter)
    }

    pub fn balances(&self, chain: Chain) -> Vec<Balance> {
        self.read().balances.get(&chain).cloned().unwrap_or_default()
    }

    pub fn chain_status(&self, chain: Chain) -> Option<ChainStatus> {
        self.read().chain_status.get(&chain).copied()
    }

    pub fn last_sync(&self) -> Option<CacheEntry<SyncSummary>> {
        self.read().last_sync.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read().profile.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ============================================================================
    // Mutation API
    // ============================================================================

    pub(crate) fn publish(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Install a new active address; chain membership may only shrink here
    pub(crate) fn begin_session(&self, address: &str) -> SyncEpoch {
        let epoch = {
            let mut inner = self.write();
            inner.epoch += 1;
            inner.address = Some(address.to_string());
            inner.reset_wallet_views();
            SyncEpoch(inner.epoch)
        };
        log::info!("Started wallet session for {}", address);
        self.publish(StoreEvent::StateChanged);
        epoch
    }

    /// Reset everything; merges from earlier epochs are rejected afterwards
    pub(crate) fn clear_wallets(&self) {
        {
            let mut inner = self.write();
            inner.epoch += 1;
            inner.address = None;
            inner.reset_wallet_views();
            inner.profile = None;
        }
        log::info!("Wallet state cleared");
        self.publish(StoreEvent::StateChanged);
    }

    /// Merge one chain's fetch into the ledger
    pub(crate) fn merge_chain(
        &self,
        epoch: SyncEpoch,
        merge: ChainMerge,
    ) -> Result<MergeStats, WalletError> {
        let mut stats = MergeStats::default();
        {
            let mut inner = self.write();
            inner.check_epoch(epoch)?;

            let chain = merge.active.chain;
            inner
                .active_chains
                .entry(chain)
                .and_modify(|existing| existing.absorb(&merge.active))
                .or_insert(merge.active);

            for tx in merge.transactions {
                match inner.transactions.get_mut(&tx.id) {
                    Some(existing) => {
                        if existing.apply_update(&tx) {
                            stats.updated += 1;
                        }
                    }
                    None => {
                        inner.transactions.insert(tx.id.clone(), tx);
                        stats.added += 1;
                    }
                }
            }

            inner.balances.insert(chain, merge.balances);
            inner.chain_status.insert(chain, ChainStatus::Fresh);
        }
        self.publish(StoreEvent::StateChanged);
        Ok(stats)
    }

    /// Record that a chain could not be refreshed; its earlier data stays
    pub(crate) fn mark_chain_failed(&self, epoch: SyncEpoch, chain: Chain) -> Result<(), WalletError> {
        let mut inner = self.write();
        inner.check_epoch(epoch)?;
        let status = match inner.chain_status.get(&chain) {
            Some(ChainStatus::Fresh) | Some(ChainStatus::Stale) => ChainStatus::Stale,
            _ => ChainStatus::Unavailable,
        };
        inner.chain_status.insert(chain, status);
        Ok(())
    }

    pub(crate) fn record_sync(
        &self,
        epoch: SyncEpoch,
        entry: CacheEntry<SyncSummary>,
    ) -> Result<(), WalletError> {
        let mut inner = self.write();
        inner.check_epoch(epoch)?;
        inner.last_sync = Some(entry);
        Ok(())
    }

    pub(crate) fn set_profile(&self, profile: Option<Profile>) {
        self.write().profile = profile;
        self.publish(StoreEvent::StateChanged);
    }
}
