//! Transaction synchronization
//!
//! A refresh runs discovery, canonicalizes each discovered chain's activity
//! and merges it into the state store one chain at a time. Concurrent
//! refreshes for the same address attach to the pass already in flight.

use super::canonical::{Canonicalizer, OwnedAddresses};
use crate::chain::{Chain, ChainDiscoveryService};
use crate::classifier::ErrorReporter;
use crate::error::WalletError;
use crate::state::{
    CacheEntry, ChainMerge, StateStore, SyncEpoch, SyncSummary, Transaction, TransactionFilter,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Failure shared between every caller attached to one pass
#[derive(Debug, Clone)]
enum PassFailure {
    AllChainsFailed(Vec<Chain>),
    Cancelled,
    Aborted(String),
}

impl From<PassFailure> for WalletError {
    fn from(failure: PassFailure) -> Self {
        match failure {
            PassFailure::AllChainsFailed(chains) => WalletError::SyncFailed { chains },
            PassFailure::Cancelled => WalletError::Cancelled,
            PassFailure::Aborted(msg) => WalletError::Internal(format!("sync task aborted: {}", msg)),
        }
    }
}

type PassResult = Result<SyncSummary, PassFailure>;

struct InFlight {
    id: u64,
    token: CancellationToken,
    result: Shared<BoxFuture<'static, PassResult>>,
}

struct SyncInner {
    discovery: ChainDiscoveryService,
    store: Arc<StateStore>,
    reporter: Arc<ErrorReporter>,
    cache_ttl: Duration,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_id: AtomicU64,
}

impl SyncInner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, key: &str, id: u64) {
        let mut in_flight = self.in_flight();
        if in_flight.get(key).map_or(false, |entry| entry.id == id) {
            in_flight.remove(key);
        }
    }

    async fn run_pass(&self, address: &str, epoch: SyncEpoch, token: &CancellationToken) -> PassResult {
        let start = Instant::now();
        log::info!("Refreshing {}", address);

        let outcome = tokio::select! {
            _ = token.cancelled() => return Err(PassFailure::Cancelled),
            outcome = self.discovery.discover(address) => outcome,
        };
        if token.is_cancelled() {
            return Err(PassFailure::Cancelled);
        }

        let mut summary = SyncSummary {
            address: address.to_string(),
            chains_synced: Vec::new(),
            chains_failed: Vec::new(),
            transactions_added: 0,
            transactions_updated: 0,
        };

        for (chain, err) in &outcome.failures {
            self.store
                .mark_chain_failed(epoch, *chain)
                .map_err(|_| PassFailure::Cancelled)?;
            self.reporter
                .report(&WalletError::from_provider(*chain, err.clone()));
            summary.chains_failed.push(*chain);
        }

        if outcome.all_failed() {
            let failure = WalletError::SyncFailed {
                chains: summary.chains_failed.clone(),
            };
            self.reporter.report(&failure);
            return Err(PassFailure::AllChainsFailed(summary.chains_failed));
        }

        let owned = OwnedAddresses::new([address]);
        for discovered in outcome.discovered {
            if token.is_cancelled() {
                return Err(PassFailure::Cancelled);
            }
            let chain = discovered.active.chain;
            let canonicalizer = Canonicalizer::new(chain, &owned);
            let merge = ChainMerge {
                transactions: canonicalizer.transactions(&discovered.activity),
                balances: canonicalizer.balances(&discovered.activity),
                active: discovered.active,
            };

            let stats = self
                .store
                .merge_chain(epoch, merge)
                .map_err(|_| PassFailure::Cancelled)?;
            log::debug!(
                "{}: merged {} new, {} updated transactions",
                chain,
                stats.added,
                stats.updated
            );
            summary.chains_synced.push(chain);
            summary.transactions_added += stats.added;
            summary.transactions_updated += stats.updated;
        }

        self.store
            .record_sync(epoch, CacheEntry::new(summary.clone(), self.cache_ttl))
            .map_err(|_| PassFailure::Cancelled)?;

        log::info!(
            "Refresh of {} done in {:?}: {} chains synced, {} failed, {} new transactions",
            address,
            start.elapsed(),
            summary.chains_synced.len(),
            summary.chains_failed.len(),
            summary.transactions_added
        );
        Ok(summary)
    }
}

pub struct TransactionSyncManager {
    inner: Arc<SyncInner>,
}

impl TransactionSyncManager {
    pub fn new(
        discovery: ChainDiscoveryService,
        store: Arc<StateStore>,
        reporter: Arc<ErrorReporter>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                discovery,
                store,
                reporter,
                cache_ttl,
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn discovery(&self) -> &ChainDiscoveryService {
        &self.inner.discovery
    }

    /// Refresh the ledger for the active address
    ///
    /// Per-chain failures are reported and absorbed. Fails with `SyncFailed`
    /// when every chain failed and with `Cancelled` when the pass was
    /// cancelled or the store was cleared before it could merge.
    pub async fn refresh(&self, address: &str) -> Result<SyncSummary, WalletError> {
        let active = self.inner.store.address();
        if !active.map_or(false, |a| a.eq_ignore_ascii_case(address)) {
            return Err(WalletError::WalletNotFound);
        }

        let key = address.to_lowercase();
        let result = {
            let mut in_flight = self.inner.in_flight();
            // a cancelled pass belongs to an earlier session and is replaced
            match in_flight.get(&key).filter(|entry| !entry.token.is_cancelled()) {
                Some(existing) => {
                    log::debug!("Refresh of {} already in flight, attaching", address);
                    existing.result.clone()
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let token = CancellationToken::new();
                    let epoch = self.inner.store.epoch();

                    let inner = self.inner.clone();
                    let pass_token = token.clone();
                    let pass_address = address.to_string();
                    let pass_key = key.clone();
                    let handle = tokio::spawn(async move {
                        let result = inner.run_pass(&pass_address, epoch, &pass_token).await;
                        inner.finish(&pass_key, id);
                        result
                    });

                    let result = async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(PassFailure::Aborted(e.to_string())),
                        }
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(
                        key,
                        InFlight {
                            id,
                            token,
                            result: result.clone(),
                        },
                    );
                    result
                }
            }
        };

        result.await.map_err(WalletError::from)
    }

    /// Refresh only when there is no fresh cache entry for the address
    pub async fn refresh_if_stale(&self, address: &str) -> Result<SyncSummary, WalletError> {
        if let Some(entry) = self.inner.store.last_sync() {
            if entry.value.address.eq_ignore_ascii_case(address) && !entry.is_stale() {
                log::debug!("Sync cache for {} is fresh, skipping refresh", address);
                return Ok(entry.value);
            }
        }
        self.refresh(address).await
    }

    pub fn is_refreshing(&self, address: &str) -> bool {
        self.inner.in_flight().contains_key(&address.to_lowercase())
    }

    /// Cancel an in-flight refresh; its results are discarded
    ///
    /// The entry is dropped at once so the next `refresh` starts a new pass.
    pub fn cancel(&self, address: &str) {
        if let Some(entry) = self.inner.in_flight().remove(&address.to_lowercase()) {
            log::info!("Cancelling refresh of {}", address);
            entry.token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        for (_, entry) in self.inner.in_flight().drain() {
            entry.token.cancel();
        }
    }

    /// Ledger view from the store, newest first; no network effect
    pub fn get_transactions_by_type(&self, filter: TransactionFilter) -> Vec<Transaction> {
        self.inner.store.transactions(filter)
    }
}
