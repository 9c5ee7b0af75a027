//! Active chain discovery
//!
//! Every configured provider is probed independently with its own timeout.
//! A failing provider only removes its chain from the result.

use super::provider::{ChainProvider, RawActivity};
use super::types::Chain;
use crate::classifier::ErrorReporter;
use crate::error::{ProviderError, WalletError};
use crate::state::ActiveChain;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A chain with activity, plus the data fetched while probing it
#[derive(Debug, Clone)]
pub struct DiscoveredChain {
    pub active: ActiveChain,
    pub activity: RawActivity,
}

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub discovered: Vec<DiscoveredChain>,
    /// Probed successfully, no activity
    pub inactive: Vec<Chain>,
    pub failures: Vec<(Chain, ProviderError)>,
}

impl DiscoveryOutcome {
    pub fn active_chains(&self) -> Vec<ActiveChain> {
        self.discovered.iter().map(|d| d.active.clone()).collect()
    }

    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.discovered.is_empty() && self.inactive.is_empty()
    }
}

pub struct ChainDiscoveryService {
    providers: Vec<Arc<dyn ChainProvider>>,
    default_timeout: Duration,
    concurrency: usize,
    reporter: Arc<ErrorReporter>,
}

impl ChainDiscoveryService {
    pub fn new(
        providers: Vec<Arc<dyn ChainProvider>>,
        default_timeout: Duration,
        concurrency: usize,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            providers,
            default_timeout,
            concurrency: concurrency.max(1),
            reporter,
        }
    }

    pub fn configured_chains(&self) -> Vec<Chain> {
        self.providers.iter().map(|p| p.chain()).collect()
    }

    /// Determine the active chains for an address; failures are reported, not raised
    pub async fn discover_active_chains(&self, address: &str) -> Vec<ActiveChain> {
        let outcome = self.discover(address).await;
        for (chain, err) in &outcome.failures {
            self.reporter
                .report(&WalletError::from_provider(*chain, err.clone()));
        }
        outcome.active_chains()
    }

    /// Probe every provider and keep the fetched activity for reuse
    ///
    /// Failures are returned to the caller unreported.
    pub async fn discover(&self, address: &str) -> DiscoveryOutcome {
        let start = Instant::now();
        let probes = self.providers.iter().cloned().map(|provider| {
            let address = address.to_string();
            let timeout = provider.timeout().unwrap_or(self.default_timeout);
            async move {
                let chain = provider.chain();
                let result =
                    match tokio::time::timeout(timeout, provider.fetch_activity(&address)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(timeout)),
                    };
                (chain, result)
            }
        }).collect::<Vec<_>>();

        let results: Vec<(Chain, Result<RawActivity, ProviderError>)> = stream::iter(probes)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = DiscoveryOutcome::default();
        for (chain, result) in results {
            match result {
                Ok(activity) if activity.has_activity() => {
                    let (first, last) = match activity.seen_range() {
                        Some((first, last)) => (Some(first), Some(last)),
                        None => (None, None),
                    };
                    outcome.discovered.push(DiscoveredChain {
                        active: ActiveChain::new(chain, first, last),
                        activity,
                    });
                }
                Ok(_) => outcome.inactive.push(chain),
                Err(err) => {
                    log::warn!("Discovery on {} failed: {}", chain, err);
                    outcome.failures.push((chain, err));
                }
            }
        }
        outcome.discovered.sort_by_key(|d| d.active.chain);
        outcome.inactive.sort();
        outcome.failures.sort_by_key(|(chain, _)| *chain);

        log::info!(
            "Discovery for {}: {} active, {} inactive, {} failed in {:?}",
            address,
            outcome.discovered.len(),
            outcome.inactive.len(),
            outcome.failures.len(),
            start.elapsed()
        );
        outcome
    }
}
