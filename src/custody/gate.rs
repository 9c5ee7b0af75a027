//! Biometric authentication gate
//!
//! ```text
//! Locked ──request_unlock──▶ Authenticating ──success──▶ Unlocked ──window elapsed──▶ TimedOut
//!    ▲                             │                        │
//!    └────────failure/cancel───────┘◀──────── lock() ───────┘
//! ```
//!
//! `TimedOut` gates exactly like `Locked`. Concurrent unlock requests share a
//! single authentication prompt and all observe its outcome.

use crate::error::WalletError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Result of one platform authentication prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub success: bool,
    pub reason: Option<String>,
}

impl AuthResult {
    pub fn success() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Platform biometric capability
#[async_trait]
pub trait BiometricCapability: Send + Sync {
    async fn has_hardware(&self) -> bool;
    async fn is_enrolled(&self) -> bool;
    async fn authenticate(&self, prompt: &str) -> AuthResult;
}

/// Capability for hosts without biometric hardware
pub struct NoBiometric;

#[async_trait]
impl BiometricCapability for NoBiometric {
    async fn has_hardware(&self) -> bool {
        false
    }

    async fn is_enrolled(&self) -> bool {
        false
    }

    async fn authenticate(&self, _prompt: &str) -> AuthResult {
        AuthResult::failure("no biometric hardware")
    }
}

/// What to do when no biometric is enrolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnavailablePolicy {
    #[default]
    Deny,
    /// Grant access without a prompt; only selectable in development builds
    DevelopmentBypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Authenticating,
    Unlocked,
    TimedOut,
}

#[derive(Debug, Clone)]
enum UnlockOutcome {
    Granted,
    Denied(String),
    Unavailable(String),
}

impl From<UnlockOutcome> for Result<(), WalletError> {
    fn from(outcome: UnlockOutcome) -> Self {
        match outcome {
            UnlockOutcome::Granted => Ok(()),
            UnlockOutcome::Denied(reason) => Err(WalletError::AuthenticationDenied(reason)),
            UnlockOutcome::Unavailable(reason) => Err(WalletError::CapabilityUnavailable(reason)),
        }
    }
}

type PendingUnlock = Shared<BoxFuture<'static, UnlockOutcome>>;

enum Phase {
    Locked,
    Authenticating(PendingUnlock),
    Unlocked { since: Instant },
    TimedOut,
}

struct GateInner {
    phase: Phase,
    /// Bumped by every transition that invalidates a pending prompt
    generation: u64,
}

impl GateInner {
    fn expire(&mut self, window: Duration) {
        if let Phase::Unlocked { since } = self.phase {
            if since.elapsed() >= window {
                log::debug!("Biometric freshness window elapsed");
                self.phase = Phase::TimedOut;
            }
        }
    }
}

pub struct BiometricGate {
    capability: Arc<dyn BiometricCapability>,
    freshness_window: Duration,
    policy: UnavailablePolicy,
    inner: Arc<Mutex<GateInner>>,
}

fn lock_inner(inner: &Mutex<GateInner>) -> MutexGuard<'_, GateInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BiometricGate {
    pub fn new(
        capability: Arc<dyn BiometricCapability>,
        freshness_window: Duration,
        policy: UnavailablePolicy,
    ) -> Self {
        if policy == UnavailablePolicy::DevelopmentBypass {
            log::warn!("Biometric gate constructed with the development bypass enabled");
        }
        Self {
            capability,
            freshness_window,
            policy,
            inner: Arc::new(Mutex::new(GateInner {
                phase: Phase::Locked,
                generation: 0,
            })),
        }
    }

    pub fn state(&self) -> GateState {
        let mut inner = lock_inner(&self.inner);
        inner.expire(self.freshness_window);
        match inner.phase {
            Phase::Locked => GateState::Locked,
            Phase::Authenticating(_) => GateState::Authenticating,
            Phase::Unlocked { .. } => GateState::Unlocked,
            Phase::TimedOut => GateState::TimedOut,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == GateState::Unlocked
    }

    /// Time left before the gate times out, if unlocked
    pub fn remaining_freshness(&self) -> Option<Duration> {
        let mut inner = lock_inner(&self.inner);
        inner.expire(self.freshness_window);
        match inner.phase {
            Phase::Unlocked { since } => Some(self.freshness_window.saturating_sub(since.elapsed())),
            _ => None,
        }
    }

    /// Fails with `NotAuthenticated` unless the gate is unlocked and fresh
    pub fn ensure_unlocked(&self) -> Result<(), WalletError> {
        if self.is_unlocked() {
            Ok(())
        } else {
            Err(WalletError::NotAuthenticated)
        }
    }

    /// Prompt for authentication, or join the prompt already showing
    pub async fn request_unlock(&self, prompt: &str) -> Result<(), WalletError> {
        let pending = {
            let mut inner = lock_inner(&self.inner);
            inner.expire(self.freshness_window);
            match &inner.phase {
                Phase::Unlocked { .. } => return Ok(()),
                Phase::Authenticating(pending) => {
                    log::debug!("Unlock already in progress, joining");
                    pending.clone()
                }
                Phase::Locked | Phase::TimedOut => {
                    inner.generation += 1;
                    let pending = self.start_authentication(inner.generation, prompt.to_string());
                    inner.phase = Phase::Authenticating(pending.clone());
                    pending
                }
            }
        };
        pending.await.into()
    }

    /// Lock immediately; a prompt in progress resolves as denied
    pub fn lock(&self) {
        let mut inner = lock_inner(&self.inner);
        inner.generation += 1;
        inner.phase = Phase::Locked;
        log::info!("Biometric gate locked");
    }

    fn start_authentication(&self, generation: u64, prompt: String) -> PendingUnlock {
        let capability = self.capability.clone();
        let inner = self.inner.clone();
        let policy = self.policy;

        let handle = tokio::spawn(async move {
            let outcome = if !capability.has_hardware().await || !capability.is_enrolled().await {
                match policy {
                    UnavailablePolicy::Deny => {
                        UnlockOutcome::Unavailable("no biometric enrolled".to_string())
                    }
                    UnavailablePolicy::DevelopmentBypass => {
                        log::warn!("No biometric enrolled; granting access via development bypass");
                        UnlockOutcome::Granted
                    }
                }
            } else {
                let result = capability.authenticate(&prompt).await;
                if result.success {
                    UnlockOutcome::Granted
                } else {
                    UnlockOutcome::Denied(
                        result
                            .reason
                            .unwrap_or_else(|| "authentication failed".to_string()),
                    )
                }
            };

            let mut state = lock_inner(&inner);
            if state.generation != generation {
                return UnlockOutcome::Denied("authentication cancelled".to_string());
            }
            state.phase = match outcome {
                UnlockOutcome::Granted => {
                    log::info!("Biometric gate unlocked");
                    Phase::Unlocked {
                        since: Instant::now(),
                    }
                }
                _ => Phase::Locked,
            };
            outcome
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => UnlockOutcome::Denied(format!("authentication task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }
}
