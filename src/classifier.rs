//! Error classification
//!
//! Maps every `WalletError` to a severity and a human-readable message.
//! Presentation registers callbacks on an `ErrorReporter`; the classifier
//! itself knows nothing about how errors are shown.

use crate::chain::Chain;
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedError {
    pub severity: Severity,
    pub message: String,
    /// Chain the failure is scoped to, if any
    pub chain: Option<Chain>,
    pub occurred_at: DateTime<Utc>,
}

/// Pure mapping from an error to its severity and message
pub fn classify(error: &WalletError) -> ClassifiedError {
    let (severity, message, chain) = match error {
        WalletError::InvalidSecretMaterial(_) => (
            Severity::Medium,
            "The recovery phrase is not valid. Check the words and their order.".to_string(),
            None,
        ),
        WalletError::InvalidProfile(reason) => (
            Severity::Low,
            format!("Profile details are incomplete: {}", reason),
            None,
        ),
        WalletError::InvalidAddress(_) => (
            Severity::Low,
            "That does not look like a wallet address.".to_string(),
            None,
        ),
        WalletError::WalletExists(_) => (
            Severity::Low,
            "A wallet already exists on this device.".to_string(),
            None,
        ),
        WalletError::WalletNotFound => (
            Severity::Medium,
            "No wallet was found on this device.".to_string(),
            None,
        ),
        WalletError::AuthenticationFailure => (
            Severity::Critical,
            "Stored wallet secrets could not be verified. They may be corrupted.".to_string(),
            None,
        ),
        WalletError::AuthenticationDenied(_) => (
            Severity::High,
            "Authentication was not successful.".to_string(),
            None,
        ),
        WalletError::CapabilityUnavailable(_) => (
            Severity::High,
            "Biometric authentication is not set up on this device.".to_string(),
            None,
        ),
        WalletError::NotAuthenticated => (
            Severity::High,
            "Please authenticate to continue.".to_string(),
            None,
        ),
        WalletError::ProviderTimeout { chain, .. } => (
            Severity::Medium,
            format!("{} is taking too long to respond. Showing last known data.", chain),
            Some(*chain),
        ),
        WalletError::ProviderError { chain, .. } => (
            Severity::Medium,
            format!("Could not load activity from {}. Showing last known data.", chain),
            Some(*chain),
        ),
        WalletError::SyncFailed { .. } => (
            Severity::High,
            "Could not refresh any network. Check your connection and try again.".to_string(),
            None,
        ),
        WalletError::Storage(_) => (
            Severity::Critical,
            "Secure storage could not be accessed.".to_string(),
            None,
        ),
        WalletError::InvalidConfig(_) => (
            Severity::High,
            "The application is misconfigured.".to_string(),
            None,
        ),
        WalletError::Cancelled => (Severity::Low, "Operation was cancelled.".to_string(), None),
        WalletError::Internal(_) => (
            Severity::High,
            "Something went wrong. Please try again.".to_string(),
            None,
        ),
    };

    ClassifiedError {
        severity,
        message,
        chain,
        occurred_at: Utc::now(),
    }
}

pub type ErrorCallback = Arc<dyn Fn(&ClassifiedError) + Send + Sync>;

/// Classifies errors and fans them out to registered callbacks
#[derive(Default)]
pub struct ErrorReporter {
    callbacks: RwLock<Vec<ErrorCallback>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn report(&self, error: &WalletError) -> ClassifiedError {
        let classified = classify(error);
        match classified.severity {
            Severity::Low => log::info!("{}", error),
            Severity::Medium => log::warn!("{}", error),
            Severity::High | Severity::Critical => log::error!("{}", error),
        }

        let callbacks: Vec<ErrorCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback(&classified);
        }
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, StorageError};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_credential_failures_are_high_or_critical() {
        for err in [
            WalletError::AuthenticationFailure,
            WalletError::AuthenticationDenied("cancelled".to_string()),
            WalletError::CapabilityUnavailable("not enrolled".to_string()),
            WalletError::NotAuthenticated,
            WalletError::Storage(StorageError::Corrupted("bad".to_string())),
        ] {
            assert!(classify(&err).severity >= Severity::High, "{:?}", err);
        }
    }

    #[test]
    fn test_provider_failures_are_medium() {
        let timeout = WalletError::from_provider(Chain::Ethereum, ProviderError::Timeout(Duration::from_secs(1)));
        let http = WalletError::from_provider(
            Chain::Polygon,
            ProviderError::Http {
                status: 502,
                body: String::new(),
            },
        );
        let classified = classify(&timeout);
        assert_eq!(classified.severity, Severity::Medium);
        assert_eq!(classified.chain, Some(Chain::Ethereum));
        assert_eq!(classify(&http).severity, Severity::Medium);
    }

    #[test]
    fn test_input_validation_is_low_or_medium() {
        assert!(classify(&WalletError::InvalidSecretMaterial("x".to_string())).severity <= Severity::Medium);
        assert_eq!(
            classify(&WalletError::InvalidProfile("country".to_string())).severity,
            Severity::Low
        );
    }

    #[test]
    fn test_reporter_invokes_callbacks() {
        let reporter = ErrorReporter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        reporter.register(move |e| sink.lock().unwrap().push(e.severity));

        reporter.report(&WalletError::NotAuthenticated);
        reporter.report(&WalletError::Cancelled);

        assert_eq!(*seen.lock().unwrap(), vec![Severity::High, Severity::Low]);
    }
}
