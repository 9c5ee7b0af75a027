//! Off-chain settlement profile
//!
//! The profile has its own storage record and outlives wallet deletion.

use crate::error::{StorageError, WalletError};
use crate::state::StateStore;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PROFILE_RECORD_KEY: &str = "profile";

/// Where settlement payouts are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementMethod {
    Bank {
        bank_name: String,
        account_name: String,
        account_number: String,
    },
    MobileMoney {
        provider: String,
        phone_number: String,
        account_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// ISO-3166 alpha-2, upper case
    pub country: String,
    pub display_name: Option<String>,
    pub settlement: SettlementMethod,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(country: impl Into<String>, settlement: SettlementMethod) -> Self {
        Self {
            country: country.into(),
            display_name: None,
            settlement,
            updated_at: Utc::now(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Trim fields and reject incomplete details
    pub fn validated(mut self) -> Result<Self, WalletError> {
        self.country = self.country.trim().to_ascii_uppercase();
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WalletError::InvalidProfile(format!(
                "country must be a two-letter code, got '{}'",
                self.country
            )));
        }

        self.display_name = self
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        match &mut self.settlement {
            SettlementMethod::Bank {
                bank_name,
                account_name,
                account_number,
            } => {
                require("bank_name", bank_name)?;
                require("account_name", account_name)?;
                require("account_number", account_number)?;
                if !account_number.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(WalletError::InvalidProfile(
                        "account_number must be alphanumeric".to_string(),
                    ));
                }
            }
            SettlementMethod::MobileMoney {
                provider,
                phone_number,
                account_name,
            } => {
                require("provider", provider)?;
                require("account_name", account_name)?;
                require("phone_number", phone_number)?;
                let digits = phone_number.strip_prefix('+').unwrap_or(phone_number.as_str());
                if digits.len() < 7 || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(WalletError::InvalidProfile(format!(
                        "invalid phone number '{}'",
                        phone_number
                    )));
                }
            }
        }
        Ok(self)
    }
}

fn require(field: &str, value: &mut String) -> Result<(), WalletError> {
    *value = value.trim().to_string();
    if value.is_empty() {
        Err(WalletError::InvalidProfile(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

pub struct ProfileManager {
    storage: Arc<dyn KeyValueStore>,
    store: Arc<StateStore>,
}

impl ProfileManager {
    pub fn new(storage: Arc<dyn KeyValueStore>, store: Arc<StateStore>) -> Self {
        Self { storage, store }
    }

    /// Validate and persist, replacing any previous profile
    pub async fn save_profile(&self, profile: Profile) -> Result<Profile, WalletError> {
        let mut profile = profile.validated()?;
        profile.updated_at = Utc::now();

        let bytes = serde_json::to_vec(&profile).map_err(StorageError::from)?;
        self.storage.put(PROFILE_RECORD_KEY, &bytes).await?;
        self.store.set_profile(Some(profile.clone()));

        log::info!("Profile saved (country {})", profile.country);
        Ok(profile)
    }

    /// Read the stored profile into the state store
    pub async fn load_profile(&self) -> Result<Option<Profile>, WalletError> {
        let profile = match self.storage.get(PROFILE_RECORD_KEY).await? {
            Some(bytes) => Some(
                serde_json::from_slice::<Profile>(&bytes)
                    .map_err(|e| StorageError::Corrupted(format!("profile record: {}", e)))?,
            ),
            None => None,
        };
        self.store.set_profile(profile.clone());
        Ok(profile)
    }

    pub async fn delete_profile(&self) -> Result<(), WalletError> {
        self.storage.delete(PROFILE_RECORD_KEY).await?;
        self.store.set_profile(None);
        log::info!("Profile deleted");
        Ok(())
    }
}
