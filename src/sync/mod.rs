//! Transaction synchronization
//!
//! - `canonical.rs` - Provider records to canonical Transaction/Balance
//! - `manager.rs` - Single-flight refresh with cancellation and serialized merges

pub mod canonical;
pub mod manager;

pub use canonical::{format_units, Canonicalizer, OwnedAddresses};
pub use manager::TransactionSyncManager;
