//! Global state container and canonical ledger models
//!
//! - `models.rs` - ActiveChain, Transaction, Balance, CacheEntry
//! - `store.rs` - StateStore with snapshot reads and epoch-guarded writes

pub mod models;
pub mod store;

pub use models::{
    ActiveChain, Balance, CacheEntry, ChainStatus, SyncSummary, Transaction, TransactionFilter,
    TransactionMetadata, TransactionStatus, TransactionType,
};
pub use store::{
    ChainMerge, MergeStats, Notification, NotificationLevel, StateSnapshot, StateStore, StoreEvent,
    SyncEpoch,
};
