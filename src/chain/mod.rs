//! Chain model, provider contract and discovery
//!
//! - `types.rs` - Closed chain set and validated provider configuration
//! - `provider.rs` - ChainProvider trait and provider-shaped activity
//! - `etherscan.rs` - HTTP provider for Etherscan-compatible explorers
//! - `discovery.rs` - Parallel, bounded discovery of active chains

pub mod discovery;
pub mod etherscan;
pub mod provider;
pub mod types;

pub use discovery::{ChainDiscoveryService, DiscoveredChain, DiscoveryOutcome};
pub use etherscan::EtherscanProvider;
pub use provider::{ChainProvider, RawActivity, RawBalance, RawToken, RawTransaction, TokenStandard};
pub use types::{Chain, ChainConfig};
