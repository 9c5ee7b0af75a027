use anyhow::{bail, Context};
use chainvault::{
    ManagerDeps, MemoryStore, NoBiometric, SecretBytes, TransactionFilter, WalletConfig,
    WalletManager,
};
use serde_json::json;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let Some(address) = args.next() else {
        bail!("usage: chainvault <address> [all|send|receive|swap|...]");
    };
    let filter: TransactionFilter = match args.next() {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        None => TransactionFilter::All,
    };

    let config = WalletConfig::from_env().context("loading configuration")?;
    if config.chains.is_empty() {
        bail!("no chain providers configured; set CHAINS_CONFIG");
    }

    // Watch-only: nothing is persisted and no key material exists
    let deps = ManagerDeps {
        storage: Arc::new(MemoryStore::new()),
        biometric: Arc::new(NoBiometric),
        key_material: SecretBytes::new(Vec::new()),
        providers: config.providers(),
        codec: None,
        crypto: None,
    };
    let manager = WalletManager::new(config, deps);

    manager.watch_address(&address)?;
    log::info!("Refreshing watch-only address {}", address);
    let summary = manager.refresh().await?;

    let output = json!({
        "summary": summary,
        "active_chains": manager.active_chains(),
        "transactions": manager.transactions(filter),
        "chain_status": manager.snapshot().chain_status,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
