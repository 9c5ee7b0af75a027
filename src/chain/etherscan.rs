//! Etherscan-compatible explorer client
//!
//! Works against any explorer exposing the Etherscan account API
//! (etherscan, polygonscan, bscscan, arbiscan, ...).

use super::provider::{ChainProvider, RawActivity, RawBalance, RawToken, RawTransaction, TokenStandard};
use super::types::{Chain, ChainConfig};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

pub struct EtherscanProvider {
    client: reqwest::Client,
    config: ChainConfig,
    max_retries: u32,
    backoff: Duration,
}

impl EtherscanProvider {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Call one account action, retrying while the explorer reports a rate limit
    async fn account_call(&self, action: &str, address: &str) -> Result<Value, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.account_call_once(action, address).await {
                Err(ProviderError::RateLimited(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff * attempt;
                    log::debug!(
                        "{} rate limited on '{}' (attempt {}/{}), retrying in {:?}: {}",
                        self.config.chain,
                        action,
                        attempt,
                        self.max_retries,
                        wait,
                        msg
                    );
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    async fn account_call_once(&self, action: &str, address: &str) -> Result<Value, ProviderError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("module", "account"),
            ("action", action),
            ("address", address),
        ];
        if action != "balance" {
            query.push(("sort", "desc"));
        }
        if let Some(key) = self.config.api_key.as_deref() {
            query.push(("apikey", key));
        }

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(format!("HTTP 429 on {}", action)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        parse_envelope(body)
    }
}

/// Unwrap the `{status, message, result}` envelope
fn parse_envelope(body: Value) -> Result<Value, ProviderError> {
    let status = body["status"].as_str().unwrap_or("0");
    let message = body["message"].as_str().unwrap_or_default();
    let result = body.get("result").cloned().unwrap_or(Value::Null);

    if status == "1" {
        return Ok(result);
    }
    if message.starts_with("No transactions found") {
        return Ok(Value::Array(Vec::new()));
    }
    let detail = result.as_str().unwrap_or(message).to_string();
    if detail.to_lowercase().contains("rate limit") {
        return Err(ProviderError::RateLimited(detail));
    }
    Err(ProviderError::InvalidResponse(detail))
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item[key].as_str().map(|s| s.to_string()).filter(|s| !s.is_empty())
}

fn num_field<T: std::str::FromStr>(item: &Value, key: &str) -> Option<T> {
    item[key].as_str().and_then(|s| s.parse().ok())
}

fn parse_normal_tx(item: &Value) -> Option<RawTransaction> {
    Some(RawTransaction {
        hash: str_field(item, "hash")?,
        log_index: None,
        from: str_field(item, "from")?,
        to: str_field(item, "to"),
        value: str_field(item, "value").unwrap_or_else(|| "0".to_string()),
        token: None,
        timestamp: num_field(item, "timeStamp")?,
        pending: false,
        is_error: item["isError"].as_str() == Some("1"),
        receipt_status: num_field(item, "txreceipt_status"),
        error_reason: None,
        method: str_field(item, "functionName"),
        contract_address: str_field(item, "contractAddress"),
        gas_used: num_field(item, "gasUsed"),
        gas_price: num_field(item, "gasPrice"),
        fiat_value: None,
    })
}

fn parse_token_tx(item: &Value, standard: TokenStandard) -> Option<RawTransaction> {
    // without a log index the transfer would collide with its parent transaction
    let Some(log_index) = num_field(item, "logIndex") else {
        log::warn!(
            "Skipping token transfer without logIndex in {}",
            str_field(item, "hash").unwrap_or_default()
        );
        return None;
    };
    let contract = str_field(item, "contractAddress")?;
    let token = RawToken {
        contract: contract.clone(),
        symbol: str_field(item, "tokenSymbol").unwrap_or_else(|| "UNKNOWN".to_string()),
        decimals: num_field(item, "tokenDecimal").unwrap_or(0),
        standard,
        token_id: str_field(item, "tokenID"),
    };
    let value = match standard {
        TokenStandard::Erc20 => str_field(item, "value").unwrap_or_else(|| "0".to_string()),
        TokenStandard::Erc721 => "1".to_string(),
        TokenStandard::Erc1155 => str_field(item, "tokenValue").unwrap_or_else(|| "1".to_string()),
    };
    Some(RawTransaction {
        hash: str_field(item, "hash")?,
        log_index: Some(log_index),
        from: str_field(item, "from")?,
        to: str_field(item, "to"),
        value,
        token: Some(token),
        timestamp: num_field(item, "timeStamp")?,
        pending: false,
        is_error: false,
        receipt_status: Some(1),
        error_reason: None,
        method: str_field(item, "functionName"),
        contract_address: Some(contract),
        gas_used: num_field(item, "gasUsed"),
        gas_price: num_field(item, "gasPrice"),
        fiat_value: None,
    })
}

fn parse_list<F>(result: &Value, parse: F) -> Vec<RawTransaction>
where
    F: Fn(&Value) -> Option<RawTransaction>,
{
    result
        .as_array()
        .map(|items| items.iter().filter_map(|item| parse(item)).collect())
        .unwrap_or_default()
}

#[async_trait]
impl ChainProvider for EtherscanProvider {
    fn chain(&self) -> Chain {
        self.config.chain
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    async fn fetch_activity(&self, address: &str) -> Result<RawActivity, ProviderError> {
        let chain = self.config.chain;

        let normal = self.account_call("txlist", address).await?;
        let erc20 = self.account_call("tokentx", address).await?;
        let nft = self.account_call("tokennfttx", address).await?;
        let balance = self.account_call("balance", address).await?;

        let mut transactions = parse_list(&normal, parse_normal_tx);
        transactions.extend(parse_list(&erc20, |v| parse_token_tx(v, TokenStandard::Erc20)));
        transactions.extend(parse_list(&nft, |v| parse_token_tx(v, TokenStandard::Erc721)));

        let native = balance
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse("balance is not a string".to_string()))?;
        let balances = vec![RawBalance {
            symbol: chain.native_symbol().to_string(),
            decimals: chain.native_decimals(),
            amount: native.to_string(),
            contract: None,
            fiat_value: None,
        }];

        log::debug!(
            "{}: fetched {} transfers for {}",
            chain,
            transactions.len(),
            address
        );

        Ok(RawActivity {
            transactions,
            balances,
            first_seen: None,
            last_seen: None,
        })
    }
}
