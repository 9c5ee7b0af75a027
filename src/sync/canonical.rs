//! Canonicalization of provider data into ledger records

use crate::chain::{Chain, RawActivity, RawBalance, RawTransaction, TokenStandard};
use crate::state::{Balance, Transaction, TransactionMetadata, TransactionStatus, TransactionType};
use std::collections::HashSet;

/// Addresses controlled by the active wallet, compared case-insensitively
#[derive(Debug, Clone, Default)]
pub struct OwnedAddresses(HashSet<String>);

impl OwnedAddresses {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            addresses
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(&address.trim().to_lowercase())
    }
}

pub struct Canonicalizer<'a> {
    chain: Chain,
    owned: &'a OwnedAddresses,
}

impl<'a> Canonicalizer<'a> {
    pub fn new(chain: Chain, owned: &'a OwnedAddresses) -> Self {
        Self { chain, owned }
    }

    pub fn transactions(&self, activity: &RawActivity) -> Vec<Transaction> {
        activity
            .transactions
            .iter()
            .filter_map(|raw| self.transaction(raw))
            .collect()
    }

    pub fn balances(&self, activity: &RawActivity) -> Vec<Balance> {
        activity.balances.iter().map(|raw| self.balance(raw)).collect()
    }

    /// Convert one provider record; records without a usable timestamp are dropped
    pub fn transaction(&self, raw: &RawTransaction) -> Option<Transaction> {
        let timestamp = match raw.time() {
            Some(ts) => ts,
            None => {
                log::debug!("{}: dropping {} with invalid timestamp", self.chain, raw.hash);
                return None;
            }
        };

        let recipient = raw
            .to
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .map(str::to_string);
        let from_owned = self.owned.contains(&raw.from);
        let to_owned = recipient.as_deref().map_or(false, |to| self.owned.contains(to));

        let status = status_of(raw);
        let tx_type = self.type_of(raw, status, recipient.is_none(), from_owned, to_owned);

        let (symbol, decimals) = match &raw.token {
            Some(token) => (token.symbol.clone(), token.decimals),
            None => (
                self.chain.native_symbol().to_string(),
                self.chain.native_decimals(),
            ),
        };
        let amount = format_units(&raw.value, decimals);

        let token_id = raw.token.as_ref().map(|token| match &token.token_id {
            Some(id) => format!("{}:{}", token.contract.to_lowercase(), id),
            None => token.contract.to_lowercase(),
        });

        // the sender pays gas
        let gas_fee = if from_owned {
            match (raw.gas_used, raw.gas_price) {
                (Some(used), Some(price)) => used
                    .checked_mul(price)
                    .map(|wei| format_units(&wei.to_string(), self.chain.native_decimals())),
                _ => None,
            }
        } else {
            None
        };

        let error_reason = if status.is_failure() {
            Some(raw.error_reason.clone().unwrap_or_else(|| match status {
                TransactionStatus::Reverted => "execution reverted".to_string(),
                _ => "transaction failed".to_string(),
            }))
        } else {
            None
        };

        let description = describe(tx_type, &amount, &symbol);
        let mut metadata = TransactionMetadata {
            symbol,
            decimals,
            description,
            ..Default::default()
        };
        if let Some(method) = raw.method.as_deref().filter(|m| !m.is_empty()) {
            metadata.extra.insert("method".to_string(), method.to_string());
        }
        metadata.extra.insert("hash".to_string(), raw.hash.clone());

        Some(Transaction {
            id: Transaction::make_id(self.chain, &raw.hash, raw.log_index),
            chain: self.chain,
            tx_type,
            amount,
            value: raw.fiat_value,
            token_id,
            timestamp,
            status,
            sender: raw.from.clone(),
            recipient,
            is_internal: from_owned && to_owned,
            gas_fee,
            error_reason,
            metadata,
        })
    }

    fn type_of(
        &self,
        raw: &RawTransaction,
        status: TransactionStatus,
        creates_contract: bool,
        from_owned: bool,
        to_owned: bool,
    ) -> TransactionType {
        if status.is_failure() {
            return TransactionType::Failed;
        }
        if creates_contract && raw.contract_address.is_some() && raw.token.is_none() {
            return TransactionType::ContractDeployment;
        }
        if let Some(token) = &raw.token {
            if matches!(token.standard, TokenStandard::Erc721 | TokenStandard::Erc1155) {
                return TransactionType::Nft;
            }
        }
        if let Some(kind) = raw.method.as_deref().and_then(method_type) {
            return kind;
        }
        let moves_value = raw.token.is_some() || !is_zero(&raw.value);
        match (from_owned, to_owned) {
            (true, _) if !moves_value && raw.method.is_some() => TransactionType::Gas,
            (true, _) => TransactionType::Send,
            (false, true) => TransactionType::Receive,
            // touched the wallet only through a contract
            (false, false) => TransactionType::Defi,
        }
    }

    fn balance(&self, raw: &RawBalance) -> Balance {
        Balance {
            chain: self.chain,
            symbol: raw.symbol.clone(),
            contract: raw.contract.as_ref().map(|c| c.to_lowercase()),
            amount: format_units(&raw.amount, raw.decimals),
            decimals: raw.decimals,
            value: raw.fiat_value,
        }
    }
}

fn status_of(raw: &RawTransaction) -> TransactionStatus {
    if raw.pending {
        TransactionStatus::Pending
    } else if raw.receipt_status == Some(0) {
        TransactionStatus::Reverted
    } else if raw.is_error {
        TransactionStatus::Failed
    } else {
        TransactionStatus::Completed
    }
}

/// Classify by decoded method name
fn method_type(method: &str) -> Option<TransactionType> {
    let name = method
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if name.is_empty() || name == "transfer" || name == "transferfrom" {
        return None;
    }
    if name.starts_with("approve") || name == "setapprovalforall" || name == "increaseallowance" {
        return Some(TransactionType::Approve);
    }
    if name.contains("swap") || name == "multicall" || name == "execute" {
        return Some(TransactionType::Swap);
    }
    if name.contains("stake") || name.contains("delegate") {
        return Some(TransactionType::Stake);
    }
    const DEFI: [&str; 8] = [
        "deposit", "withdraw", "borrow", "repay", "supply", "liquidity", "claim", "redeem",
    ];
    if DEFI.iter().any(|k| name.contains(k)) {
        return Some(TransactionType::Defi);
    }
    None
}

fn describe(tx_type: TransactionType, amount: &str, symbol: &str) -> String {
    match tx_type {
        TransactionType::Send => format!("Sent {} {}", amount, symbol),
        TransactionType::Receive => format!("Received {} {}", amount, symbol),
        TransactionType::Swap => format!("Swapped {} {}", amount, symbol),
        TransactionType::Stake => format!("Staked {} {}", amount, symbol),
        TransactionType::Defi => format!("DeFi interaction ({} {})", amount, symbol),
        TransactionType::Nft => format!("NFT transfer ({})", symbol),
        TransactionType::Approve => format!("Approved {}", symbol),
        TransactionType::ContractDeployment => "Deployed a contract".to_string(),
        TransactionType::Failed => "Failed transaction".to_string(),
        TransactionType::Gas => format!("Network fee ({})", symbol),
    }
}

fn is_zero(value: &str) -> bool {
    value.trim().trim_start_matches('0').is_empty()
}

/// Render a base-unit integer string with `decimals` fractional digits
///
/// Non-numeric input renders as "0".
pub fn format_units(value: &str, decimals: u8) -> String {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return "0".to_string();
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return "0".to_string();
    }

    let decimals = decimals as usize;
    let (whole, frac) = if digits.len() > decimals {
        digits.split_at(digits.len() - decimals)
    } else {
        ("", digits)
    };
    let whole = if whole.is_empty() { "0" } else { whole };
    let frac = format!("{:0>width$}", frac, width = decimals);
    let frac = frac.trim_end_matches('0');

    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RawToken;

    const ME: &str = "0xAbCd000000000000000000000000000000001234";
    const OTHER: &str = "0x9999000000000000000000000000000000000001";

    fn raw(from: &str, to: Option<&str>, value: &str) -> RawTransaction {
        RawTransaction {
            hash: "0xHASH".to_string(),
            log_index: None,
            from: from.to_string(),
            to: to.map(|t| t.to_string()),
            value: value.to_string(),
            token: None,
            timestamp: 1_700_000_000,
            pending: false,
            is_error: false,
            receipt_status: Some(1),
            error_reason: None,
            method: None,
            contract_address: None,
            gas_used: Some(21_000),
            gas_price: Some(2_000_000_000),
            fiat_value: Some(12.5),
        }
    }

    fn owned() -> OwnedAddresses {
        OwnedAddresses::new([ME.to_lowercase()])
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units("1500000000000000000", 18), "1.5");
        assert_eq!(format_units("1", 18), "0.000000000000000001");
        assert_eq!(format_units("2500000", 6), "2.5");
        assert_eq!(format_units("0000", 6), "0");
        assert_eq!(format_units("42", 0), "42");
        assert_eq!(format_units("12x", 2), "0");
    }

    #[test]
    fn test_send_and_receive() {
        let owned = owned();
        let c = Canonicalizer::new(Chain::Ethereum, &owned);

        let send = c.transaction(&raw(ME, Some(OTHER), "1000000000000000000")).unwrap();
        assert_eq!(send.tx_type, TransactionType::Send);
        assert_eq!(send.amount, "1");
        assert_eq!(send.gas_fee.as_deref(), Some("0.000042"));
        assert_eq!(send.metadata.symbol, "ETH");
        assert!(!send.is_internal);
        assert_eq!(send.id, "eth:0xhash:-");

        let receive = c.transaction(&raw(OTHER, Some(ME), "5")).unwrap();
        assert_eq!(receive.tx_type, TransactionType::Receive);
        assert_eq!(receive.gas_fee, None);
    }

    #[test]
    fn test_internal_transfer() {
        let owned = owned();
        let c = Canonicalizer::new(Chain::Polygon, &owned);
        let tx = c.transaction(&raw(ME, Some(&ME.to_uppercase().replace("0X", "0x")), "1")).unwrap();
        assert!(tx.is_internal);
        assert_eq!(tx.metadata.symbol, "POL");
    }

    #[test]
    fn test_failed_and_reverted() {
        let owned = owned();
        let c = Canonicalizer::new(Chain::Ethereum, &owned);

        let mut reverted = raw(ME, Some(OTHER), "1");
        reverted.is_error = true;
        reverted.receipt_status = Some(0);
        let tx = c.transaction(&reverted).unwrap();
        assert_eq!(tx.status, TransactionStatus::Reverted);
        assert_eq!(tx.tx_type, TransactionType::Failed);
        assert_eq!(tx.error_reason.as_deref(), Some("execution reverted"));

        let mut failed = raw(ME, Some(OTHER), "1");
        failed.is_error = true;
        failed.receipt_status = None;
        failed.error_reason = Some("out of gas".to_string());
        let tx = c.transaction(&failed).unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.error_reason.as_deref(), Some("out of gas"));

        let ok = c.transaction(&raw(ME, Some(OTHER), "1")).unwrap();
        assert_eq!(ok.error_reason, None);
    }

    #[test]
    fn test_method_and_token_types() {
        let owned = owned();
        let c = Canonicalizer::new(Chain::Ethereum, &owned);

        let mut approve = raw(ME, Some(OTHER), "0");
        approve.method = Some("approve(address spender, uint256 amount)".to_string());
        assert_eq!(c.transaction(&approve).unwrap().tx_type, TransactionType::Approve);

        let mut swap = raw(ME, Some(OTHER), "100");
        swap.method = Some("swapExactETHForTokens(uint256,address[],address,uint256)".to_string());
        assert_eq!(c.transaction(&swap).unwrap().tx_type, TransactionType::Swap);

        let mut stake = raw(ME, Some(OTHER), "100");
        stake.method = Some("stake(uint256)".to_string());
        assert_eq!(c.transaction(&stake).unwrap().tx_type, TransactionType::Stake);

        let mut deploy = raw(ME, None, "0");
        deploy.contract_address = Some("0xc0ffee".to_string());
        assert_eq!(c.transaction(&deploy).unwrap().tx_type, TransactionType::ContractDeployment);

        let mut fee_only = raw(ME, Some(OTHER), "0");
        fee_only.method = Some("mint(uint256)".to_string());
        assert_eq!(c.transaction(&fee_only).unwrap().tx_type, TransactionType::Gas);

        let mut nft = raw(OTHER, Some(ME), "1");
        nft.log_index = Some(3);
        nft.token = Some(RawToken {
            contract: "0xNFT".to_string(),
            symbol: "PUNK".to_string(),
            decimals: 0,
            standard: TokenStandard::Erc721,
            token_id: Some("42".to_string()),
        });
        let tx = c.transaction(&nft).unwrap();
        assert_eq!(tx.tx_type, TransactionType::Nft);
        assert_eq!(tx.token_id.as_deref(), Some("0xnft:42"));
        assert_eq!(tx.id, "eth:0xhash:3");
    }

    #[test]
    fn test_balances() {
        let owned = owned();
        let c = Canonicalizer::new(Chain::Bsc, &owned);
        let activity = RawActivity {
            balances: vec![RawBalance {
                symbol: "BNB".to_string(),
                decimals: 18,
                amount: "250000000000000000".to_string(),
                contract: None,
                fiat_value: None,
            }],
            ..Default::default()
        };
        let balances = c.balances(&activity);
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].amount, "0.25");
        assert_eq!(balances[0].chain, Chain::Bsc);
    }
}
