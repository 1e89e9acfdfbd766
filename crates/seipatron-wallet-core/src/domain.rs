use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ports::WalletError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Static description of an EVM chain as wallets expect it in
/// `wallet_addEthereumChain`. The decimal `chain_id` is the canonical form
/// used for every comparison; the hex form exists only for wallet RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// Params for `wallet_switchEthereumChain`.
    pub fn switch_params(&self) -> Value {
        json!([{ "chainId": self.chain_id_hex() }])
    }

    /// Params for `wallet_addEthereumChain`.
    pub fn add_params(&self) -> Value {
        json!([{
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        }])
    }
}

/// The single published snapshot of wallet connectivity. Updated as a whole,
/// never field by field, so readers observe consistent states only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub connecting: bool,
    pub connected: bool,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn begin_connecting() -> Self {
        Self {
            connecting: true,
            ..Self::default()
        }
    }

    pub fn connected(address: Address, chain_id: Option<u64>) -> Self {
        Self {
            address: Some(address),
            chain_id,
            connecting: false,
            connected: true,
        }
    }
}

/// Wallets report the chain id either as a 0x-hex string (`chainChanged`,
/// `eth_chainId`) or as a plain decimal; accept both.
pub fn parse_chain_id_str(raw: &str) -> Result<u64, WalletError> {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        u64::from_str_radix(raw.trim_start_matches("0x").trim_start_matches("0X"), 16)
            .map_err(|e| WalletError::Validation(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| WalletError::Validation(format!("invalid chain id: {e}")))
    }
}

pub fn json_chain_id_to_u64(value: &Value) -> Result<u64, WalletError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| WalletError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

pub fn json_accounts_to_addresses(value: &Value) -> Result<Vec<Address>, WalletError> {
    let arr = value
        .as_array()
        .ok_or_else(|| WalletError::Validation("accounts payload must be array".to_owned()))?;
    let mut accounts = Vec::with_capacity(arr.len());
    for item in arr {
        let raw = item
            .as_str()
            .ok_or_else(|| WalletError::Validation("account entry must be string".to_owned()))?;
        let parsed: Address = raw
            .parse()
            .map_err(|e| WalletError::Validation(format!("invalid account address: {e}")))?;
        accounts.push(parsed);
    }
    Ok(accounts)
}

/// `0x1234...abcd` form for log lines and UI labels.
pub fn shorten_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
