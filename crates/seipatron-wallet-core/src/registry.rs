//! Network registry: the chains this application knows how to enforce.

use crate::domain::{ChainDescriptor, NativeCurrency};

/// Sei EVM testnet (atlantic-2), decimal form of `0x530`.
pub const SEI_TESTNET_CHAIN_ID: u64 = 1328;

pub fn sei_testnet() -> ChainDescriptor {
    ChainDescriptor {
        chain_id: SEI_TESTNET_CHAIN_ID,
        chain_name: "Sei Testnet".to_owned(),
        native_currency: NativeCurrency {
            name: "SEI".to_owned(),
            symbol: "SEI".to_owned(),
            decimals: 18,
        },
        rpc_urls: vec!["https://evm-rpc-testnet.sei-apis.com".to_owned()],
        block_explorer_urls: vec!["https://testnet.seistream.app".to_owned()],
    }
}

pub fn by_chain_id(chain_id: u64) -> Option<ChainDescriptor> {
    match chain_id {
        SEI_TESTNET_CHAIN_ID => Some(sei_testnet()),
        _ => None,
    }
}
