use alloy::primitives::Address;
use serde_json::Value;
use thiserror::Error;

/// EIP-1193 user rejected request.
pub const ERROR_USER_REJECTED: i64 = 4001;
/// EIP-3085/3326: the wallet does not know the requested chain.
pub const ERROR_UNRECOGNIZED_CHAIN: i64 = 4902;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no injected wallet provider available")]
    ProviderUnavailable,
    #[error("user rejected the wallet request")]
    UserRejected,
    #[error("wallet rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl WalletError {
    /// Map a wallet-reported error object onto the taxonomy. 4001 is the
    /// one code with a dedicated variant; everything else stays `Rpc`.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        if code == ERROR_USER_REJECTED {
            WalletError::UserRejected
        } else {
            WalletError::Rpc {
                code,
                message: message.into(),
            }
        }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        matches!(
            self,
            WalletError::Rpc {
                code: ERROR_UNRECOGNIZED_CHAIN,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

/// Handle for one listener registration; required for `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type EventCallback = Box<dyn Fn(&Value) + Send + Sync>;

/// Uniform interface over an injected wallet provider. The handle to the
/// underlying provider object is owned by the adapter; callers never see
/// provider-specific request semantics.
pub trait ProviderPort {
    /// True iff an injected wallet is reachable in this runtime.
    fn detect(&self) -> bool;

    /// `eth_requestAccounts` - prompts the user when no grant exists.
    fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// `eth_accounts` - silent, never prompts.
    fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// `eth_chainId`, decoded to the canonical decimal form.
    fn chain_id(&self) -> Result<u64, WalletError>;

    /// Raw request passthrough for methods without a dedicated accessor
    /// (`wallet_switchEthereumChain`, `wallet_addEthereumChain`).
    fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;

    fn on(&self, kind: ProviderEventKind, callback: EventCallback) -> ListenerId;

    fn off(&self, kind: ProviderEventKind, id: ListenerId);
}
