#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use serde_json::{json, Value};

use seipatron_wallet_core::{
    ChainDescriptor, ConnectionManager, EventCallback, ListenerId, ProviderEventKind, ProviderPort,
    WalletError, ERROR_UNRECOGNIZED_CHAIN,
};

pub fn account_a() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid account a")
}

pub fn account_b() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid account b")
}

pub fn target_chain() -> ChainDescriptor {
    seipatron_wallet_core::registry::sei_testnet()
}

pub const TARGET_CHAIN_ID: u64 = seipatron_wallet_core::registry::SEI_TESTNET_CHAIN_ID;

struct MockWallet {
    detected: bool,
    granted: bool,
    accounts: Vec<Address>,
    chain_id: u64,
    known_chains: Vec<u64>,
    auto_switch_on_add: bool,
    reject_next_request_accounts: bool,
    switch_failure_code: Option<i64>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self {
            detected: true,
            granted: false,
            accounts: vec![account_a()],
            chain_id: TARGET_CHAIN_ID,
            known_chains: vec![TARGET_CHAIN_ID],
            auto_switch_on_add: true,
            reject_next_request_accounts: false,
            switch_failure_code: None,
        }
    }
}

/// Scripted in-memory wallet emulation implementing `ProviderPort`.
/// Records every RPC method it receives so tests can assert how many
/// prompts a flow would have shown.
#[derive(Default)]
pub struct MockProvider {
    wallet: Mutex<MockWallet>,
    listeners: Mutex<Vec<(ProviderEventKind, ListenerId, Arc<EventCallback>)>>,
    next_listener: AtomicU64,
    calls: Mutex<Vec<String>>,
    request_accounts_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl MockProvider {
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    pub fn set_detected(&self, detected: bool) {
        self.wallet.lock().expect("wallet lock").detected = detected;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.wallet.lock().expect("wallet lock").accounts = accounts;
    }

    pub fn grant(&self) {
        self.wallet.lock().expect("wallet lock").granted = true;
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.wallet.lock().expect("wallet lock").chain_id = chain_id;
    }

    pub fn set_known_chains(&self, chains: Vec<u64>) {
        self.wallet.lock().expect("wallet lock").known_chains = chains;
    }

    pub fn set_auto_switch_on_add(&self, auto: bool) {
        self.wallet.lock().expect("wallet lock").auto_switch_on_add = auto;
    }

    pub fn reject_next_request_accounts(&self) {
        self.wallet
            .lock()
            .expect("wallet lock")
            .reject_next_request_accounts = true;
    }

    pub fn fail_switch_with(&self, code: Option<i64>) {
        self.wallet.lock().expect("wallet lock").switch_failure_code = code;
    }

    /// Invoked from inside `request_accounts`, i.e. while the user prompt
    /// would be open. Used to exercise re-entrant calls into the manager.
    pub fn set_request_accounts_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
        *self.request_accounts_hook.lock().expect("hook lock") = Some(hook);
    }

    /// Wallet-side account change, as the injected provider would report it.
    pub fn emit_accounts_changed(&self, accounts: Vec<Address>) {
        {
            let mut wallet = self.wallet.lock().expect("wallet lock");
            wallet.accounts = accounts.clone();
            if accounts.is_empty() {
                wallet.granted = false;
            }
        }
        let payload = json!(accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>());
        self.emit(ProviderEventKind::AccountsChanged, &payload);
    }

    /// Wallet-side chain change with the hex payload real providers send.
    pub fn emit_chain_changed(&self, chain_id: u64) {
        self.wallet.lock().expect("wallet lock").chain_id = chain_id;
        let payload = json!(format!("0x{chain_id:x}"));
        self.emit(ProviderEventKind::ChainChanged, &payload);
    }

    fn emit(&self, kind: ProviderEventKind, payload: &Value) {
        // Clone the callbacks out so listeners can call back into the
        // provider (or unregister) without deadlocking.
        let callbacks: Vec<Arc<EventCallback>> = self
            .listeners
            .lock()
            .expect("listeners lock")
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(payload);
        }
    }

    fn record(&self, method: &str) {
        self.calls.lock().expect("calls lock").push(method.to_owned());
    }
}

impl ProviderPort for MockProvider {
    fn detect(&self) -> bool {
        self.wallet.lock().expect("wallet lock").detected
    }

    fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.record("eth_requestAccounts");

        // Run the hook outside the hook lock; re-entrant manager calls may
        // land back here.
        let hook = self.request_accounts_hook.lock().expect("hook lock").take();
        if let Some(hook) = hook {
            hook();
            *self.request_accounts_hook.lock().expect("hook lock") = Some(hook);
        }

        let mut wallet = self.wallet.lock().expect("wallet lock");
        if !wallet.detected {
            return Err(WalletError::ProviderUnavailable);
        }
        if wallet.reject_next_request_accounts {
            wallet.reject_next_request_accounts = false;
            return Err(WalletError::UserRejected);
        }
        wallet.granted = true;
        Ok(wallet.accounts.clone())
    }

    fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.record("eth_accounts");
        let wallet = self.wallet.lock().expect("wallet lock");
        if !wallet.detected {
            return Err(WalletError::ProviderUnavailable);
        }
        if wallet.granted {
            Ok(wallet.accounts.clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn chain_id(&self) -> Result<u64, WalletError> {
        self.record("eth_chainId");
        Ok(self.wallet.lock().expect("wallet lock").chain_id)
    }

    fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.record(method);
        match method {
            "wallet_switchEthereumChain" => {
                let requested = requested_chain_id(&params)?;
                let mut wallet = self.wallet.lock().expect("wallet lock");
                if let Some(code) = wallet.switch_failure_code {
                    return Err(WalletError::from_rpc(code, "scripted switch failure"));
                }
                if !wallet.known_chains.contains(&requested) {
                    return Err(WalletError::from_rpc(
                        ERROR_UNRECOGNIZED_CHAIN,
                        "unrecognized chain",
                    ));
                }
                wallet.chain_id = requested;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let requested = requested_chain_id(&params)?;
                let mut wallet = self.wallet.lock().expect("wallet lock");
                wallet.known_chains.push(requested);
                if wallet.auto_switch_on_add {
                    wallet.chain_id = requested;
                }
                Ok(Value::Null)
            }
            other => Err(WalletError::Transport(format!(
                "mock provider does not script method {other}"
            ))),
        }
    }

    fn on(&self, kind: ProviderEventKind, callback: EventCallback) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .expect("listeners lock")
            .push((kind, id, Arc::new(callback)));
        id
    }

    fn off(&self, kind: ProviderEventKind, id: ListenerId) {
        self.listeners
            .lock()
            .expect("listeners lock")
            .retain(|(k, l, _)| !(*k == kind && *l == id));
    }
}

fn requested_chain_id(params: &Value) -> Result<u64, WalletError> {
    let raw = params
        .get(0)
        .and_then(|p| p.get("chainId"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| WalletError::Validation("missing chainId param".to_owned()))?;
    seipatron_wallet_core::domain::parse_chain_id_str(raw)
}

pub fn new_manager() -> (Arc<MockProvider>, Arc<ConnectionManager<MockProvider>>) {
    let provider = Arc::new(MockProvider::default());
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&provider),
        target_chain(),
    ));
    (provider, manager)
}
