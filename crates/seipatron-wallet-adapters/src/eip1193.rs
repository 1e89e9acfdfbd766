use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, Address};
use serde_json::{json, Value};
use tracing::{debug, warn};

use seipatron_wallet_core::domain::{json_accounts_to_addresses, json_chain_id_to_u64};
use seipatron_wallet_core::{
    EventCallback, ListenerId, ProviderEventKind, ProviderPort, WalletError,
    ERROR_UNRECOGNIZED_CHAIN,
};

use crate::WalletAdapterConfig;

type ListenerTable = Mutex<Vec<(ProviderEventKind, ListenerId, Arc<EventCallback>)>>;

/// `ProviderPort` over an EIP-1193 wallet provider.
///
/// Runtime selection follows the configured profile: a browser runtime talks
/// to `window.ethereum`, a native runtime goes through the JSON-RPC proxy
/// when one is configured, and everything else falls back to a deterministic
/// in-memory wallet emulation (never in production, where a missing runtime
/// disables the adapter instead).
pub struct Eip1193Adapter {
    mode: ProviderMode,
    config: WalletAdapterConfig,
    state: Arc<Mutex<ProviderState>>,
    listeners: Arc<ListenerTable>,
    next_listener: AtomicU64,
    #[cfg(target_arch = "wasm32")]
    hooks: Arc<Mutex<BrowserHooks>>,
}

enum ProviderMode {
    Disabled(String),
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

/// Deterministic wallet emulation plus the cached snapshot for the other
/// runtimes.
#[derive(Debug, Clone)]
struct ProviderState {
    accounts: Vec<Address>,
    granted: bool,
    chain_id: u64,
    known_chains: HashSet<u64>,
    auto_switch_on_add: bool,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: vec![address!("1000000000000000000000000000000000000001")],
            granted: false,
            chain_id: 1,
            known_chains: HashSet::from([1]),
            auto_switch_on_add: true,
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Default)]
struct BrowserHooks {
    accounts_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
    chain_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(WalletAdapterConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: WalletAdapterConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        let mode = if browser_provider().is_ok() {
            ProviderMode::Browser
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 browser provider not found in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(base_url) = config.eip1193_proxy_url.clone() {
            let timeout = std::time::Duration::from_millis(config.request_timeout_ms);
            match reqwest::blocking::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url,
                    client,
                    next_id: AtomicU64::new(1),
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        Self {
            mode,
            config,
            state: Arc::new(Mutex::new(ProviderState::default())),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(1),
            #[cfg(target_arch = "wasm32")]
            hooks: Arc::new(Mutex::new(BrowserHooks::default())),
        }
    }

    fn check_mode(&self) -> Result<(), WalletError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            debug!(reason = %reason, "provider adapter disabled");
            return Err(WalletError::ProviderUnavailable);
        }
        Ok(())
    }

    /// Best-effort UX when no wallet is installed; failure to open the page
    /// never fails the calling operation.
    fn open_install_page(&self) {
        #[cfg(not(target_arch = "wasm32"))]
        if let Err(e) = open::that(&self.config.wallet_install_url) {
            warn!(error = %e, url = %self.config.wallet_install_url, "could not open wallet install page");
        }
        #[cfg(target_arch = "wasm32")]
        if let Some(window) = web_sys::window() {
            let _ = window.open_with_url(&self.config.wallet_install_url);
        }
    }

    // -- deterministic wallet emulation -------------------------------------

    fn deterministic_request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let (result, event) = {
            let mut g = self.state_guard()?;
            match method {
                "eth_accounts" => {
                    let accounts = if g.granted { account_strings(&g.accounts) } else { json!([]) };
                    (accounts, None)
                }
                "eth_requestAccounts" => {
                    g.granted = true;
                    (account_strings(&g.accounts), None)
                }
                "eth_chainId" => (json!(format!("0x{:x}", g.chain_id)), None),
                "wallet_switchEthereumChain" => {
                    let requested = requested_chain_id(&params)?;
                    if !g.known_chains.contains(&requested) {
                        return Err(WalletError::from_rpc(
                            ERROR_UNRECOGNIZED_CHAIN,
                            format!("unrecognized chain 0x{requested:x}"),
                        ));
                    }
                    let changed = g.chain_id != requested;
                    g.chain_id = requested;
                    (Value::Null, changed.then_some(requested))
                }
                "wallet_addEthereumChain" => {
                    let requested = requested_chain_id(&params)?;
                    g.known_chains.insert(requested);
                    let switched = g.auto_switch_on_add && g.chain_id != requested;
                    if switched {
                        g.chain_id = requested;
                    }
                    (Value::Null, switched.then_some(requested))
                }
                other => {
                    return Err(WalletError::Transport(format!(
                        "deterministic wallet does not emulate method {other}"
                    )))
                }
            }
        };

        if let Some(chain_id) = event {
            self.fan_out(
                ProviderEventKind::ChainChanged,
                &json!(format!("0x{chain_id:x}")),
            );
        }
        Ok(result)
    }

    // -- proxy runtime ------------------------------------------------------

    #[cfg(not(target_arch = "wasm32"))]
    fn proxy_call(
        &self,
        runtime: &ProxyRuntime,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletError> {
        let id = runtime.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = runtime
            .client
            .post(&runtime.base_url)
            .json(&payload)
            .send()
            .map_err(|e| WalletError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| WalletError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if !status.is_success() {
            return Err(WalletError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        if let Some(err) = body.get("error") {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(-32000);
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("wallet reported an error")
                .to_owned();
            return Err(WalletError::from_rpc(code, message));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| WalletError::Transport("eip1193 proxy missing result".to_owned()))
    }

    // -- cache + event fan-out ----------------------------------------------

    // The proxy runtime has no push channel, so account/chain changes are
    // detected by diffing replies against the cached snapshot. The
    // deterministic wallet must not go through this path: its state IS the
    // source of truth, and an ungranted empty `eth_accounts` reply would
    // wipe it.
    #[cfg(not(target_arch = "wasm32"))]
    fn sync_proxy_accounts(&self, accounts: &[Address]) -> Result<(), WalletError> {
        if matches!(self.mode, ProviderMode::Proxy(_)) {
            self.sync_accounts(accounts.to_vec())?;
        }
        Ok(())
    }

    #[cfg(target_arch = "wasm32")]
    fn sync_proxy_accounts(&self, _accounts: &[Address]) -> Result<(), WalletError> {
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn sync_proxy_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if matches!(self.mode, ProviderMode::Proxy(_)) {
            self.sync_chain(chain_id)?;
        }
        Ok(())
    }

    #[cfg(target_arch = "wasm32")]
    fn sync_proxy_chain(&self, _chain_id: u64) -> Result<(), WalletError> {
        Ok(())
    }

    fn sync_accounts(&self, accounts: Vec<Address>) -> Result<(), WalletError> {
        let changed = {
            let mut g = self.state_guard()?;
            let changed = g.accounts != accounts;
            if changed {
                g.accounts = accounts.clone();
            }
            changed
        };
        if changed {
            self.fan_out(
                ProviderEventKind::AccountsChanged,
                &account_strings(&accounts),
            );
        }
        Ok(())
    }

    fn sync_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let changed = {
            let mut g = self.state_guard()?;
            let changed = g.chain_id != chain_id;
            if changed {
                g.chain_id = chain_id;
            }
            changed
        };
        if changed {
            self.fan_out(
                ProviderEventKind::ChainChanged,
                &json!(format!("0x{chain_id:x}")),
            );
        }
        Ok(())
    }

    /// Callbacks are invoked with no lock held so they may call back into
    /// the adapter (or unregister themselves) freely.
    fn fan_out(&self, kind: ProviderEventKind, payload: &Value) {
        fan_out_listeners(&self.listeners, kind, payload);
    }

    fn state_guard(&self) -> Result<std::sync::MutexGuard<'_, ProviderState>, WalletError> {
        self.state
            .lock()
            .map_err(|e| WalletError::Transport(format!("provider lock poisoned: {e}")))
    }

    // -- deterministic scripting (tests and native dev) ---------------------

    pub fn debug_set_accounts(&self, accounts: Vec<Address>) {
        if let Ok(mut g) = self.state.lock() {
            g.accounts = accounts;
        }
    }

    pub fn debug_set_auto_switch_on_add(&self, auto: bool) {
        if let Ok(mut g) = self.state.lock() {
            g.auto_switch_on_add = auto;
        }
    }

    /// Simulate the wallet changing accounts behind the application's back.
    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) {
        if let Ok(mut g) = self.state.lock() {
            g.accounts = accounts.clone();
            if accounts.is_empty() {
                g.granted = false;
            }
        }
        self.fan_out(
            ProviderEventKind::AccountsChanged,
            &account_strings(&accounts),
        );
    }

    /// Simulate the wallet switching chains behind the application's back.
    pub fn debug_inject_chain_changed(&self, chain_id: u64) {
        if let Ok(mut g) = self.state.lock() {
            g.chain_id = chain_id;
        }
        self.fan_out(
            ProviderEventKind::ChainChanged,
            &json!(format!("0x{chain_id:x}")),
        );
    }
}

impl ProviderPort for Eip1193Adapter {
    fn detect(&self) -> bool {
        match &self.mode {
            ProviderMode::Disabled(_) => false,
            ProviderMode::Deterministic => true,
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(_) => true,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => browser_provider().is_ok(),
        }
    }

    fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        if !self.detect() {
            if self.config.auto_open_install_page {
                self.open_install_page();
            }
            return Err(WalletError::ProviderUnavailable);
        }

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.refresh_browser_snapshot()?;
            let g = self.state_guard()?;
            if g.accounts.is_empty() {
                return Err(WalletError::Validation(
                    "no provider accounts available; connect the wallet first".to_owned(),
                ));
            }
            return Ok(g.accounts.clone());
        }

        let value = self.request("eth_requestAccounts", json!([]))?;
        let accounts = json_accounts_to_addresses(&value)?;
        self.sync_proxy_accounts(&accounts)?;
        Ok(accounts)
    }

    fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.refresh_browser_snapshot()?;
            return Ok(self.state_guard()?.accounts.clone());
        }

        let value = self.request("eth_accounts", json!([]))?;
        let accounts = json_accounts_to_addresses(&value)?;
        self.sync_proxy_accounts(&accounts)?;
        Ok(accounts)
    }

    fn chain_id(&self) -> Result<u64, WalletError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.refresh_browser_snapshot()?;
            return Ok(self.state_guard()?.chain_id);
        }

        let value = self.request("eth_chainId", json!([]))?;
        let chain_id = json_chain_id_to_u64(&value)?;
        self.sync_proxy_chain(chain_id)?;
        Ok(chain_id)
    }

    fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.check_mode()?;
        match &self.mode {
            ProviderMode::Disabled(_) => Err(WalletError::ProviderUnavailable),
            ProviderMode::Deterministic => self.deterministic_request(method, params),
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(runtime) => self.proxy_call(runtime, method, params),
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => Err(WalletError::Transport(
                "synchronous request is unavailable in the browser runtime; use request_async"
                    .to_owned(),
            )),
        }
    }

    fn on(&self, kind: ProviderEventKind, callback: EventCallback) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((kind, id, Arc::new(callback)));
        }
        id
    }

    fn off(&self, kind: ProviderEventKind, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(k, l, _)| !(*k == kind && *l == id));
        }
    }
}

fn fan_out_listeners(listeners: &ListenerTable, kind: ProviderEventKind, payload: &Value) {
    let callbacks: Vec<Arc<EventCallback>> = match listeners.lock() {
        Ok(table) => table
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect(),
        Err(_) => return,
    };
    for cb in callbacks {
        cb(payload);
    }
}

fn account_strings(accounts: &[Address]) -> Value {
    json!(accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>())
}

fn requested_chain_id(params: &Value) -> Result<u64, WalletError> {
    let raw = params
        .get(0)
        .and_then(|p| p.get("chainId"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| WalletError::Validation("missing chainId param".to_owned()))?;
    seipatron_wallet_core::domain::parse_chain_id_str(raw)
}

// -- browser runtime (wasm32) ----------------------------------------------

#[cfg(target_arch = "wasm32")]
impl Eip1193Adapter {
    /// Promise-backed request against `window.ethereum` for flows that need
    /// a real prompt (account grant, chain switch).
    pub async fn request_async(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        use wasm_bindgen::JsCast;

        self.check_mode()?;
        let provider = browser_provider()?;
        let request_fn = get_prop(&provider, "request")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| {
                WalletError::Transport("window.ethereum.request is unavailable".to_owned())
            })?;

        let request = json!({ "method": method, "params": params });
        let request_js = serde_wasm_bindgen::to_value(&request)
            .map_err(|e| WalletError::Transport(format!("failed to encode request: {e}")))?;
        let promise_js = request_fn.call1(&provider, &request_js).map_err(|e| {
            WalletError::Transport(format!("provider request dispatch failed: {e:?}"))
        })?;
        let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
            WalletError::Transport("provider request did not return Promise".to_owned())
        })?;
        let result_js = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| WalletError::Transport(format!("provider request rejected: {e:?}")))?;
        serde_wasm_bindgen::from_value(result_js)
            .map_err(|e| WalletError::Transport(format!("failed to decode response: {e}")))
    }

    pub async fn request_accounts_async(&self) -> Result<Vec<Address>, WalletError> {
        let value = self.request_async("eth_requestAccounts", json!([])).await?;
        let accounts = json_accounts_to_addresses(&value)?;
        self.sync_accounts(accounts.clone())?;
        Ok(accounts)
    }

    fn refresh_browser_snapshot(&self) -> Result<(), WalletError> {
        use wasm_bindgen::JsValue;

        let provider = browser_provider()?;
        let selected = get_prop(&provider, "selectedAddress").unwrap_or(JsValue::NULL);
        let chain = get_prop(&provider, "chainId").unwrap_or(JsValue::NULL);

        if let Some(raw) = selected.as_string() {
            let parsed: Address = raw
                .parse()
                .map_err(|e| WalletError::Validation(format!("invalid selectedAddress: {e}")))?;
            self.sync_accounts(vec![parsed])?;
        }
        if let Some(raw) = chain.as_string() {
            let parsed = seipatron_wallet_core::domain::parse_chain_id_str(&raw)?;
            self.sync_chain(parsed)?;
        }
        Ok(())
    }

    /// Register `accountsChanged`/`chainChanged` hooks on the injected
    /// provider, forwarding into the adapter's listener table. Idempotent.
    pub fn register_browser_hooks(&self) -> Result<(), WalletError> {
        use wasm_bindgen::{closure::Closure, JsCast, JsValue};

        let provider = browser_provider()?;
        let on_fn = get_prop(&provider, "on")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| {
                WalletError::Transport("provider does not expose on(event, cb)".to_owned())
            })?;

        let mut hooks = self
            .hooks
            .lock()
            .map_err(|e| WalletError::Transport(format!("provider hooks lock poisoned: {e}")))?;
        if hooks.accounts_changed.is_some() && hooks.chain_changed.is_some() {
            return Ok(());
        }

        let listeners_for_accounts = Arc::clone(&self.listeners);
        let state_for_accounts = Arc::clone(&self.state);
        let accounts_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let mut account_strings = Vec::new();
            if js_sys::Array::is_array(&value) {
                for item in js_sys::Array::from(&value).iter() {
                    if let Some(raw) = item.as_string() {
                        account_strings.push(raw);
                    }
                }
            }
            if let Ok(mut g) = state_for_accounts.lock() {
                g.accounts = account_strings
                    .iter()
                    .filter_map(|raw| raw.parse().ok())
                    .collect();
            }
            fan_out_listeners(
                &listeners_for_accounts,
                ProviderEventKind::AccountsChanged,
                &json!(account_strings),
            );
        });

        let listeners_for_chain = Arc::clone(&self.listeners);
        let state_for_chain = Arc::clone(&self.state);
        let chain_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Some(raw) = value.as_string() {
                if let Ok(chain_id) = seipatron_wallet_core::domain::parse_chain_id_str(&raw) {
                    if let Ok(mut g) = state_for_chain.lock() {
                        g.chain_id = chain_id;
                    }
                    fan_out_listeners(
                        &listeners_for_chain,
                        ProviderEventKind::ChainChanged,
                        &json!(raw),
                    );
                }
            }
        });

        on_fn
            .call2(
                &provider,
                &JsValue::from_str("accountsChanged"),
                accounts_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| {
                WalletError::Transport(format!("register accountsChanged failed: {e:?}"))
            })?;
        on_fn
            .call2(
                &provider,
                &JsValue::from_str("chainChanged"),
                chain_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| WalletError::Transport(format!("register chainChanged failed: {e:?}")))?;

        hooks.accounts_changed = Some(accounts_cb);
        hooks.chain_changed = Some(chain_cb);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, WalletError> {
    let window =
        web_sys::window().ok_or_else(|| WalletError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(WalletError::ProviderUnavailable);
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
fn get_prop(
    target: &wasm_bindgen::JsValue,
    key: &str,
) -> Result<wasm_bindgen::JsValue, WalletError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key)).map_err(|e| {
        WalletError::Transport(format!("read provider property {key} failed: {e:?}"))
    })
}
