use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct WalletAdapterConfig {
    /// JSON-RPC bridge to a real browser provider for native runs. When
    /// unset, the deterministic in-memory wallet is used outside production.
    pub eip1193_proxy_url: Option<String>,
    pub request_timeout_ms: u64,
    pub wallet_install_url: String,
    /// Open the install page when a connect is attempted with no provider.
    pub auto_open_install_page: bool,
    pub runtime_profile: RuntimeProfile,
}

impl Default for WalletAdapterConfig {
    fn default() -> Self {
        Self {
            eip1193_proxy_url: None,
            request_timeout_ms: 15_000,
            wallet_install_url: "https://metamask.io/download/".to_owned(),
            auto_open_install_page: false,
            runtime_profile: RuntimeProfile::Development,
        }
    }
}

impl WalletAdapterConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("SEIPATRON_EIP1193_PROXY_URL") {
            if !url.is_empty() {
                config.eip1193_proxy_url = Some(url);
            }
        }
        if let Ok(raw) = env::var("SEIPATRON_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = raw.parse() {
                config.request_timeout_ms = ms;
            }
        }
        if let Ok(url) = env::var("SEIPATRON_WALLET_INSTALL_URL") {
            if !url.is_empty() {
                config.wallet_install_url = url;
            }
        }
        if let Ok(raw) = env::var("SEIPATRON_AUTO_OPEN_INSTALL_PAGE") {
            config.auto_open_install_page = raw == "1" || raw.eq_ignore_ascii_case("true");
        }
        if let Ok(raw) = env::var("SEIPATRON_RUNTIME_PROFILE") {
            if raw.eq_ignore_ascii_case("production") {
                config.runtime_profile = RuntimeProfile::Production;
            }
        }
        config
    }

    /// Production refuses the deterministic fallback: no provider runtime
    /// means the adapter starts disabled instead of silently emulating one.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }
}
