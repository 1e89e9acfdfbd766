use std::sync::{Arc, Mutex, Once};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

use seipatron_wallet_adapters::{Eip1193Adapter, WalletAdapterConfig};
use seipatron_wallet_core::{ensure_target_chain, registry, ProviderPort, WalletError};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Minimal JSON-RPC endpoint standing in for the browser-side proxy.
/// `respond` maps a method name to either a result, or an error when the
/// returned object carries an `__error` key.
fn spawn_proxy<F>(respond: F) -> String
where
    F: Fn(&str) -> Value + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind proxy server");
    let addr = server.server_addr().to_ip().expect("proxy ip addr");
    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = parsed
                .get("method")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_owned();
            let id = parsed.get("id").cloned().unwrap_or(json!(1));

            let reply = respond(&method);
            let mut envelope = json!({ "jsonrpc": "2.0", "id": id });
            match reply.get("__error") {
                Some(err) => envelope["error"] = err.clone(),
                None => envelope["result"] = reply,
            }

            let response = Response::from_string(envelope.to_string()).with_header(
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("content type header"),
            );
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}")
}

fn proxy_adapter(base_url: String) -> Eip1193Adapter {
    Eip1193Adapter::with_config(WalletAdapterConfig {
        eip1193_proxy_url: Some(base_url),
        ..WalletAdapterConfig::default()
    })
}

#[test]
fn request_accounts_decodes_the_proxied_result() {
    init_tracing();
    let url = spawn_proxy(|method| match method {
        "eth_requestAccounts" => json!(["0x1000000000000000000000000000000000000001"]),
        _ => json!({ "__error": { "code": -32601, "message": "method not found" } }),
    });
    let adapter = proxy_adapter(url);

    assert!(adapter.detect());
    let accounts = adapter.request_accounts().expect("accounts");
    assert_eq!(accounts.len(), 1);
    assert_eq!(
        accounts[0].to_string().to_lowercase(),
        "0x1000000000000000000000000000000000000001"
    );
}

#[test]
fn chain_id_decodes_hex_payloads() {
    init_tracing();
    let url = spawn_proxy(|method| match method {
        "eth_chainId" => json!("0x530"),
        _ => json!({ "__error": { "code": -32601, "message": "method not found" } }),
    });
    let adapter = proxy_adapter(url);

    assert_eq!(adapter.chain_id().expect("chain id"), 1328);
}

#[test]
fn code_4001_maps_to_user_rejected() {
    init_tracing();
    let url = spawn_proxy(|_| json!({ "__error": { "code": 4001, "message": "User rejected the request" } }));
    let adapter = proxy_adapter(url);

    let err = adapter.request_accounts().expect_err("rejected");
    assert!(matches!(err, WalletError::UserRejected));
}

#[test]
fn code_4902_surfaces_as_unrecognized_chain() {
    init_tracing();
    let url = spawn_proxy(|method| match method {
        "wallet_switchEthereumChain" => {
            json!({ "__error": { "code": 4902, "message": "Unrecognized chain ID" } })
        }
        _ => json!({ "__error": { "code": -32601, "message": "method not found" } }),
    });
    let adapter = proxy_adapter(url);

    let err = adapter
        .request("wallet_switchEthereumChain", json!([{ "chainId": "0x530" }]))
        .expect_err("unknown chain");
    assert!(err.is_unrecognized_chain());
}

#[test]
fn enforcer_runs_the_add_then_switch_recovery_over_the_proxy() {
    init_tracing();

    // Wallet on mainnet; first switch fails with 4902, the add registers
    // the chain, and the retried switch lands on target.
    let known_sei = Arc::new(Mutex::new(false));
    let chain = Arc::new(Mutex::new(1u64));
    let known_for_responder = Arc::clone(&known_sei);
    let chain_for_responder = Arc::clone(&chain);

    let url = spawn_proxy(move |method| match method {
        "eth_chainId" => {
            let chain = *chain_for_responder.lock().expect("chain lock");
            json!(format!("0x{chain:x}"))
        }
        "wallet_switchEthereumChain" => {
            if *known_for_responder.lock().expect("known lock") {
                *chain_for_responder.lock().expect("chain lock") = 1328;
                Value::Null
            } else {
                json!({ "__error": { "code": 4902, "message": "Unrecognized chain ID" } })
            }
        }
        "wallet_addEthereumChain" => {
            *known_for_responder.lock().expect("known lock") = true;
            Value::Null
        }
        _ => json!({ "__error": { "code": -32601, "message": "method not found" } }),
    });
    let adapter = proxy_adapter(url);

    assert!(ensure_target_chain(&adapter, &registry::sei_testnet()));
    assert_eq!(adapter.chain_id().expect("chain id"), 1328);
}

#[test]
fn transport_failures_do_not_panic_the_adapter() {
    init_tracing();
    // Nothing listens on this port.
    let adapter = proxy_adapter("http://127.0.0.1:9".to_owned());

    let err = adapter.request_accounts().expect_err("unreachable proxy");
    assert!(matches!(err, WalletError::Transport(_)));
}
