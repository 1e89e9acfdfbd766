//! Network enforcer: drive the wallet's active chain to the target chain,
//! registering the chain with the wallet when it is unknown there.

use tracing::{debug, warn};

use crate::domain::ChainDescriptor;
use crate::ports::{ProviderPort, WalletError};

/// Returns true iff the wallet's active chain equals `target.chain_id` on
/// exit. Provider errors are logged and collapsed into `false`; callers
/// treat an off-target chain as a warning, not a failure.
pub fn ensure_target_chain<P: ProviderPort + ?Sized>(
    provider: &P,
    target: &ChainDescriptor,
) -> bool {
    // Already on target: skip the switch entirely so the user never sees
    // a prompt for a no-op.
    match provider.chain_id() {
        Ok(id) if id == target.chain_id => {
            debug!(chain_id = id, "already on target chain");
            return true;
        }
        Ok(id) => {
            debug!(active = id, target_chain = target.chain_id, "switching chain");
        }
        Err(e) => {
            warn!(error = %e, "chain id query failed; attempting switch anyway");
        }
    }

    match switch_chain(provider, target) {
        Ok(()) => true,
        Err(e) if e.is_unrecognized_chain() => add_then_switch(provider, target),
        Err(e) => {
            warn!(error = %e, chain = %target.chain_name, "chain switch failed");
            false
        }
    }
}

fn switch_chain<P: ProviderPort + ?Sized>(
    provider: &P,
    target: &ChainDescriptor,
) -> Result<(), WalletError> {
    provider
        .request("wallet_switchEthereumChain", target.switch_params())
        .map(|_| ())
}

/// Recovery path for error 4902: register the chain, then confirm the
/// active chain. Wallets that do not auto-switch after an add get exactly
/// one more switch attempt.
fn add_then_switch<P: ProviderPort + ?Sized>(provider: &P, target: &ChainDescriptor) -> bool {
    if let Err(e) = provider.request("wallet_addEthereumChain", target.add_params()) {
        warn!(error = %e, chain = %target.chain_name, "chain registration failed");
        return false;
    }

    match provider.chain_id() {
        Ok(id) if id == target.chain_id => true,
        _ => match switch_chain(provider, target) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, chain = %target.chain_name, "switch after add failed");
                false
            }
        },
    }
}
