//! Event bridge: feeds wallet-side `accountsChanged`/`chainChanged`
//! notifications back into the connection manager.

use std::sync::Arc;

use tracing::debug;

use crate::manager::ConnectionManager;
use crate::ports::{ListenerId, ProviderEventKind, ProviderPort};

/// Scoped subscription pair. Dropping (or explicitly disposing) the bridge
/// removes both registrations, so repeated mounts cannot leak listeners and
/// double-deliver state updates.
pub struct EventBridge<P: ProviderPort> {
    provider: Arc<P>,
    registrations: Option<[(ProviderEventKind, ListenerId); 2]>,
}

impl<P: ProviderPort + Send + Sync + 'static> EventBridge<P> {
    /// Register `accountsChanged -> reconcile_accounts` and
    /// `chainChanged -> reconcile_chain` on the manager's provider.
    pub fn attach(manager: &Arc<ConnectionManager<P>>) -> Self {
        let provider = Arc::clone(manager.provider());

        let for_accounts = Arc::clone(manager);
        let accounts_id = provider.on(
            ProviderEventKind::AccountsChanged,
            Box::new(move |payload| for_accounts.reconcile_accounts_payload(payload)),
        );

        let for_chain = Arc::clone(manager);
        let chain_id = provider.on(
            ProviderEventKind::ChainChanged,
            // The payload carries the new chain id, but reconciliation
            // re-queries the provider anyway; no need to decode it here.
            Box::new(move |_payload| for_chain.reconcile_chain()),
        );

        debug!("event bridge attached");
        Self {
            provider,
            registrations: Some([
                (ProviderEventKind::AccountsChanged, accounts_id),
                (ProviderEventKind::ChainChanged, chain_id),
            ]),
        }
    }
}

impl<P: ProviderPort> EventBridge<P> {
    /// Remove both registrations. Idempotent: a second call is a no-op.
    pub fn dispose(&mut self) {
        if let Some(registrations) = self.registrations.take() {
            for (kind, id) in registrations {
                self.provider.off(kind, id);
            }
            debug!("event bridge disposed");
        }
    }
}

impl<P: ProviderPort> Drop for EventBridge<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}
