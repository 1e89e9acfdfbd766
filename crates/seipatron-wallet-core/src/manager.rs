use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{shorten_address, ChainDescriptor, ConnectionState};
use crate::enforcer::ensure_target_chain;
use crate::ports::{ProviderPort, WalletError};
use crate::state_machine::{connection_transition, ConnectionAction, ConnectionPhase};

/// Single source of truth for "am I connected, as whom, on which chain".
///
/// Owned by the application root and handed down explicitly; UI layers read
/// the snapshot and call `connect`/`disconnect`, nothing else mutates it.
/// The wallet-side `accountsChanged`/`chainChanged` notifications arrive via
/// the event bridge as `reconcile_accounts`/`reconcile_chain`.
pub struct ConnectionManager<P: ProviderPort> {
    provider: Arc<P>,
    target: ChainDescriptor,
    state: Mutex<ConnectionState>,
}

impl<P: ProviderPort> ConnectionManager<P> {
    pub fn new(provider: Arc<P>, target: ChainDescriptor) -> Self {
        Self {
            provider,
            target,
            state: Mutex::new(ConnectionState::disconnected()),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn target(&self) -> &ChainDescriptor {
        &self.target
    }

    /// Current snapshot; always internally consistent because writes replace
    /// the whole struct under the lock.
    pub fn state(&self) -> ConnectionState {
        *self.state_guard()
    }

    pub fn phase(&self) -> ConnectionPhase {
        phase_of(&self.state_guard())
    }

    /// Request account access, enforce the target chain, publish the result.
    ///
    /// Calls while a connect is already in flight (or while already
    /// connected) are no-ops returning the current snapshot, so the user is
    /// never shown a duplicate wallet prompt. Enforcement failure does not
    /// block the connection; the published snapshot then carries the
    /// off-target chain id and the UI is expected to warn.
    pub fn connect(&self) -> Result<ConnectionState, WalletError> {
        {
            let mut state = self.state_guard();
            match phase_of(&state) {
                ConnectionPhase::Connecting | ConnectionPhase::Connected => return Ok(*state),
                ConnectionPhase::Disconnected => {
                    let (_, transition) = connection_transition(
                        ConnectionPhase::Disconnected,
                        ConnectionAction::BeginConnect,
                    )?;
                    debug!(from = ?transition.from, to = ?transition.to, reason = transition.reason, "connection transition");
                    *state = ConnectionState::begin_connecting();
                }
            }
        }

        // The lock is not held across provider calls: wallet callbacks may
        // re-enter the manager while a prompt is open.
        let outcome = self.drive_connect();

        let mut state = self.state_guard();
        match outcome {
            Ok(next) => {
                *state = next;
                Ok(*state)
            }
            Err(e) => {
                *state = ConnectionState::disconnected();
                Err(e)
            }
        }
    }

    fn drive_connect(&self) -> Result<ConnectionState, WalletError> {
        if !self.provider.detect() {
            return Err(WalletError::ProviderUnavailable);
        }

        let accounts = self.provider.request_accounts()?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| WalletError::Validation("provider returned no accounts".to_owned()))?;

        if !ensure_target_chain(self.provider.as_ref(), &self.target) {
            warn!(
                target_chain = self.target.chain_id,
                "connected off the target chain"
            );
        }
        let chain_id = self.provider.chain_id().ok();

        info!(address = %shorten_address(&address), chain_id, "wallet connected");
        Ok(ConnectionState::connected(address, chain_id))
    }

    /// Injected-wallet protocols expose no programmatic revoke, so this only
    /// clears local state; the wallet's own grant survives.
    pub fn disconnect(&self) {
        let mut state = self.state_guard();
        if phase_of(&state) != ConnectionPhase::Disconnected {
            info!("wallet disconnected");
        }
        *state = ConnectionState::disconnected();
    }

    /// Silent session restore via `eth_accounts`: resumes as connected when
    /// the wallet already grants accounts, and never prompts.
    pub fn try_resume(&self) -> Result<ConnectionState, WalletError> {
        {
            let state = self.state_guard();
            if phase_of(&state) != ConnectionPhase::Disconnected {
                return Ok(*state);
            }
        }
        if !self.provider.detect() {
            return Ok(self.state());
        }

        let accounts = self.provider.accounts()?;
        let Some(address) = accounts.first().copied() else {
            return Ok(self.state());
        };
        let chain_id = self.provider.chain_id().ok();

        let mut state = self.state_guard();
        if phase_of(&state) == ConnectionPhase::Disconnected {
            info!(address = %shorten_address(&address), "wallet session resumed");
            *state = ConnectionState::connected(address, chain_id);
        }
        Ok(*state)
    }

    /// `accountsChanged` handler. An empty list is an implicit disconnect
    /// from any phase; otherwise the first entry becomes the active address
    /// without touching the connecting/connected flags. Account switches
    /// while disconnected are ignored so a wallet-side change never triggers
    /// a connect the user did not request.
    pub fn reconcile_accounts(&self, accounts: &[Address]) {
        let mut state = self.state_guard();
        if accounts.is_empty() {
            if phase_of(&state) != ConnectionPhase::Disconnected {
                info!("provider cleared accounts; disconnecting");
            }
            *state = ConnectionState::disconnected();
            return;
        }
        if phase_of(&state) == ConnectionPhase::Disconnected {
            return;
        }
        let mut next = *state;
        next.address = Some(accounts[0]);
        debug!(address = %shorten_address(&accounts[0]), "active account changed");
        *state = next;
    }

    /// `chainChanged` handler: re-run enforcement and record the resulting
    /// chain. Remaining off-target keeps the connection alive; the snapshot
    /// simply reflects the foreign chain id.
    pub fn reconcile_chain(&self) {
        if self.phase() == ConnectionPhase::Disconnected {
            return;
        }

        let on_target = ensure_target_chain(self.provider.as_ref(), &self.target);
        let chain_id = self.provider.chain_id().ok();

        let mut state = self.state_guard();
        if phase_of(&state) == ConnectionPhase::Disconnected {
            return;
        }
        let mut next = *state;
        next.chain_id = chain_id;
        *state = next;
        if !on_target {
            warn!(
                active = chain_id,
                target_chain = self.target.chain_id,
                "still off the target chain after enforcement"
            );
        }
    }

    // ConnectionState is Copy; a poisoned lock cannot leave a torn snapshot
    // behind, so recover the guard instead of propagating the panic.
    fn state_guard(&self) -> MutexGuard<'_, ConnectionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<P: ProviderPort> ConnectionManager<P> {
    /// Convenience for event-bridge payloads: decode then reconcile,
    /// dropping malformed payloads with a warning.
    pub(crate) fn reconcile_accounts_payload(&self, payload: &Value) {
        match crate::domain::json_accounts_to_addresses(payload) {
            Ok(accounts) => self.reconcile_accounts(&accounts),
            Err(e) => warn!(error = %e, "ignoring malformed accountsChanged payload"),
        }
    }
}

fn phase_of(state: &ConnectionState) -> ConnectionPhase {
    if state.connected {
        ConnectionPhase::Connected
    } else if state.connecting {
        ConnectionPhase::Connecting
    } else {
        ConnectionPhase::Disconnected
    }
}
