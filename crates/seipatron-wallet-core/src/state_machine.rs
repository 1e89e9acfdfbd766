use crate::ports::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    BeginConnect,
    ConnectSucceeded,
    ConnectFailed,
    Disconnect,
    AccountsCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: ConnectionPhase,
    pub to: ConnectionPhase,
    pub reason: &'static str,
}

/// Legal transitions of the connection lifecycle. `Disconnect` and
/// `AccountsCleared` are accepted from any phase; everything else is
/// position-dependent. A second `BeginConnect` while already `Connecting`
/// is rejected here - the manager short-circuits it before ever calling in.
pub fn connection_transition(
    phase: ConnectionPhase,
    action: ConnectionAction,
) -> Result<(ConnectionPhase, PhaseTransition), WalletError> {
    use ConnectionAction as A;
    use ConnectionPhase as P;

    let to = match (phase, action) {
        (P::Disconnected, A::BeginConnect) => P::Connecting,
        (P::Connecting, A::ConnectSucceeded) => P::Connected,
        (P::Connecting, A::ConnectFailed) => P::Disconnected,
        (_, A::Disconnect) => P::Disconnected,
        (_, A::AccountsCleared) => P::Disconnected,
        (from, action) => {
            return Err(WalletError::Validation(format!(
                "illegal connection transition: {from:?} via {action:?}"
            )))
        }
    };
    Ok((
        to,
        PhaseTransition {
            from: phase,
            to,
            reason: action_reason(action),
        },
    ))
}

fn action_reason(action: ConnectionAction) -> &'static str {
    match action {
        ConnectionAction::BeginConnect => "connect_requested",
        ConnectionAction::ConnectSucceeded => "accounts_granted",
        ConnectionAction::ConnectFailed => "connect_failed",
        ConnectionAction::Disconnect => "explicit_disconnect",
        ConnectionAction::AccountsCleared => "accounts_cleared",
    }
}
