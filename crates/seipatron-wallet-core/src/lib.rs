pub mod domain;
pub mod enforcer;
pub mod events;
pub mod manager;
pub mod ports;
pub mod registry;
pub mod state_machine;

pub use domain::{ChainDescriptor, ConnectionState, NativeCurrency};
pub use enforcer::ensure_target_chain;
pub use events::EventBridge;
pub use manager::ConnectionManager;
pub use ports::{
    EventCallback, ListenerId, ProviderEventKind, ProviderPort, WalletError,
    ERROR_UNRECOGNIZED_CHAIN, ERROR_USER_REJECTED,
};
pub use state_machine::{connection_transition, ConnectionAction, ConnectionPhase, PhaseTransition};
