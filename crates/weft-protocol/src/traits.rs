//! Collaborator traits consumed by the session layer.
//!
//! The protocol state machines perform no I/O of their own: every send, timer,
//! key operation, and address lookup goes through one of these traits. Their
//! asynchronous counterparts (resolution results, connect completion, session
//! establishment, security-manager availability) re-enter the manager through
//! its `on_*` entry points rather than through stored callbacks, so a
//! cancelled operation can never re-enter a freed state machine.

use weft_core::types::{KeyId, NodeId};

use crate::binding::BindingId;
use crate::types::{ConnectionId, PeerAddress, SendTarget};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("transport send buffer full")]
    Backpressure,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether a send that failed with this error may simply be retried on
    /// the next retransmission pass.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backpressure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("security service busy")]
    Busy,

    #[error("key {0} not found")]
    KeyNotFound(KeyId),

    #[error("key {0} failed")]
    KeyFailed(KeyId),

    #[error("session establishment rejected: {0}")]
    Rejected(String),

    #[error("session kind not supported")]
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("hostname not found: {0}")]
    NotFound(String),

    #[error("hostname resolved to no addresses")]
    EmptyResult,

    #[error("resolver failure: {0}")]
    Failed(String),
}

/// Session-establishment variants a binding can request from the security
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Case,
    SharedCase,
    Pase,
    Take,
}

/// Message/transport layer: datagram sends and connection objects.
pub trait MessageTransport {
    /// Send one encoded message toward a peer.
    fn send_message(&mut self, target: &SendTarget, payload: &[u8]) -> Result<(), TransportError>;

    /// Start establishing a connection for a binding. The returned handle is
    /// live immediately; the connect result arrives later via
    /// `ExchangeManager::on_connect_complete`.
    fn begin_connect(
        &mut self,
        binding: BindingId,
        address: &PeerAddress,
    ) -> Result<ConnectionId, TransportError>;

    /// Cancel an in-flight connect for a binding. Idempotent.
    fn cancel_connect(&mut self, binding: BindingId);

    fn retain_connection(&mut self, connection: ConnectionId);

    fn release_connection(&mut self, connection: ConnectionId);

    /// Peer address of an established connection, for introspection.
    fn connection_peer(&self, connection: ConnectionId) -> Option<PeerAddress>;
}

/// Security manager: key reservations and session establishment.
pub trait SecurityService {
    /// Place a non-owning hold on a key so it cannot be evicted while in use.
    fn reserve_key(&mut self, peer: NodeId, key: KeyId) -> Result<(), SecurityError>;

    fn release_key(&mut self, peer: NodeId, key: KeyId);

    /// Start establishing a secure session. Completion arrives via
    /// `ExchangeManager::on_session_ready` / `on_session_failed`;
    /// `Err(SecurityError::Busy)` means retry after `on_security_available`.
    fn begin_session(
        &mut self,
        binding: BindingId,
        peer: NodeId,
        kind: SessionKind,
    ) -> Result<(), SecurityError>;

    /// Cancel an in-flight session establishment. Idempotent.
    fn cancel_session(&mut self, binding: BindingId);

    /// Map a logical application key id to the currently active concrete id.
    fn current_app_key_id(&self, logical: KeyId) -> KeyId;
}

/// System timer: one real timer per manager, re-armed by the tick scheduler.
pub trait TimerService {
    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;

    /// Arm (or re-arm) the single timer. Expiry arrives via
    /// `ExchangeManager::on_timer_fired`.
    fn start_timer(&mut self, duration_ms: u64);

    fn cancel_timer(&mut self);
}

/// Fabric addressing and hostname resolution.
pub trait AddressResolver {
    /// Synthesize the fabric address of a node deterministically. No I/O.
    fn select_node_address(&self, node: NodeId, subnet: Option<u16>) -> PeerAddress;

    /// Start resolving a hostname for a binding. The result arrives via
    /// `ExchangeManager::on_resolve_complete`.
    fn begin_resolve(&mut self, binding: BindingId, hostname: &str) -> Result<(), ResolverError>;

    /// Cancel an in-flight resolution for a binding. Idempotent.
    fn cancel_resolve(&mut self, binding: BindingId);
}

/// Everything the manager needs from its environment.
pub trait Platform: MessageTransport + SecurityService + TimerService + AddressResolver {}

impl<T: MessageTransport + SecurityService + TimerService + AddressResolver> Platform for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_is_transient() {
        assert!(TransportError::Backpressure.is_transient());
    }

    #[test]
    fn other_transport_errors_are_fatal() {
        assert!(!TransportError::NotConnected.is_transient());
        assert!(!TransportError::ConnectFailed("refused".into()).is_transient());
        assert!(!TransportError::Io("reset".into()).is_transient());
    }
}
