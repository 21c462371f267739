//! Bindings: configured, prepared relationships to specific peers.
//!
//! A binding captures how to talk to one peer — addressing, transport, and
//! security — and drives itself through a multi-phase preparation pipeline
//! before exchanges are created against it. Preparation may suspend on the
//! resolver, on transport connect, or on the security service, and resumes
//! through the manager's `on_*` completion entry points.

pub mod config;
pub mod pool;
pub mod prepare;
pub mod state;

pub use config::{AddressingOption, SecurityOption, TransportOption};
pub use pool::{BindingId, BindingPool};
pub use prepare::BindingEvent;
pub use state::BindingState;

use weft_core::types::{KeyId, NodeId};

use crate::error::BindingError;
use crate::reliable::constants::DEFAULT_RESPONSE_TIMEOUT_MS;
use crate::types::{ConnectionId, KeyRef, PeerAddress, RmpConfig};

/// A per-peer configuration and preparation state machine.
///
/// Fields marked resolved are filled in during preparation; configuration
/// fields survive a failure for introspection and are wiped by `reset`.
#[derive(Debug)]
pub struct Binding {
    pub(crate) state: BindingState,
    pub(crate) peer: Option<NodeId>,
    pub(crate) addressing: AddressingOption,
    pub(crate) transport: TransportOption,
    pub(crate) security: SecurityOption,

    // Resolved during preparation.
    pub(crate) peer_address: Option<PeerAddress>,
    pub(crate) connection: Option<ConnectionId>,
    pub(crate) reserved_key: Option<KeyId>,
    pub(crate) session_key: Option<KeyRef>,

    pub(crate) response_timeout_ms: u64,
    pub(crate) rmp: RmpConfig,
    pub(crate) key_reserved: bool,
    pub(crate) connection_referenced: bool,
    pub(crate) last_error: Option<BindingError>,
    pub(crate) ref_count: u32,
}

impl Binding {
    pub(crate) fn new() -> Self {
        Self {
            state: BindingState::NotConfigured,
            peer: None,
            addressing: AddressingOption::Unspecified,
            transport: TransportOption::Unspecified,
            security: SecurityOption::Unspecified,
            peer_address: None,
            connection: None,
            reserved_key: None,
            session_key: None,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            rmp: RmpConfig::default(),
            key_reserved: false,
            connection_referenced: false,
            last_error: None,
            ref_count: 0,
        }
    }

    /// Wipe configuration and resolved state back to defaults.
    pub(crate) fn clear_configuration(&mut self) {
        self.peer = None;
        self.addressing = AddressingOption::Unspecified;
        self.transport = TransportOption::Unspecified;
        self.security = SecurityOption::Unspecified;
        self.peer_address = None;
        self.connection = None;
        self.reserved_key = None;
        self.session_key = None;
        self.response_timeout_ms = DEFAULT_RESPONSE_TIMEOUT_MS;
        self.rmp = RmpConfig::default();
        self.key_reserved = false;
        self.connection_referenced = false;
        self.last_error = None;
    }

    // ------------------------------------------------------------------ //
    // Introspection
    // ------------------------------------------------------------------ //

    #[must_use]
    pub fn state(&self) -> BindingState {
        self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == BindingState::Ready
    }

    #[must_use]
    pub fn peer(&self) -> Option<NodeId> {
        self.peer
    }

    #[must_use]
    pub fn peer_address(&self) -> Option<PeerAddress> {
        self.peer_address
    }

    #[must_use]
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    #[must_use]
    pub fn security(&self) -> &SecurityOption {
        &self.security
    }

    #[must_use]
    pub fn session_key(&self) -> Option<KeyRef> {
        self.session_key
    }

    #[must_use]
    pub fn response_timeout_ms(&self) -> u64 {
        self.response_timeout_ms
    }

    #[must_use]
    pub fn rmp_config(&self) -> RmpConfig {
        self.rmp
    }

    /// The error that moved this binding to `Failed`, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&BindingError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    // ------------------------------------------------------------------ //
    // Configuration (legal while Configuring)
    // ------------------------------------------------------------------ //

    fn configuring(&mut self) -> Result<&mut Self, BindingError> {
        if self.state == BindingState::Configuring {
            Ok(self)
        } else {
            Err(BindingError::WrongState(self.state.name()))
        }
    }

    pub fn target_node_id(&mut self, peer: NodeId) -> Result<&mut Self, BindingError> {
        self.configuring()?.peer = Some(peer);
        Ok(self)
    }

    pub fn target_address_fabric_default(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.addressing = AddressingOption::FabricDefault;
        Ok(self)
    }

    pub fn target_address_fabric_subnet(&mut self, subnet: u16) -> Result<&mut Self, BindingError> {
        self.configuring()?.addressing = AddressingOption::FabricSubnet(subnet);
        Ok(self)
    }

    pub fn target_address_explicit(&mut self, address: PeerAddress) -> Result<&mut Self, BindingError> {
        self.configuring()?.addressing = AddressingOption::Explicit(address);
        Ok(self)
    }

    pub fn target_address_hostname(&mut self, hostname: impl Into<String>) -> Result<&mut Self, BindingError> {
        self.configuring()?.addressing = AddressingOption::Hostname(hostname.into());
        Ok(self)
    }

    pub fn transport_udp(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.transport = TransportOption::Udp;
        Ok(self)
    }

    pub fn transport_reliable_udp(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.transport = TransportOption::ReliableUdp;
        Ok(self)
    }

    pub fn transport_tcp(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.transport = TransportOption::Tcp;
        Ok(self)
    }

    pub fn transport_existing(&mut self, connection: ConnectionId) -> Result<&mut Self, BindingError> {
        self.configuring()?.transport = TransportOption::Existing(connection);
        Ok(self)
    }

    pub fn security_none(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::None;
        Ok(self)
    }

    pub fn security_key(&mut self, key: KeyId) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::Key(key);
        Ok(self)
    }

    pub fn security_case(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::Case;
        Ok(self)
    }

    pub fn security_shared_case(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::SharedCase;
        Ok(self)
    }

    pub fn security_pase(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::Pase;
        Ok(self)
    }

    pub fn security_take(&mut self) -> Result<&mut Self, BindingError> {
        self.configuring()?.security = SecurityOption::Take;
        Ok(self)
    }

    pub fn response_timeout(&mut self, timeout_ms: u64) -> Result<&mut Self, BindingError> {
        self.configuring()?.response_timeout_ms = timeout_ms;
        Ok(self)
    }

    pub fn reliability_config(&mut self, rmp: RmpConfig) -> Result<&mut Self, BindingError> {
        self.configuring()?.rmp = rmp;
        Ok(self)
    }

    // ------------------------------------------------------------------ //
    // Message authentication
    // ------------------------------------------------------------------ //

    /// Whether a message plausibly came from this binding's peer: the source
    /// node id, the transport kind, and the encryption must all match the
    /// prepared configuration.
    #[must_use]
    pub fn is_authentic_source(
        &self,
        source: NodeId,
        connection: Option<ConnectionId>,
        key: Option<KeyRef>,
    ) -> bool {
        if self.state != BindingState::Ready || self.peer != Some(source) {
            return false;
        }

        let transport_ok = match self.transport {
            TransportOption::Tcp | TransportOption::Existing(_) => {
                connection.is_some() && connection == self.connection
            }
            TransportOption::Udp | TransportOption::ReliableUdp => connection.is_none(),
            TransportOption::Unspecified => false,
        };
        if !transport_ok {
            return false;
        }

        match self.security {
            SecurityOption::None => key.is_none(),
            SecurityOption::Key(_) => {
                key.is_some() && key.map(|k| k.key_id) == self.reserved_key
            }
            SecurityOption::Case
            | SecurityOption::SharedCase
            | SecurityOption::Pase
            | SecurityOption::Take => key.is_some() && key == self.session_key,
            SecurityOption::Unspecified => false,
        }
    }
}
