//! Binding preparation pipeline and completion entry points.
//!
//! `prepare` walks address → transport → security synchronously where it can
//! and suspends where it must (hostname resolution, TCP connect, session
//! establishment). Completions re-enter through `on_*` methods, which ignore
//! stale notifications for bindings that were reset or closed in the
//! meantime, so cancellation is idempotent and never re-enters a freed state
//! machine. Every failure funnels through one handler that moves the binding
//! to `Failed` while preserving its configuration for introspection.

use weft_core::types::KeyId;

use crate::binding::config::{AddressingOption, SecurityOption, TransportOption};
use crate::binding::pool::BindingId;
use crate::binding::state::BindingState;
use crate::error::BindingError;
use crate::exchange::manager::ExchangeManager;
use crate::traits::{Platform, ResolverError, SecurityError, TransportError};
use crate::types::{KeyRef, PeerAddress};

/// Application-visible binding lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingEvent {
    /// The application should configure and prepare this binding.
    PrepareRequested { binding: BindingId },
    /// Preparation completed; exchanges may be created against the binding.
    Ready { binding: BindingId },
    /// Preparation failed; the configuration is preserved for introspection.
    PrepareFailed {
        binding: BindingId,
        error: BindingError,
    },
    /// A previously-Ready binding failed (key loss, session loss).
    BindingFailed {
        binding: BindingId,
        error: BindingError,
    },
    /// The transport connection for this binding is established.
    ConnectionEstablished { binding: BindingId },
}

impl ExchangeManager {
    // ------------------------------------------------------------------ //
    // Allocation and configuration
    // ------------------------------------------------------------------ //

    pub fn allocate_binding(&mut self) -> Result<BindingId, BindingError> {
        self.bindings.allocate().ok_or(BindingError::PoolExhausted)
    }

    #[must_use]
    pub fn binding(&self, id: BindingId) -> Option<&crate::binding::Binding> {
        self.bindings.get(id)
    }

    pub fn binding_mut(&mut self, id: BindingId) -> Option<&mut crate::binding::Binding> {
        self.bindings.get_mut(id)
    }

    pub fn retain_binding(&mut self, id: BindingId) -> Result<(), BindingError> {
        if self.bindings.retain(id) {
            Ok(())
        } else {
            Err(BindingError::UnknownBinding)
        }
    }

    /// Drop one reference; a closed binding's slot is reclaimed at zero.
    pub fn release_binding(&mut self, id: BindingId) -> Result<(), BindingError> {
        self.bindings
            .release(id)
            .map(|_| ())
            .ok_or(BindingError::UnknownBinding)
    }

    /// Enter `Configuring`, wiping any previous configuration. Legal from
    /// `NotConfigured` and `Failed` only.
    pub fn begin_configuration(&mut self, id: BindingId) -> Result<(), BindingError> {
        let binding = self.bindings.get_mut(id).ok_or(BindingError::UnknownBinding)?;
        if !binding.state.can_begin_configuration() {
            return Err(BindingError::WrongState(binding.state.name()));
        }
        binding.clear_configuration();
        binding.state = BindingState::Configuring;
        Ok(())
    }

    /// Ask the application to configure and prepare this binding.
    pub fn request_prepare(&mut self, id: BindingId) -> Result<BindingEvent, BindingError> {
        let binding = self.bindings.get(id).ok_or(BindingError::UnknownBinding)?;
        if binding.state == BindingState::Closed {
            return Err(BindingError::WrongState(binding.state.name()));
        }
        Ok(BindingEvent::PrepareRequested { binding: id })
    }

    // ------------------------------------------------------------------ //
    // Preparation pipeline
    // ------------------------------------------------------------------ //

    /// Validate the configuration and drive preparation as far as it can go
    /// without suspending.
    ///
    /// Configuration errors are returned synchronously; failures during
    /// preparation itself surface as [`BindingEvent::PrepareFailed`].
    pub fn prepare<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
    ) -> Result<Vec<BindingEvent>, BindingError> {
        {
            let binding = self.bindings.get(id).ok_or(BindingError::UnknownBinding)?;
            if binding.state != BindingState::Configuring {
                return Err(BindingError::WrongState(binding.state.name()));
            }
            if binding.peer.is_none() {
                return Err(BindingError::ConfigurationIncomplete("peer node id"));
            }
            if binding.transport == TransportOption::Unspecified {
                return Err(BindingError::ConfigurationIncomplete("transport option"));
            }
            if binding.security == SecurityOption::Unspecified {
                return Err(BindingError::ConfigurationIncomplete("security option"));
            }
        }

        if let Some(binding) = self.bindings.get_mut(id) {
            binding.state = BindingState::Preparing;
        }
        tracing::info!(binding = %id, "binding preparation started");
        Ok(self.prepare_address(platform, id))
    }

    fn prepare_address<P: Platform>(&mut self, platform: &mut P, id: BindingId) -> Vec<BindingEvent> {
        let (addressing, transport, peer) = match self.bindings.get_mut(id) {
            Some(binding) => {
                binding.state = BindingState::PreparingAddress;
                (binding.addressing.clone(), binding.transport, binding.peer)
            }
            None => return Vec::new(),
        };

        // An existing connection supplies the address; it is copied for
        // introspection only.
        if let TransportOption::Existing(conn) = transport {
            let address = platform.connection_peer(conn);
            if let Some(binding) = self.bindings.get_mut(id) {
                binding.peer_address = address;
            }
            return self.prepare_transport(platform, id);
        }

        match addressing {
            AddressingOption::Unspecified => self.fail_preparation(
                id,
                BindingError::ConfigurationIncomplete("addressing option"),
            ),
            AddressingOption::FabricDefault => self.fabric_address(platform, id, peer, None),
            AddressingOption::FabricSubnet(subnet) => {
                self.fabric_address(platform, id, peer, Some(subnet))
            }
            AddressingOption::Explicit(address) => {
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.peer_address = Some(address);
                }
                self.prepare_transport(platform, id)
            }
            AddressingOption::Hostname(hostname) => {
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.state = BindingState::ResolvingHostName;
                }
                tracing::debug!(binding = %id, hostname = %hostname, "resolving peer hostname");
                match platform.begin_resolve(id, &hostname) {
                    Ok(()) => Vec::new(),
                    Err(e) => self.fail_preparation(id, e.into()),
                }
            }
        }
    }

    /// Synthesize the peer's fabric address and continue with transport
    /// preparation. No I/O, no suspension.
    fn fabric_address<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
        peer: Option<weft_core::types::NodeId>,
        subnet: Option<u16>,
    ) -> Vec<BindingEvent> {
        let Some(peer) = peer else {
            return self.fail_preparation(id, BindingError::ConfigurationIncomplete("peer node id"));
        };
        let address = platform.select_node_address(peer, subnet);
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.peer_address = Some(address);
        }
        self.prepare_transport(platform, id)
    }

    fn prepare_transport<P: Platform>(&mut self, platform: &mut P, id: BindingId) -> Vec<BindingEvent> {
        let (transport, peer_address, has_connection) = match self.bindings.get_mut(id) {
            Some(binding) => {
                binding.state = BindingState::PreparingTransport;
                (binding.transport, binding.peer_address, binding.connection.is_some())
            }
            None => return Vec::new(),
        };

        match transport {
            TransportOption::Tcp if !has_connection => {
                let Some(address) = peer_address else {
                    return self
                        .fail_preparation(id, BindingError::ConfigurationIncomplete("peer address"));
                };
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.state = BindingState::Connecting;
                }
                tracing::debug!(binding = %id, address = %address, "connecting");
                match platform.begin_connect(id, &address) {
                    Ok(conn) => {
                        if let Some(binding) = self.bindings.get_mut(id) {
                            binding.connection = Some(conn);
                            binding.connection_referenced = true;
                        }
                        Vec::new()
                    }
                    Err(e) => self.fail_preparation(id, e.into()),
                }
            }
            TransportOption::Existing(conn) => {
                platform.retain_connection(conn);
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.connection = Some(conn);
                    binding.connection_referenced = true;
                }
                self.prepare_security(platform, id)
            }
            _ => self.prepare_security(platform, id),
        }
    }

    fn prepare_security<P: Platform>(&mut self, platform: &mut P, id: BindingId) -> Vec<BindingEvent> {
        let (security, peer) = match self.bindings.get_mut(id) {
            Some(binding) => {
                binding.state = BindingState::PreparingSecurity;
                (binding.security, binding.peer)
            }
            None => return Vec::new(),
        };
        let Some(peer) = peer else {
            return self.fail_preparation(id, BindingError::ConfigurationIncomplete("peer node id"));
        };

        match security {
            SecurityOption::None => self.ready(id),
            SecurityOption::Key(logical) => {
                let concrete = platform.current_app_key_id(logical);
                match platform.reserve_key(peer, concrete) {
                    Ok(()) => {
                        if let Some(binding) = self.bindings.get_mut(id) {
                            binding.reserved_key = Some(concrete);
                            binding.key_reserved = true;
                        }
                        self.ready(id)
                    }
                    Err(e) => self.fail_preparation(id, e.into()),
                }
            }
            other => match other.session_kind() {
                Some(kind) => match platform.begin_session(id, peer, kind) {
                    Ok(()) => {
                        if let Some(binding) = self.bindings.get_mut(id) {
                            binding.state = BindingState::EstablishingSession;
                        }
                        Vec::new()
                    }
                    Err(SecurityError::Busy) => {
                        if let Some(binding) = self.bindings.get_mut(id) {
                            binding.state = BindingState::WaitingSecurity;
                        }
                        tracing::debug!(binding = %id, "security service busy; waiting");
                        Vec::new()
                    }
                    Err(SecurityError::NotSupported) => {
                        self.fail_preparation(id, BindingError::NotImplemented)
                    }
                    Err(e) => self.fail_preparation(id, e.into()),
                },
                None => self.fail_preparation(
                    id,
                    BindingError::ConfigurationIncomplete("security option"),
                ),
            },
        }
    }

    fn ready(&mut self, id: BindingId) -> Vec<BindingEvent> {
        match self.bindings.get_mut(id) {
            Some(binding) => {
                binding.state = BindingState::Ready;
                tracing::info!(binding = %id, "binding ready");
                vec![BindingEvent::Ready { binding: id }]
            }
            None => Vec::new(),
        }
    }

    /// The single failure funnel: move to `Failed`, preserve configuration,
    /// and report to the application.
    fn fail_preparation(&mut self, id: BindingId, error: BindingError) -> Vec<BindingEvent> {
        let Some(binding) = self.bindings.get_mut(id) else {
            return Vec::new();
        };
        let was_ready = binding.state == BindingState::Ready;
        binding.state = BindingState::Failed;
        binding.last_error = Some(error.clone());
        tracing::warn!(binding = %id, error = %error, "binding failed");
        if was_ready {
            vec![BindingEvent::BindingFailed { binding: id, error }]
        } else {
            vec![BindingEvent::PrepareFailed { binding: id, error }]
        }
    }

    // ------------------------------------------------------------------ //
    // Asynchronous completion entry points
    // ------------------------------------------------------------------ //

    /// Hostname resolution finished. Stale completions (the binding was
    /// reset, closed, or re-prepared meanwhile) are ignored.
    pub fn on_resolve_complete<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
        result: Result<PeerAddress, ResolverError>,
    ) -> Vec<BindingEvent> {
        match self.bindings.get(id) {
            Some(binding) if binding.state == BindingState::ResolvingHostName => {}
            _ => {
                tracing::debug!(binding = %id, "stale resolve completion ignored");
                return Vec::new();
            }
        }
        match result {
            Ok(address) => {
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.peer_address = Some(address);
                }
                self.prepare_transport(platform, id)
            }
            Err(e) => self.fail_preparation(id, e.into()),
        }
    }

    /// Transport connect finished.
    pub fn on_connect_complete<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
        result: Result<(), TransportError>,
    ) -> Vec<BindingEvent> {
        match self.bindings.get(id) {
            Some(binding) if binding.state == BindingState::Connecting => {}
            _ => {
                tracing::debug!(binding = %id, "stale connect completion ignored");
                return Vec::new();
            }
        }
        match result {
            Ok(()) => {
                let mut events = vec![BindingEvent::ConnectionEstablished { binding: id }];
                events.extend(self.prepare_security(platform, id));
                events
            }
            Err(e) => {
                if let Some(binding) = self.bindings.get_mut(id) {
                    binding.connection_referenced = false;
                    if let Some(conn) = binding.connection.take() {
                        platform.release_connection(conn);
                    }
                }
                self.fail_preparation(id, e.into())
            }
        }
    }

    /// Session establishment succeeded; `key` is the session's key.
    pub fn on_session_ready(&mut self, id: BindingId, key: KeyRef) -> Vec<BindingEvent> {
        match self.bindings.get_mut(id) {
            Some(binding) if binding.state == BindingState::EstablishingSession => {
                binding.session_key = Some(key);
                binding.reserved_key = Some(key.key_id);
                binding.key_reserved = true;
            }
            _ => {
                tracing::debug!(binding = %id, "stale session completion ignored");
                return Vec::new();
            }
        }
        self.ready(id)
    }

    /// Session establishment failed.
    pub fn on_session_failed(&mut self, id: BindingId, error: SecurityError) -> Vec<BindingEvent> {
        match self.bindings.get(id) {
            Some(binding) if binding.state == BindingState::EstablishingSession => {}
            _ => {
                tracing::debug!(binding = %id, "stale session failure ignored");
                return Vec::new();
            }
        }
        self.fail_preparation(id, error.into())
    }

    /// The security service became available: resume every binding parked in
    /// `WaitingSecurity`.
    pub fn on_security_available<P: Platform>(&mut self, platform: &mut P) -> Vec<BindingEvent> {
        let waiting: Vec<BindingId> = self
            .bindings
            .iter_live()
            .filter(|(_, binding)| binding.state == BindingState::WaitingSecurity)
            .map(|(id, _)| id)
            .collect();
        let mut events = Vec::new();
        for id in waiting {
            tracing::debug!(binding = %id, "security service available; resuming");
            events.extend(self.prepare_security(platform, id));
        }
        events
    }

    // ------------------------------------------------------------------ //
    // Reset / close
    // ------------------------------------------------------------------ //

    /// Cancel any suspended preparation, release held resources, and return
    /// to `NotConfigured`.
    pub fn reset_binding<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
    ) -> Result<(), BindingError> {
        let state = self
            .bindings
            .get(id)
            .ok_or(BindingError::UnknownBinding)?
            .state;
        if !state.can_reset() {
            return Err(BindingError::WrongState(state.name()));
        }
        self.cancel_preparation(platform, id);
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.clear_configuration();
            binding.state = BindingState::NotConfigured;
        }
        tracing::info!(binding = %id, "binding reset");
        Ok(())
    }

    /// Release held resources and enter the terminal `Closed` state,
    /// dropping the allocation reference. Legal from `Ready`, `Failed`, and
    /// `NotConfigured`; reset a suspended binding first.
    pub fn close_binding<P: Platform>(
        &mut self,
        platform: &mut P,
        id: BindingId,
    ) -> Result<(), BindingError> {
        let state = self
            .bindings
            .get(id)
            .ok_or(BindingError::UnknownBinding)?
            .state;
        if !state.can_close() {
            return Err(BindingError::WrongState(state.name()));
        }
        self.cancel_preparation(platform, id);
        if let Some(binding) = self.bindings.get_mut(id) {
            binding.state = BindingState::Closed;
        }
        tracing::info!(binding = %id, "binding closed");
        self.release_binding(id)
    }

    /// Cancel a suspended operation and release the key reservation and
    /// connection reference if held. Safe to call repeatedly.
    fn cancel_preparation<P: Platform>(&mut self, platform: &mut P, id: BindingId) {
        let Some(binding) = self.bindings.get_mut(id) else {
            return;
        };
        match binding.state {
            BindingState::ResolvingHostName => platform.cancel_resolve(id),
            BindingState::Connecting => platform.cancel_connect(id),
            BindingState::EstablishingSession => platform.cancel_session(id),
            _ => {}
        }
        if binding.key_reserved {
            if let (Some(peer), Some(key)) = (binding.peer, binding.reserved_key) {
                platform.release_key(peer, key);
            }
            binding.key_reserved = false;
            binding.reserved_key = None;
            binding.session_key = None;
        }
        if binding.connection_referenced {
            if let Some(conn) = binding.connection.take() {
                platform.release_connection(conn);
            }
            binding.connection_referenced = false;
        }
    }

    /// Fail every binding holding a reservation on `key`. The reservation is
    /// gone with the key, so nothing is released back to the service.
    pub(crate) fn fail_bindings_with_key(&mut self, key: KeyId) -> Vec<BindingEvent> {
        let affected: Vec<BindingId> = self
            .bindings
            .iter_live()
            .filter(|(_, binding)| binding.reserved_key == Some(key))
            .map(|(id, _)| id)
            .collect();
        let mut events = Vec::new();
        for id in affected {
            if let Some(binding) = self.bindings.get_mut(id) {
                binding.key_reserved = false;
                binding.reserved_key = None;
                binding.session_key = None;
            }
            events.extend(
                self.fail_preparation(id, BindingError::Security(SecurityError::KeyFailed(key))),
            );
        }
        events
    }
}
