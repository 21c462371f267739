//! In-memory platform for tests and examples.
//!
//! Implements every collaborator trait against process-local state: sent
//! frames land in an outbox for the test to deliver, the timer is a recorded
//! deadline driven by hand, key reservations and connection references are
//! counted so leaks are assertable, and fabric addresses are synthesized
//! deterministically from the node id.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv6Addr};

use weft_core::constants::DEFAULT_PORT;
use weft_core::types::{KeyId, NodeId};

use weft_protocol::binding::BindingId;
use weft_protocol::traits::{
    AddressResolver, MessageTransport, ResolverError, SecurityError, SecurityService, SessionKind,
    TimerService, TransportError,
};
use weft_protocol::types::{ConnectionId, PeerAddress, SendTarget};

/// Synthesize the deterministic fabric ULA for a node.
#[must_use]
pub fn fabric_address(node: NodeId, subnet: Option<u16>) -> PeerAddress {
    let n = node.to_u64();
    let subnet = subnet.unwrap_or(1);
    let ip = Ipv6Addr::new(
        0xfd00,
        subnet,
        0,
        0,
        (n >> 48) as u16,
        (n >> 32) as u16,
        (n >> 16) as u16,
        n as u16,
    );
    PeerAddress::new(IpAddr::V6(ip), DEFAULT_PORT)
}

/// An in-memory [`weft_protocol::traits::Platform`].
pub struct LoopbackPlatform {
    now_ms: u64,
    outbox: VecDeque<(SendTarget, Vec<u8>)>,
    armed_timer_ms: Option<u64>,
    key_reservations: HashMap<(u64, u16), u32>,
    connection_refs: HashMap<u32, u32>,
    next_connection: u32,
    pending_resolves: Vec<(BindingId, String)>,
    pending_connects: Vec<BindingId>,
    pending_sessions: Vec<(BindingId, NodeId, SessionKind)>,
}

impl LoopbackPlatform {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            outbox: VecDeque::new(),
            armed_timer_ms: None,
            key_reservations: HashMap::new(),
            connection_refs: HashMap::new(),
            next_connection: 1,
            pending_resolves: Vec::new(),
            pending_connects: Vec::new(),
            pending_sessions: Vec::new(),
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    /// Advance to the armed timer deadline; false when nothing is armed.
    pub fn advance_to_timer(&mut self) -> bool {
        match self.armed_timer_ms.take() {
            Some(duration) => {
                self.now_ms += duration;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn timer_armed(&self) -> bool {
        self.armed_timer_ms.is_some()
    }

    /// Pop the oldest undelivered frame.
    pub fn pop_frame(&mut self) -> Option<(SendTarget, Vec<u8>)> {
        self.outbox.pop_front()
    }

    #[must_use]
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    /// Total outstanding key reservations across all peers.
    #[must_use]
    pub fn outstanding_key_reservations(&self) -> u32 {
        self.key_reservations.values().sum()
    }

    /// Total outstanding connection references.
    #[must_use]
    pub fn outstanding_connection_refs(&self) -> u32 {
        self.connection_refs.values().sum()
    }
}

impl Default for LoopbackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTransport for LoopbackPlatform {
    fn send_message(&mut self, target: &SendTarget, payload: &[u8]) -> Result<(), TransportError> {
        self.outbox.push_back((*target, payload.to_vec()));
        Ok(())
    }

    fn begin_connect(
        &mut self,
        binding: BindingId,
        _address: &PeerAddress,
    ) -> Result<ConnectionId, TransportError> {
        let conn = ConnectionId::new(self.next_connection);
        self.next_connection += 1;
        self.connection_refs.insert(conn.to_u32(), 1);
        self.pending_connects.push(binding);
        Ok(conn)
    }

    fn cancel_connect(&mut self, binding: BindingId) {
        self.pending_connects.retain(|b| *b != binding);
    }

    fn retain_connection(&mut self, connection: ConnectionId) {
        *self.connection_refs.entry(connection.to_u32()).or_insert(0) += 1;
    }

    fn release_connection(&mut self, connection: ConnectionId) {
        if let Some(count) = self.connection_refs.get_mut(&connection.to_u32()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.connection_refs.remove(&connection.to_u32());
            }
        }
    }

    fn connection_peer(&self, _connection: ConnectionId) -> Option<PeerAddress> {
        None
    }
}

impl SecurityService for LoopbackPlatform {
    fn reserve_key(&mut self, peer: NodeId, key: KeyId) -> Result<(), SecurityError> {
        *self
            .key_reservations
            .entry((peer.to_u64(), key.to_u16()))
            .or_insert(0) += 1;
        Ok(())
    }

    fn release_key(&mut self, peer: NodeId, key: KeyId) {
        let slot = (peer.to_u64(), key.to_u16());
        if let Some(count) = self.key_reservations.get_mut(&slot) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.key_reservations.remove(&slot);
            }
        }
    }

    fn begin_session(
        &mut self,
        binding: BindingId,
        peer: NodeId,
        kind: SessionKind,
    ) -> Result<(), SecurityError> {
        self.pending_sessions.push((binding, peer, kind));
        Ok(())
    }

    fn cancel_session(&mut self, binding: BindingId) {
        self.pending_sessions.retain(|(b, _, _)| *b != binding);
    }

    fn current_app_key_id(&self, logical: KeyId) -> KeyId {
        logical
    }
}

impl TimerService for LoopbackPlatform {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn start_timer(&mut self, duration_ms: u64) {
        self.armed_timer_ms = Some(duration_ms);
    }

    fn cancel_timer(&mut self) {
        self.armed_timer_ms = None;
    }
}

impl AddressResolver for LoopbackPlatform {
    fn select_node_address(&self, node: NodeId, subnet: Option<u16>) -> PeerAddress {
        fabric_address(node, subnet)
    }

    fn begin_resolve(&mut self, binding: BindingId, hostname: &str) -> Result<(), ResolverError> {
        self.pending_resolves.push((binding, hostname.to_string()));
        Ok(())
    }

    fn cancel_resolve(&mut self, binding: BindingId) {
        self.pending_resolves.retain(|(b, _)| *b != binding);
    }
}
