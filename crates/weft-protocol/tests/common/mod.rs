//! Shared recording platform for integration tests.
//!
//! Implements every collaborator trait against in-memory state so tests can
//! drive time by hand and assert on the exact calls the manager made.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};

use weft_core::constants::DEFAULT_PORT;
use weft_core::types::{KeyId, NodeId};

use weft_protocol::binding::BindingId;
use weft_protocol::traits::{
    AddressResolver, MessageTransport, ResolverError, SecurityError, SecurityService, SessionKind,
    TimerService, TransportError,
};
use weft_protocol::types::{ConnectionId, PeerAddress, SendTarget};
use weft_protocol::{ExchangeManager, ManagerConfig};

pub struct TestPlatform {
    pub now_ms: u64,

    // Transport
    pub sent: Vec<(SendTarget, Vec<u8>)>,
    pub send_result: Result<(), TransportError>,
    pub connects_begun: Vec<(BindingId, PeerAddress)>,
    pub connects_cancelled: Vec<BindingId>,
    pub connect_result: Result<(), TransportError>,
    pub next_connection: u32,
    pub retained_connections: Vec<ConnectionId>,
    pub released_connections: Vec<ConnectionId>,
    pub connection_peers: HashMap<u32, PeerAddress>,

    // Security
    pub reserved_keys: Vec<(NodeId, KeyId)>,
    pub released_keys: Vec<(NodeId, KeyId)>,
    pub reserve_result: Result<(), SecurityError>,
    pub sessions_begun: Vec<(BindingId, NodeId, SessionKind)>,
    pub sessions_cancelled: Vec<BindingId>,
    pub begin_session_result: Result<(), SecurityError>,
    /// Added to a logical key id by `current_app_key_id`.
    pub app_key_offset: u16,

    // Timer
    pub armed_timer_ms: Option<u64>,
    pub timer_starts: u32,
    pub timer_cancels: u32,

    // Resolver
    pub resolves_begun: Vec<(BindingId, String)>,
    pub resolves_cancelled: Vec<BindingId>,
    pub resolve_start_result: Result<(), ResolverError>,
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self {
            now_ms: 1_000,
            sent: Vec::new(),
            send_result: Ok(()),
            connects_begun: Vec::new(),
            connects_cancelled: Vec::new(),
            connect_result: Ok(()),
            next_connection: 1,
            retained_connections: Vec::new(),
            released_connections: Vec::new(),
            connection_peers: HashMap::new(),
            reserved_keys: Vec::new(),
            released_keys: Vec::new(),
            reserve_result: Ok(()),
            sessions_begun: Vec::new(),
            sessions_cancelled: Vec::new(),
            begin_session_result: Ok(()),
            app_key_offset: 0,
            armed_timer_ms: None,
            timer_starts: 0,
            timer_cancels: 0,
            resolves_begun: Vec::new(),
            resolves_cancelled: Vec::new(),
            resolve_start_result: Ok(()),
        }
    }
}

impl TestPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock to the armed timer's deadline and return true, or
    /// false when no timer is armed.
    pub fn advance_to_timer(&mut self) -> bool {
        match self.armed_timer_ms.take() {
            Some(duration) => {
                self.now_ms += duration;
                true
            }
            None => false,
        }
    }

    /// Frames sent since the last call, oldest first.
    pub fn take_sent(&mut self) -> Vec<(SendTarget, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }
}

impl MessageTransport for TestPlatform {
    fn send_message(&mut self, target: &SendTarget, payload: &[u8]) -> Result<(), TransportError> {
        self.send_result.clone()?;
        self.sent.push((*target, payload.to_vec()));
        Ok(())
    }

    fn begin_connect(
        &mut self,
        binding: BindingId,
        address: &PeerAddress,
    ) -> Result<ConnectionId, TransportError> {
        self.connects_begun.push((binding, *address));
        let conn = ConnectionId::new(self.next_connection);
        self.next_connection += 1;
        Ok(conn)
    }

    fn cancel_connect(&mut self, binding: BindingId) {
        self.connects_cancelled.push(binding);
    }

    fn retain_connection(&mut self, connection: ConnectionId) {
        self.retained_connections.push(connection);
    }

    fn release_connection(&mut self, connection: ConnectionId) {
        self.released_connections.push(connection);
    }

    fn connection_peer(&self, connection: ConnectionId) -> Option<PeerAddress> {
        self.connection_peers.get(&connection.to_u32()).copied()
    }
}

impl SecurityService for TestPlatform {
    fn reserve_key(&mut self, peer: NodeId, key: KeyId) -> Result<(), SecurityError> {
        self.reserve_result.clone()?;
        self.reserved_keys.push((peer, key));
        Ok(())
    }

    fn release_key(&mut self, peer: NodeId, key: KeyId) {
        self.released_keys.push((peer, key));
    }

    fn begin_session(
        &mut self,
        binding: BindingId,
        peer: NodeId,
        kind: SessionKind,
    ) -> Result<(), SecurityError> {
        self.begin_session_result.clone()?;
        self.sessions_begun.push((binding, peer, kind));
        Ok(())
    }

    fn cancel_session(&mut self, binding: BindingId) {
        self.sessions_cancelled.push(binding);
    }

    fn current_app_key_id(&self, logical: KeyId) -> KeyId {
        KeyId::new(logical.to_u16().wrapping_add(self.app_key_offset))
    }
}

impl TimerService for TestPlatform {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn start_timer(&mut self, duration_ms: u64) {
        self.armed_timer_ms = Some(duration_ms);
        self.timer_starts += 1;
    }

    fn cancel_timer(&mut self) {
        self.armed_timer_ms = None;
        self.timer_cancels += 1;
    }
}

impl AddressResolver for TestPlatform {
    fn select_node_address(&self, node: NodeId, subnet: Option<u16>) -> PeerAddress {
        fabric_address(node, subnet)
    }

    fn begin_resolve(&mut self, binding: BindingId, hostname: &str) -> Result<(), ResolverError> {
        self.resolve_start_result.clone()?;
        self.resolves_begun.push((binding, hostname.to_string()));
        Ok(())
    }

    fn cancel_resolve(&mut self, binding: BindingId) {
        self.resolves_cancelled.push(binding);
    }
}

/// Deterministic fabric ULA for a node id.
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

pub fn make_manager(platform: &TestPlatform) -> ExchangeManager {
    ExchangeManager::new(ManagerConfig::default(), platform.now_ms)
}

pub fn make_manager_with(platform: &TestPlatform, config: ManagerConfig) -> ExchangeManager {
    ExchangeManager::new(config, platform.now_ms)
}

pub fn peer_address(port: u16) -> PeerAddress {
    PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port)
}
