//! Shared session-layer types.
//!
//! Peer addressing, connection handles, key references, and the per-exchange
//! reliability configuration.

use std::fmt;
use std::net::IpAddr;

use weft_core::types::KeyId;

use crate::reliable::constants::{
    DEFAULT_ACK_PIGGYBACK_TICKS, DEFAULT_ACTIVE_RETRANSMIT_TICKS, DEFAULT_INITIAL_RETRANSMIT_TICKS,
    DEFAULT_MAX_RETRANSMISSIONS,
};

/// A resolved peer endpoint: IP address, port, and optional interface index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub port: u16,
    pub interface: Option<u32>,
}

impl PeerAddress {
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            interface: None,
        }
    }

    pub const fn with_interface(mut self, interface: u32) -> Self {
        self.interface = Some(interface);
        self
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interface {
            Some(iface) => write!(f, "{}:{}%{}", self.ip, self.port, iface),
            None => write!(f, "{}:{}", self.ip, self.port),
        }
    }
}

/// Handle to a transport connection object owned by the message layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Encryption applied to messages on an exchange or binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionKind {
    Aes128,
}

/// A non-owning reference to an encryption key tracked by the security
/// service. Absence of a `KeyRef` means the traffic is unencrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct KeyRef {
    pub key_id: KeyId,
    pub encryption: EncryptionKind,
}

impl KeyRef {
    pub const fn new(key_id: KeyId, encryption: EncryptionKind) -> Self {
        Self { key_id, encryption }
    }
}

/// Where to send a message: an owning connection if one exists, otherwise the
/// peer's datagram address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct SendTarget {
    pub connection: Option<ConnectionId>,
    pub address: PeerAddress,
}

/// Per-exchange reliable-messaging configuration, in virtual ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmpConfig {
    /// Retransmission countdown before the first message from the peer.
    pub initial_retransmit_ticks: u16,
    /// Retransmission countdown once the peer has proven responsive.
    pub active_retransmit_ticks: u16,
    /// Retransmissions attempted before the send is failed.
    pub max_retransmissions: u8,
    /// How long an acknowledgment may wait for a message to piggyback on.
    pub ack_piggyback_ticks: u16,
}

impl Default for RmpConfig {
    fn default() -> Self {
        Self {
            initial_retransmit_ticks: DEFAULT_INITIAL_RETRANSMIT_TICKS,
            active_retransmit_ticks: DEFAULT_ACTIVE_RETRANSMIT_TICKS,
            max_retransmissions: DEFAULT_MAX_RETRANSMISSIONS,
            ack_piggyback_ticks: DEFAULT_ACK_PIGGYBACK_TICKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn peer_address_display_without_interface() {
        let addr = PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7117);
        assert_eq!(format!("{addr}"), "::1:7117");
    }

    #[test]
    fn peer_address_display_with_interface() {
        let addr = PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7117).with_interface(3);
        assert_eq!(format!("{addr}"), "::1:7117%3");
    }

    #[test]
    fn rmp_config_default_matches_vectors() {
        let v = weft_test_vectors::retry_ticks::load();
        let config = RmpConfig::default();
        assert_eq!(
            config.initial_retransmit_ticks as u64,
            v.constants.default_initial_retransmit_ticks
        );
        assert_eq!(
            config.active_retransmit_ticks as u64,
            v.constants.default_active_retransmit_ticks
        );
        assert_eq!(
            config.max_retransmissions as u64,
            v.constants.default_max_retransmissions
        );
        assert_eq!(
            config.ack_piggyback_ticks as u64,
            v.constants.default_ack_piggyback_ticks
        );
    }
}
