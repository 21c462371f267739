//! Per-conversation exchange state.

use weft_core::types::{ExchangeId, MessageId, NodeId};

use crate::types::{ConnectionId, KeyRef, PeerAddress, RmpConfig, SendTarget};

/// One conversation with a peer.
///
/// A context is shared between the application, the retransmission table, and
/// the dispatcher; the pool tracks the reference count and returns the slot
/// exactly when the count reaches zero.
#[derive(Debug)]
pub struct ExchangeContext {
    pub peer: NodeId,
    pub address: PeerAddress,
    pub connection: Option<ConnectionId>,
    pub exchange_id: ExchangeId,
    pub key: Option<KeyRef>,
    pub initiator: bool,
    /// Opaque application tag used for outbound allocation de-duplication.
    pub app_tag: u32,
    pub rmp: RmpConfig,

    // Reliable-messaging bookkeeping.
    pub ack_pending: bool,
    pub next_ack_tick: u16,
    pub pending_ack_id: Option<MessageId>,
    pub msg_received_from_peer: bool,
    /// Debug aid: suppress outbound acknowledgments to exercise peer
    /// retransmission.
    pub drop_ack: bool,
    /// Outbound sends for this exchange are paused while nonzero.
    pub throttle_ticks: u16,

    // Ownership bookkeeping resolved when the slot is freed.
    pub auto_release_key: bool,
    pub auto_release_connection: bool,

    pub(crate) ref_count: u32,
}

impl ExchangeContext {
    pub fn new(
        peer: NodeId,
        address: PeerAddress,
        exchange_id: ExchangeId,
        initiator: bool,
        rmp: RmpConfig,
    ) -> Self {
        Self {
            peer,
            address,
            connection: None,
            exchange_id,
            key: None,
            initiator,
            app_tag: 0,
            rmp,
            ack_pending: false,
            next_ack_tick: 0,
            pending_ack_id: None,
            msg_received_from_peer: false,
            drop_ack: false,
            throttle_ticks: 0,
            auto_release_key: false,
            auto_release_connection: false,
            ref_count: 0,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_key(mut self, key: KeyRef) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_app_tag(mut self, app_tag: u32) -> Self {
        self.app_tag = app_tag;
        self
    }

    /// Where outbound messages for this exchange go.
    pub fn send_target(&self) -> SendTarget {
        SendTarget {
            connection: self.connection,
            address: self.address,
        }
    }

    /// The retransmission countdown to use for the next tracked send:
    /// shorter once the peer has proven responsive.
    #[must_use]
    pub fn current_retransmit_ticks(&self) -> u16 {
        if self.msg_received_from_peer {
            self.rmp.active_retransmit_ticks
        } else {
            self.rmp.initial_retransmit_ticks
        }
    }

    /// Record that an acknowledgment for `message_id` is owed to the peer.
    pub fn schedule_ack(&mut self, message_id: MessageId) {
        self.ack_pending = true;
        self.pending_ack_id = Some(message_id);
        self.next_ack_tick = self.rmp.ack_piggyback_ticks;
    }

    /// Consume the pending acknowledgment, if any, for piggybacking.
    pub fn take_pending_ack(&mut self) -> Option<MessageId> {
        let ack = self.pending_ack_id.take();
        self.ack_pending = false;
        self.next_ack_tick = 0;
        ack
    }

    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv6Addr};

    fn make_context() -> ExchangeContext {
        ExchangeContext::new(
            NodeId::new(7),
            PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7117),
            ExchangeId::new(1),
            true,
            RmpConfig::default(),
        )
    }

    #[test]
    fn retransmit_ticks_initial_before_first_inbound() {
        let ctx = make_context();
        assert_eq!(
            ctx.current_retransmit_ticks(),
            ctx.rmp.initial_retransmit_ticks
        );
    }

    #[test]
    fn retransmit_ticks_active_after_inbound() {
        let mut ctx = make_context();
        ctx.msg_received_from_peer = true;
        assert_eq!(
            ctx.current_retransmit_ticks(),
            ctx.rmp.active_retransmit_ticks
        );
    }

    #[test]
    fn schedule_and_take_pending_ack() {
        let mut ctx = make_context();
        ctx.schedule_ack(MessageId::new(9));
        assert!(ctx.ack_pending);
        assert_eq!(ctx.next_ack_tick, ctx.rmp.ack_piggyback_ticks);

        assert_eq!(ctx.take_pending_ack(), Some(MessageId::new(9)));
        assert!(!ctx.ack_pending);
        assert_eq!(ctx.take_pending_ack(), None);
    }
}
