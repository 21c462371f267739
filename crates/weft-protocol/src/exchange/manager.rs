//! The exchange manager: pools, dispatch, and message sending.
//!
//! One manager instance owns the context pool, the unsolicited handler
//! registry, the retransmission table, the tick clock, and the binding pool.
//! All mutation happens synchronously on the caller's single logical thread;
//! callers driving a manager from multiple threads must serialize externally.

use weft_core::constants::{MSG_TYPE_ACK, PROFILE_COMMON};
use weft_core::header::flags::ExchangeFlags;
use weft_core::header::wire::ExchangeHeader;
use weft_core::types::{MessageId, NodeId, ProfileId};

use crate::binding::pool::BindingPool;
use crate::binding::BindingState;
use crate::error::{ExchangeError, ReliableError};
use crate::exchange::context::ExchangeContext;
use crate::exchange::dispatch_rules::{self, ContextCreation, DropReason};
use crate::exchange::pool::{ContextId, ContextPool, ReleaseOutcome};
use crate::exchange::registry::{HandlerEntry, HandlerTable};
use crate::reliable::constants::DEFAULT_TICK_INTERVAL_MS;
use crate::reliable::engine::SendFailure;
use crate::reliable::table::{RetransEntry, RetransTable};
use crate::reliable::ticks::TickClock;
use crate::traits::Platform;
use crate::types::{ConnectionId, EncryptionKind, KeyRef, PeerAddress, RmpConfig};

/// Capacities and timing for one manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    pub context_capacity: usize,
    pub retrans_capacity: usize,
    pub handler_capacity: usize,
    pub binding_capacity: usize,
    pub tick_interval_ms: u32,
    pub rmp: RmpConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            context_capacity: 16,
            retrans_capacity: 8,
            handler_capacity: 8,
            binding_capacity: 8,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            rmp: RmpConfig::default(),
        }
    }
}

/// Message-layer metadata accompanying an inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    pub source: NodeId,
    pub address: PeerAddress,
    pub connection: Option<ConnectionId>,
    pub key: Option<KeyRef>,
    pub message_id: MessageId,
    /// Set by the message layer's duplicate detection.
    pub is_duplicate: bool,
}

/// Where an inbound message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered to a live exchange; the application routes the payload.
    Existing {
        context: ContextId,
        header: ExchangeHeader,
        payload_offset: usize,
    },
    /// A new conversation accepted by a registered unsolicited handler.
    Handler {
        handler_tag: u32,
        context: ContextId,
        header: ExchangeHeader,
        payload_offset: usize,
    },
    /// A stand-alone acknowledgment consumed by the reliable-messaging
    /// engine; nothing for the application.
    AckProcessed { context: ContextId },
    /// An ephemeral context acknowledged the message and was closed.
    AckSent,
    /// Discarded per protocol policy.
    Dropped(DropReason),
}

/// The session-layer manager instance.
pub struct ExchangeManager {
    pub(crate) contexts: ContextPool,
    pub(crate) handlers: HandlerTable,
    pub(crate) retrans: RetransTable,
    pub(crate) clock: TickClock,
    pub(crate) bindings: BindingPool,
    pub(crate) default_rmp: RmpConfig,
    next_message_id: u32,
}

impl ExchangeManager {
    /// Create a manager. `now_ms` anchors the tick clock; pass the
    /// platform's current monotonic time.
    pub fn new(config: ManagerConfig, now_ms: u64) -> Self {
        Self {
            contexts: ContextPool::new(config.context_capacity),
            handlers: HandlerTable::new(config.handler_capacity),
            retrans: RetransTable::new(config.retrans_capacity),
            clock: TickClock::new(config.tick_interval_ms, now_ms),
            bindings: BindingPool::new(config.binding_capacity),
            default_rmp: config.rmp,
            next_message_id: 1,
        }
    }

    // ------------------------------------------------------------------ //
    // Context allocation
    // ------------------------------------------------------------------ //

    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<&ExchangeContext> {
        self.contexts.get(id)
    }

    pub fn context_mut(&mut self, id: ContextId) -> Option<&mut ExchangeContext> {
        self.contexts.get_mut(id)
    }

    #[must_use]
    pub fn contexts_in_use(&self) -> usize {
        self.contexts.in_use()
    }

    /// Allocate an initiator context toward a peer address.
    pub fn new_context(
        &mut self,
        peer: NodeId,
        address: PeerAddress,
        app_tag: u32,
    ) -> Result<ContextId, ExchangeError> {
        let exchange_id = self.contexts.next_exchange_id();
        let ctx = ExchangeContext::new(peer, address, exchange_id, true, self.default_rmp)
            .with_app_tag(app_tag);
        self.contexts.insert(ctx).ok_or(ExchangeError::PoolExhausted)
    }

    /// Allocate an initiator context against a prepared (Ready) binding,
    /// inheriting its address, connection, security, and reliability config.
    pub fn new_bound_context<P: Platform>(
        &mut self,
        platform: &mut P,
        binding: crate::binding::BindingId,
        app_tag: u32,
    ) -> Result<ContextId, ExchangeError> {
        let (peer, address, connection, key, rmp) = {
            let b = self
                .bindings
                .get(binding)
                .ok_or(ExchangeError::BindingNotReady)?;
            if b.state() != BindingState::Ready {
                return Err(ExchangeError::BindingNotReady);
            }
            let peer = b.peer().ok_or(ExchangeError::BindingNotReady)?;
            let address = b.peer_address().ok_or(ExchangeError::BindingNotReady)?;
            let key = match b.security() {
                crate::binding::SecurityOption::None => None,
                crate::binding::SecurityOption::Key(logical) => Some(KeyRef::new(
                    platform.current_app_key_id(*logical),
                    EncryptionKind::Aes128,
                )),
                _ => b.session_key(),
            };
            (peer, address, b.connection(), key, b.rmp_config())
        };

        if let Some(conn) = connection {
            platform.retain_connection(conn);
        }
        if let Some(key) = key {
            if let Err(e) = platform.reserve_key(peer, key.key_id) {
                if let Some(conn) = connection {
                    platform.release_connection(conn);
                }
                return Err(e.into());
            }
        }

        let exchange_id = self.contexts.next_exchange_id();
        let mut ctx = ExchangeContext::new(peer, address, exchange_id, true, rmp)
            .with_app_tag(app_tag);
        ctx.connection = connection;
        ctx.auto_release_connection = connection.is_some();
        ctx.key = key;
        ctx.auto_release_key = key.is_some();

        match self.contexts.insert(ctx) {
            Some(id) => Ok(id),
            None => {
                if let Some(key) = key {
                    platform.release_key(peer, key.key_id);
                }
                if let Some(conn) = connection {
                    platform.release_connection(conn);
                }
                Err(ExchangeError::PoolExhausted)
            }
        }
    }

    /// Exact-match scan for an existing outbound context, used by higher
    /// layers to de-duplicate allocation requests.
    #[must_use]
    pub fn find_context(
        &self,
        peer: NodeId,
        connection: Option<ConnectionId>,
        app_tag: u32,
        initiator: bool,
    ) -> Option<ContextId> {
        self.contexts.find(peer, connection, app_tag, initiator)
    }

    pub fn retain_context(&mut self, context: ContextId) -> Result<(), ExchangeError> {
        if self.contexts.retain(context) {
            Ok(())
        } else {
            Err(ExchangeError::UnknownContext)
        }
    }

    /// Drop one reference without touching in-flight retransmissions; they
    /// keep the context alive until acknowledged or exhausted.
    pub fn release_context<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
    ) -> Result<(), ExchangeError> {
        if self.contexts.get(context).is_none() {
            return Err(ExchangeError::UnknownContext);
        }
        self.release_context_ref(platform, context);
        Ok(())
    }

    /// Graceful close: flush any pending acknowledgment, then drop the
    /// application's reference.
    pub fn close_context<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
    ) -> Result<(), ExchangeError> {
        self.expire_ticks(platform);
        let ctx = self
            .contexts
            .get_mut(context)
            .ok_or(ExchangeError::UnknownContext)?;
        let pending = ctx.take_pending_ack();
        let drop_ack = ctx.drop_ack;
        if let Some(ack) = pending {
            if !drop_ack {
                self.send_standalone_ack(platform, context, ack);
            }
        }
        self.release_context_ref(platform, context);
        self.start_timer(platform);
        Ok(())
    }

    /// Abort: clear the context's retransmit entries with
    /// [`ReliableError::ExchangeClosed`], then drop the application's
    /// reference.
    pub fn abort_context<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
    ) -> Result<Vec<SendFailure>, ExchangeError> {
        if self.contexts.get(context).is_none() {
            return Err(ExchangeError::UnknownContext);
        }
        self.expire_ticks(platform);
        let failures = self.fail_entries_for(platform, context, ReliableError::ExchangeClosed);
        self.release_context_ref(platform, context);
        self.start_timer(platform);
        Ok(failures)
    }

    /// Drop one pool reference and release any auto-released resources when
    /// the slot frees.
    pub(crate) fn release_context_ref<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
    ) {
        match self.contexts.release(context) {
            Some(ReleaseOutcome::Freed(freed)) => {
                if let Some((peer, key)) = freed.key {
                    platform.release_key(peer, key.key_id);
                }
                if let Some(conn) = freed.connection {
                    platform.release_connection(conn);
                }
            }
            Some(ReleaseOutcome::Retained(_)) | None => {}
        }
    }

    // ------------------------------------------------------------------ //
    // Unsolicited handlers
    // ------------------------------------------------------------------ //

    pub fn register_unsolicited_handler(&mut self, entry: HandlerEntry) -> Result<(), ExchangeError> {
        self.handlers.register(entry)
    }

    pub fn unregister_unsolicited_handler(
        &mut self,
        profile_id: ProfileId,
        message_type: Option<u8>,
        connection: Option<ConnectionId>,
    ) -> Result<(), ExchangeError> {
        self.handlers.unregister(profile_id, message_type, connection)
    }

    // ------------------------------------------------------------------ //
    // Inbound dispatch
    // ------------------------------------------------------------------ //

    /// Decode and route one inbound message.
    ///
    /// Errors abort dispatch of this one message only; the manager remains
    /// fully usable.
    pub fn on_message_received<P: Platform>(
        &mut self,
        platform: &mut P,
        info: &MessageInfo,
        raw: &[u8],
    ) -> Result<Dispatch, ExchangeError> {
        let (header, payload_offset) = match ExchangeHeader::decode(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    source = %info.source,
                    error = %e,
                    "dropping message with undecodable exchange header"
                );
                return Err(e.into());
            }
        };

        self.expire_ticks(platform);
        let result = self.dispatch(platform, info, header, payload_offset);
        self.start_timer(platform);
        result
    }

    fn dispatch<P: Platform>(
        &mut self,
        platform: &mut P,
        info: &MessageInfo,
        header: ExchangeHeader,
        payload_offset: usize,
    ) -> Result<Dispatch, ExchangeError> {
        // Step 1: match a live context. First match wins, in allocation order.
        let matched = self
            .contexts
            .iter_live()
            .find(|(_, ctx)| dispatch_rules::context_matches(ctx, &header, info.source, info.connection))
            .map(|(id, _)| id);

        if let Some(id) = matched {
            if let Some(ack_id) = header.ack_message_id {
                self.process_ack(platform, id, ack_id);
            }

            // Clearing the acknowledged entry may have dropped the last
            // reference to an already-released context.
            let Some(ctx) = self.contexts.get_mut(id) else {
                return Ok(Dispatch::AckProcessed { context: id });
            };
            ctx.msg_received_from_peer = true;

            let standalone_ack = header.profile_id.to_u32() == PROFILE_COMMON
                && header.message_type == MSG_TYPE_ACK;

            if header.flags.needs_ack && !ctx.drop_ack {
                ctx.schedule_ack(info.message_id);
            }

            if standalone_ack {
                return Ok(Dispatch::AckProcessed { context: id });
            }
            return Ok(Dispatch::Existing {
                context: id,
                header,
                payload_offset,
            });
        }

        // Step 2: admissibility of a message that opened no known exchange.
        if !dispatch_rules::unsolicited_admissible(header.flags.initiator, header.flags.needs_ack) {
            tracing::debug!(
                source = %info.source,
                exchange_id = %header.exchange_id,
                "unsolicited message without originator flag dropped"
            );
            return Err(ExchangeError::UnsolicitedWithoutOriginator);
        }

        // Step 3: most-specific handler lookup (initiator messages only).
        let handler = if dispatch_rules::handler_lookup_applies(header.flags.initiator) {
            self.handlers
                .lookup(header.profile_id, header.message_type, info.connection)
                .copied()
        } else {
            None
        };

        // Step 4: the creation policy table.
        let creation = dispatch_rules::decide_context_creation(
            handler.is_some(),
            handler.is_some_and(|h| h.allow_duplicates),
            info.is_duplicate,
            header.flags.needs_ack,
        );

        match creation {
            ContextCreation::None => {
                if info.is_duplicate {
                    tracing::debug!(
                        source = %info.source,
                        message_id = %info.message_id,
                        "duplicate message suppressed"
                    );
                    Ok(Dispatch::Dropped(DropReason::DuplicateSuppressed))
                } else {
                    tracing::debug!(
                        profile = %header.profile_id,
                        message_type = header.message_type,
                        "no unsolicited handler for message"
                    );
                    Err(ExchangeError::HandlerNotFound)
                }
            }
            ContextCreation::AckOnly => {
                let id = self.create_responder_context(platform, info, &header)?;
                self.send_standalone_ack(platform, id, info.message_id);
                self.release_context_ref(platform, id);
                Ok(Dispatch::AckSent)
            }
            ContextCreation::ForHandler => {
                let handler = handler.ok_or(ExchangeError::HandlerNotFound)?;
                let id = self.create_responder_context(platform, info, &header)?;
                let ctx = self.contexts.get_mut(id).ok_or(ExchangeError::UnknownContext)?;
                ctx.msg_received_from_peer = true;
                if header.flags.needs_ack {
                    ctx.schedule_ack(info.message_id);
                }
                tracing::debug!(
                    context = %id,
                    handler_tag = handler.handler_tag,
                    profile = %header.profile_id,
                    "unsolicited message accepted"
                );
                Ok(Dispatch::Handler {
                    handler_tag: handler.handler_tag,
                    context: id,
                    header,
                    payload_offset,
                })
            }
        }
    }

    /// Allocate a responder-side context for an inbound message, reserving
    /// its encryption key for the context's lifetime.
    fn create_responder_context<P: Platform>(
        &mut self,
        platform: &mut P,
        info: &MessageInfo,
        header: &ExchangeHeader,
    ) -> Result<ContextId, ExchangeError> {
        if let Some(key) = info.key {
            platform.reserve_key(info.source, key.key_id)?;
        }

        let mut ctx = ExchangeContext::new(
            info.source,
            info.address,
            header.exchange_id,
            !header.flags.initiator,
            self.default_rmp,
        );
        ctx.connection = info.connection;
        ctx.key = info.key;
        ctx.auto_release_key = info.key.is_some();

        match self.contexts.insert(ctx) {
            Some(id) => Ok(id),
            None => {
                if let Some(key) = info.key {
                    platform.release_key(info.source, key.key_id);
                }
                tracing::warn!(source = %info.source, "context pool exhausted; message dropped");
                Err(ExchangeError::PoolExhausted)
            }
        }
    }

    // ------------------------------------------------------------------ //
    // Sending
    // ------------------------------------------------------------------ //

    /// Send a message with at-least-once delivery tracking.
    ///
    /// A pending acknowledgment for this exchange is piggybacked. A transient
    /// transport failure leaves the entry in the table for the next
    /// retransmission pass; a fatal one removes it and is returned.
    pub fn send_reliable<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        profile_id: ProfileId,
        message_type: u8,
        payload: &[u8],
        send_tag: u32,
    ) -> Result<MessageId, ReliableError> {
        self.expire_ticks(platform);
        let message_id = self.alloc_message_id();

        let ctx = self
            .contexts
            .get_mut(context)
            .ok_or(ReliableError::UnknownContext)?;
        let ack = ctx.take_pending_ack();
        let header = ExchangeHeader {
            flags: ExchangeFlags {
                initiator: ctx.initiator,
                needs_ack: true,
                ack_id_present: ack.is_some(),
            },
            message_type,
            exchange_id: ctx.exchange_id,
            profile_id,
            ack_message_id: ack,
        };
        let mut buffer = header.encode();
        buffer.extend_from_slice(payload);
        let target = ctx.send_target();
        let tick = ctx.current_retransmit_ticks();

        let entry = RetransEntry {
            context,
            message_id,
            buffer,
            send_tag,
            send_count: 1,
            next_retransmit_tick: tick,
        };
        let index = match self.retrans.insert(entry) {
            Ok(index) => index,
            Err(e) => {
                // Undo the piggyback so the peer's ack is not lost.
                if let Some(ack) = ack {
                    if let Some(ctx) = self.contexts.get_mut(context) {
                        ctx.schedule_ack(ack);
                    }
                }
                return Err(e);
            }
        };
        self.contexts.retain(context);

        let buffer = &self
            .retrans
            .get(index)
            .ok_or(ReliableError::UnknownContext)?
            .buffer;
        match platform.send_message(&target, buffer) {
            Ok(()) => {
                tracing::debug!(
                    context = %context,
                    message_id = %message_id,
                    profile = %profile_id,
                    "reliable send"
                );
            }
            Err(e) if e.is_transient() => {
                tracing::debug!(
                    context = %context,
                    message_id = %message_id,
                    error = %e,
                    "initial send deferred; will retry on tick"
                );
            }
            Err(e) => {
                self.clear_entry_at(platform, index);
                self.start_timer(platform);
                return Err(e.into());
            }
        }

        self.start_timer(platform);
        Ok(message_id)
    }

    /// Send without delivery tracking; a pending ack is still piggybacked.
    pub fn send_best_effort<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        profile_id: ProfileId,
        message_type: u8,
        payload: &[u8],
    ) -> Result<MessageId, ReliableError> {
        self.expire_ticks(platform);
        let message_id = self.alloc_message_id();

        let ctx = self
            .contexts
            .get_mut(context)
            .ok_or(ReliableError::UnknownContext)?;
        let ack = ctx.take_pending_ack();
        let header = ExchangeHeader {
            flags: ExchangeFlags {
                initiator: ctx.initiator,
                needs_ack: false,
                ack_id_present: ack.is_some(),
            },
            message_type,
            exchange_id: ctx.exchange_id,
            profile_id,
            ack_message_id: ack,
        };
        let mut buffer = header.encode();
        buffer.extend_from_slice(payload);
        let target = ctx.send_target();

        platform.send_message(&target, &buffer)?;
        self.start_timer(platform);
        Ok(message_id)
    }

    /// Pause retransmissions toward this exchange's peer for `ticks`.
    pub fn set_send_throttle<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        ticks: u16,
    ) -> Result<(), ExchangeError> {
        self.expire_ticks(platform);
        let ctx = self
            .contexts
            .get_mut(context)
            .ok_or(ExchangeError::UnknownContext)?;
        ctx.throttle_ticks = ticks;
        tracing::debug!(context = %context, ticks, "send throttle set");
        self.start_timer(platform);
        Ok(())
    }

    /// Emit a stand-alone acknowledgment for `ack` on this exchange.
    ///
    /// A failed ack send is logged and otherwise ignored; the peer's
    /// retransmission re-triggers it.
    pub(crate) fn send_standalone_ack<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        ack: MessageId,
    ) {
        let Some(ctx) = self.contexts.get(context) else {
            return;
        };
        let header = ExchangeHeader {
            flags: ExchangeFlags {
                initiator: ctx.initiator,
                needs_ack: false,
                ack_id_present: true,
            },
            message_type: MSG_TYPE_ACK,
            exchange_id: ctx.exchange_id,
            profile_id: ProfileId::new(PROFILE_COMMON),
            ack_message_id: Some(ack),
        };
        let target = ctx.send_target();
        match platform.send_message(&target, &header.encode()) {
            Ok(()) => {
                tracing::trace!(context = %context, message_id = %ack, "stand-alone ack sent");
            }
            Err(e) => {
                tracing::warn!(context = %context, error = %e, "stand-alone ack send failed");
            }
        }
    }

    pub(crate) fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}
