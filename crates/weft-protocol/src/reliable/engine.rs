//! Retransmission engine operations on the exchange manager.
//!
//! The engine never wakes periodically: `expire_ticks` folds elapsed real
//! time into every countdown, `execute_actions` performs everything that is
//! due, and `start_timer` arms one real timer for the single nearest
//! deadline across acknowledgments, retransmissions, and throttles.

use weft_core::types::{KeyId, MessageId};

use crate::binding::BindingEvent;
use crate::error::ReliableError;
use crate::exchange::manager::ExchangeManager;
use crate::exchange::pool::ContextId;
use crate::reliable::ticks::{decrement_clamped, TimerCommand};
use crate::traits::Platform;

/// One asynchronous delivery failure, surfaced from an engine pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub context: ContextId,
    /// The caller-opaque tag given to `send_reliable`.
    pub send_tag: u32,
    pub error: ReliableError,
}

impl ExchangeManager {
    /// Fold elapsed real time into every pending countdown.
    ///
    /// Must precede any read or mutation of a countdown so all counters stay
    /// consistent relative to now. Countdowns clamp at zero; the time base
    /// advances by whole ticks only.
    pub fn expire_ticks<P: Platform>(&mut self, platform: &P) {
        let elapsed = self.clock.expire(platform.now_ms());
        if elapsed == 0 {
            return;
        }
        for id in self.contexts.live_ids() {
            let Some(ctx) = self.contexts.get_mut(id) else {
                continue;
            };
            if ctx.ack_pending {
                ctx.next_ack_tick = decrement_clamped(ctx.next_ack_tick, elapsed);
            }
            ctx.throttle_ticks = decrement_clamped(ctx.throttle_ticks, elapsed);
        }
        self.retrans.decrement_all(elapsed);
    }

    /// Perform everything that is due: send stand-alone acknowledgments whose
    /// piggyback window closed, retransmit or fail in-flight sends.
    ///
    /// All due actions are handled in one pass before the timer is re-armed,
    /// so no virtual tick is ever lost.
    pub fn execute_actions<P: Platform>(&mut self, platform: &mut P) -> Vec<SendFailure> {
        let mut failures = Vec::new();

        // Acknowledgments whose piggyback window closed.
        let due_acks: Vec<ContextId> = self
            .contexts
            .iter_live()
            .filter(|(_, ctx)| ctx.ack_pending && ctx.next_ack_tick == 0)
            .map(|(id, _)| id)
            .collect();
        for id in due_acks {
            let Some(ctx) = self.contexts.get_mut(id) else {
                continue;
            };
            let drop_ack = ctx.drop_ack;
            let Some(ack) = ctx.take_pending_ack() else {
                continue;
            };
            if drop_ack {
                tracing::debug!(context = %id, message_id = %ack, "suppressing due ack (drop_ack set)");
            } else {
                self.send_standalone_ack(platform, id, ack);
            }
        }

        // Due retransmissions.
        for index in self.retrans.occupied_indices() {
            let (context, send_count, send_tag) = match self.retrans.get(index) {
                Some(entry) if entry.next_retransmit_tick == 0 => {
                    (entry.context, entry.send_count, entry.send_tag)
                }
                _ => continue,
            };

            let (throttled, max_retransmissions, target, next_tick) =
                match self.contexts.get(context) {
                    Some(ctx) => (
                        ctx.throttle_ticks > 0,
                        ctx.rmp.max_retransmissions,
                        ctx.send_target(),
                        ctx.current_retransmit_ticks(),
                    ),
                    None => {
                        self.retrans.clear(index);
                        continue;
                    }
                };
            if throttled {
                continue;
            }

            if send_count > max_retransmissions {
                self.clear_entry_at(platform, index);
                tracing::warn!(
                    context = %context,
                    send_count,
                    "message not acknowledged; giving up"
                );
                failures.push(SendFailure {
                    context,
                    send_tag,
                    error: ReliableError::NotAcknowledged(send_count),
                });
                continue;
            }

            let send_result = {
                let Some(entry) = self.retrans.get(index) else {
                    continue;
                };
                platform.send_message(&target, &entry.buffer)
            };
            match send_result {
                Ok(()) => {
                    if let Some(entry) = self.retrans.get_mut(index) {
                        entry.send_count += 1;
                        entry.next_retransmit_tick = next_tick;
                        tracing::debug!(
                            context = %context,
                            message_id = %entry.message_id,
                            send_count = entry.send_count,
                            "retransmitted"
                        );
                    }
                }
                Err(e) if e.is_transient() => {
                    // No-op retry: the entry stays, the send does not count.
                    if let Some(entry) = self.retrans.get_mut(index) {
                        entry.next_retransmit_tick = next_tick;
                    }
                    tracing::debug!(context = %context, error = %e, "retransmit deferred");
                }
                Err(e) => {
                    self.clear_entry_at(platform, index);
                    failures.push(SendFailure {
                        context,
                        send_tag,
                        error: ReliableError::Transport(e),
                    });
                }
            }
        }

        failures
    }

    /// Arm one real timer for the minimum pending countdown, re-arming only
    /// when the deadline changed and cancelling when nothing is pending.
    ///
    /// Callers must have expired ticks (and normally executed due actions)
    /// first.
    pub fn start_timer<P: Platform>(&mut self, platform: &mut P) {
        let min = self.min_pending_tick();
        match self.clock.schedule(min, platform.now_ms()) {
            TimerCommand::Arm { duration_ms } => platform.start_timer(duration_ms),
            TimerCommand::Cancel => platform.cancel_timer(),
            TimerCommand::Unchanged => {}
        }
    }

    /// Minimum countdown across pending acks and retransmit entries; a
    /// throttled exchange's entries become due when both the entry countdown
    /// and the throttle have lapsed.
    fn min_pending_tick(&self) -> Option<u16> {
        let mut min: Option<u16> = None;
        let mut fold = |tick: u16| {
            min = Some(min.map_or(tick, |m| m.min(tick)));
        };

        for (_, ctx) in self.contexts.iter_live() {
            if ctx.ack_pending {
                fold(ctx.next_ack_tick);
            }
        }
        for (_, entry) in self.retrans.iter() {
            let effective = match self.contexts.get(entry.context) {
                Some(ctx) if ctx.throttle_ticks > 0 => {
                    entry.next_retransmit_tick.max(ctx.throttle_ticks)
                }
                _ => entry.next_retransmit_tick,
            };
            fold(effective);
        }
        min
    }

    /// The single real timer fired: expire, act, re-arm.
    pub fn on_timer_fired<P: Platform>(&mut self, platform: &mut P) -> Vec<SendFailure> {
        self.clock.timer_lapsed();
        self.expire_ticks(platform);
        let failures = self.execute_actions(platform);
        self.start_timer(platform);
        failures
    }

    /// An inbound acknowledgment for `message_id` on `context`.
    pub(crate) fn process_ack<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        message_id: MessageId,
    ) {
        match self.retrans.find_ack(context, message_id) {
            Some(index) => {
                tracing::debug!(context = %context, message_id = %message_id, "send acknowledged");
                self.clear_entry_at(platform, index);
            }
            None => {
                tracing::trace!(
                    context = %context,
                    message_id = %message_id,
                    "ack for unknown send ignored"
                );
            }
        }
    }

    /// Zero one table slot and drop its context reference.
    pub(crate) fn clear_entry_at<P: Platform>(&mut self, platform: &mut P, index: usize) {
        if let Some(entry) = self.retrans.clear(index) {
            self.release_context_ref(platform, entry.context);
        }
    }

    /// Clear every entry owned by `context`, surfacing `error` for each.
    ///
    /// Used on key failure, session loss, and exchange abort.
    pub fn fail_entries_for<P: Platform>(
        &mut self,
        platform: &mut P,
        context: ContextId,
        error: ReliableError,
    ) -> Vec<SendFailure> {
        let taken = self.retrans.take_for_context(context);
        let mut failures = Vec::with_capacity(taken.len());
        for entry in taken {
            self.release_context_ref(platform, entry.context);
            failures.push(SendFailure {
                context,
                send_tag: entry.send_tag,
                error: error.clone(),
            });
        }
        failures
    }

    /// The security service reports a key as failed: abort the retransmit
    /// entries of every exchange using it and fail every binding holding a
    /// reservation on it. Unrelated exchanges and bindings are untouched.
    pub fn on_key_failed<P: Platform>(
        &mut self,
        platform: &mut P,
        key: KeyId,
    ) -> (Vec<SendFailure>, Vec<BindingEvent>) {
        self.expire_ticks(platform);

        let affected: Vec<ContextId> = self
            .contexts
            .iter_live()
            .filter(|(_, ctx)| ctx.key.is_some_and(|k| k.key_id == key))
            .map(|(id, _)| id)
            .collect();
        let mut failures = Vec::new();
        for id in affected {
            tracing::warn!(context = %id, key = %key, "key failed; clearing in-flight sends");
            failures.extend(self.fail_entries_for(platform, id, ReliableError::KeyFailed));
        }

        let events = self.fail_bindings_with_key(key);
        self.start_timer(platform);
        (failures, events)
    }
}
