//! Fixed-capacity retransmission table.
//!
//! Each entry associates an exchange context (held via an extra pool
//! reference taken by the manager) with an owned outbound buffer and its
//! retransmission countdown. Exceeding the capacity is a reportable error,
//! never silent loss.

use weft_core::types::MessageId;

use crate::error::ReliableError;
use crate::exchange::pool::ContextId;
use crate::reliable::ticks::decrement_clamped;

/// One in-flight unacknowledged send.
#[derive(Debug)]
pub struct RetransEntry {
    pub context: ContextId,
    pub message_id: MessageId,
    pub buffer: Vec<u8>,
    /// Caller-opaque tag surfaced with the send-error callback.
    pub send_tag: u32,
    /// Sends performed so far (the initial send counts).
    pub send_count: u8,
    pub next_retransmit_tick: u16,
}

/// Fixed-capacity table of in-flight sends.
pub struct RetransTable {
    slots: Vec<Option<RetransEntry>>,
}

impl RetransTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an entry, failing with [`ReliableError::TableFull`] when no slot
    /// is free.
    pub fn insert(&mut self, entry: RetransEntry) -> Result<usize, ReliableError> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(ReliableError::TableFull)?;
        tracing::debug!(
            slot = index,
            context = %entry.context,
            message_id = %entry.message_id,
            tick = entry.next_retransmit_tick,
            "retransmit entry added"
        );
        self.slots[index] = Some(entry);
        Ok(index)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RetransEntry> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RetransEntry> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Zero the slot, returning the entry (buffer freed with it).
    pub fn clear(&mut self, index: usize) -> Option<RetransEntry> {
        self.slots.get_mut(index)?.take()
    }

    /// Find the entry acknowledged by `message_id` on `context`.
    #[must_use]
    pub fn find_ack(&self, context: ContextId, message_id: MessageId) -> Option<usize> {
        self.iter()
            .find(|(_, entry)| entry.context == context && entry.message_id == message_id)
            .map(|(index, _)| index)
    }

    /// Remove and return every entry owned by `context`.
    pub fn take_for_context(&mut self, context: ContextId) -> Vec<RetransEntry> {
        let mut taken = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|entry| entry.context == context) {
                taken.push(slot.take().expect("slot checked occupied"));
            }
        }
        taken
    }

    /// Decrement every entry's countdown by `elapsed` ticks, clamped at zero.
    pub fn decrement_all(&mut self, elapsed: u64) {
        for entry in self.slots.iter_mut().flatten() {
            entry.next_retransmit_tick = decrement_clamped(entry.next_retransmit_tick, elapsed);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RetransEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (index, entry)))
    }

    /// Indices of occupied slots, for iteration that mutates the table.
    #[must_use]
    pub fn occupied_indices(&self) -> Vec<usize> {
        self.iter().map(|(index, _)| index).collect()
    }
}
