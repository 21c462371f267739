//! Fixed-capacity, reference-counted binding pool.

use std::fmt;

use crate::binding::{Binding, BindingState};

/// Index of a live slot in the binding pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct BindingId(pub(crate) u16);

impl BindingId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingId({})", self.0)
    }
}

/// Result of dropping one reference to a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRelease {
    Retained(u32),
    Freed,
}

/// The fixed-capacity binding arena.
pub struct BindingPool {
    slots: Vec<Option<Binding>>,
}

impl BindingPool {
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
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Allocate a fresh `NotConfigured` binding with one reference.
    pub fn allocate(&mut self) -> Option<BindingId> {
        let index = self.slots.iter().position(|slot| slot.is_none())?;
        let mut binding = Binding::new();
        binding.ref_count = 1;
        self.slots[index] = Some(binding);
        tracing::debug!(binding = index, "binding allocated");
        Some(BindingId(index as u16))
    }

    #[must_use]
    pub fn get(&self, id: BindingId) -> Option<&Binding> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: BindingId) -> Option<&mut Binding> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Add one reference. Returns false if the slot is not live.
    pub fn retain(&mut self, id: BindingId) -> bool {
        match self.get_mut(id) {
            Some(binding) => {
                binding.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference; a `Closed` binding's slot is reclaimed when the
    /// count reaches zero.
    pub fn release(&mut self, id: BindingId) -> Option<BindingRelease> {
        let slot = self.slots.get_mut(id.index())?;
        let binding = slot.as_mut()?;
        binding.ref_count = binding.ref_count.saturating_sub(1);
        if binding.ref_count > 0 {
            return Some(BindingRelease::Retained(binding.ref_count));
        }
        if binding.state == BindingState::Closed {
            *slot = None;
            tracing::debug!(binding = id.index(), "binding slot reclaimed");
        }
        Some(BindingRelease::Freed)
    }

    /// Iterate live slots in allocation order.
    pub fn iter_live(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|b| (BindingId(index as u16), b)))
    }

    /// Ids of all live slots, for iteration that mutates the pool.
    #[must_use]
    pub fn live_ids(&self) -> Vec<BindingId> {
        self.iter_live().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_until_exhausted() {
        let mut pool = BindingPool::new(2);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn fresh_binding_starts_not_configured() {
        let mut pool = BindingPool::new(1);
        let id = pool.allocate().unwrap();
        let binding = pool.get(id).unwrap();
        assert_eq!(binding.state(), BindingState::NotConfigured);
        assert_eq!(binding.ref_count(), 1);
    }

    #[test]
    fn slot_reclaimed_only_when_closed_and_unreferenced() {
        let mut pool = BindingPool::new(1);
        let id = pool.allocate().unwrap();
        pool.retain(id);

        pool.get_mut(id).unwrap().state = BindingState::Closed;
        assert_eq!(pool.release(id), Some(BindingRelease::Retained(1)));
        assert!(pool.get(id).is_some());

        assert_eq!(pool.release(id), Some(BindingRelease::Freed));
        assert!(pool.get(id).is_none());
        assert!(pool.allocate().is_some(), "slot is reusable after reclaim");
    }

    #[test]
    fn unclosed_binding_is_not_reclaimed_at_zero() {
        let mut pool = BindingPool::new(1);
        let id = pool.allocate().unwrap();
        assert_eq!(pool.release(id), Some(BindingRelease::Freed));
        // The slot stays live so state is introspectable until closed.
        assert!(pool.get(id).is_some());
    }
}
