//! Fixed-capacity, reference-counted exchange context pool.
//!
//! Slots are arena-indexed: `insert` scans for a free slot and returns its
//! index as a [`ContextId`], `release` decrements the reference count and
//! clears the slot in place when it reaches zero. The pool never grows and
//! never blocks.

use std::fmt;

use weft_core::types::{ExchangeId, NodeId};

use crate::exchange::context::ExchangeContext;
use crate::types::{ConnectionId, KeyRef};

/// Index of a live slot in the context pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ContextId(pub(crate) u16);

impl ContextId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

/// Resources the freed context was still holding; the caller must release
/// them with the security service and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreedResources {
    pub key: Option<(NodeId, KeyRef)>,
    pub connection: Option<ConnectionId>,
}

/// Result of dropping one reference to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// References remain; the new count is reported.
    Retained(u32),
    /// The last reference was dropped and the slot has been cleared.
    Freed(FreedResources),
}

/// The fixed-capacity exchange context arena.
pub struct ContextPool {
    slots: Vec<Option<ExchangeContext>>,
    next_exchange_id: ExchangeId,
}

impl ContextPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next_exchange_id: ExchangeId::new(1),
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

    /// Assign the next locally-scoped exchange id.
    pub fn next_exchange_id(&mut self) -> ExchangeId {
        let id = self.next_exchange_id;
        self.next_exchange_id = id.next();
        id
    }

    /// Place a context in a free slot with an initial reference count of one.
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn insert(&mut self, mut context: ExchangeContext) -> Option<ContextId> {
        let index = self.slots.iter().position(|slot| slot.is_none())?;
        context.ref_count = 1;
        tracing::debug!(
            context = index,
            peer = %context.peer,
            exchange_id = %context.exchange_id,
            initiator = context.initiator,
            "exchange context allocated"
        );
        self.slots[index] = Some(context);
        Some(ContextId(index as u16))
    }

    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<&ExchangeContext> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut ExchangeContext> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Add one reference. Returns false if the slot is not live.
    pub fn retain(&mut self, id: ContextId) -> bool {
        match self.get_mut(id) {
            Some(ctx) => {
                ctx.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference; the slot is cleared when the count reaches zero.
    pub fn release(&mut self, id: ContextId) -> Option<ReleaseOutcome> {
        let slot = self.slots.get_mut(id.index())?;
        let ctx = slot.as_mut()?;
        ctx.ref_count = ctx.ref_count.saturating_sub(1);
        if ctx.ref_count > 0 {
            return Some(ReleaseOutcome::Retained(ctx.ref_count));
        }

        let ctx = slot.take().expect("slot checked live above");
        tracing::debug!(
            context = id.index(),
            peer = %ctx.peer,
            exchange_id = %ctx.exchange_id,
            "exchange context freed"
        );
        let freed = FreedResources {
            key: if ctx.auto_release_key {
                ctx.key.map(|key| (ctx.peer, key))
            } else {
                None
            },
            connection: if ctx.auto_release_connection {
                ctx.connection
            } else {
                None
            },
        };
        Some(ReleaseOutcome::Freed(freed))
    }

    /// Exact-match scan used to de-duplicate outbound allocation requests.
    ///
    /// First match wins, in allocation (slot) order.
    #[must_use]
    pub fn find(
        &self,
        peer: NodeId,
        connection: Option<ConnectionId>,
        app_tag: u32,
        initiator: bool,
    ) -> Option<ContextId> {
        self.iter_live().find_map(|(id, ctx)| {
            (ctx.peer == peer
                && ctx.connection == connection
                && ctx.app_tag == app_tag
                && ctx.initiator == initiator)
                .then_some(id)
        })
    }

    /// Iterate live slots in allocation order.
    pub fn iter_live(&self) -> impl Iterator<Item = (ContextId, &ExchangeContext)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|ctx| (ContextId(index as u16), ctx)))
    }

    /// Ids of all live slots, for iteration that mutates the pool.
    #[must_use]
    pub fn live_ids(&self) -> Vec<ContextId> {
        self.iter_live().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncryptionKind, PeerAddress, RmpConfig};
    use std::net::{IpAddr, Ipv6Addr};
    use weft_core::types::KeyId;

    fn make_context(pool: &mut ContextPool, peer: u64) -> ExchangeContext {
        let exchange_id = pool.next_exchange_id();
        ExchangeContext::new(
            NodeId::new(peer),
            PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7117),
            exchange_id,
            true,
            RmpConfig::default(),
        )
    }

    #[test]
    fn pool_bound_is_enforced() {
        let mut pool = ContextPool::new(3);
        let mut ids = Vec::new();
        for peer in 0..3 {
            let ctx = make_context(&mut pool, peer);
            ids.push(pool.insert(ctx).expect("pool has room"));
        }
        assert_eq!(pool.in_use(), 3);

        let ctx = make_context(&mut pool, 99);
        assert!(pool.insert(ctx).is_none(), "pool must not grow");

        // Releasing one slot makes allocation possible again.
        assert!(matches!(
            pool.release(ids[1]),
            Some(ReleaseOutcome::Freed(_))
        ));
        let ctx = make_context(&mut pool, 99);
        assert!(pool.insert(ctx).is_some());
        assert_eq!(pool.in_use(), 3);
    }

    #[test]
    fn release_frees_only_at_zero() {
        let mut pool = ContextPool::new(2);
        let ctx = make_context(&mut pool, 1);
        let id = pool.insert(ctx).unwrap();

        assert!(pool.retain(id));
        assert_eq!(pool.release(id), Some(ReleaseOutcome::Retained(1)));
        assert!(pool.get(id).is_some());

        assert!(matches!(pool.release(id), Some(ReleaseOutcome::Freed(_))));
        assert!(pool.get(id).is_none());
        assert!(pool.release(id).is_none(), "release of a freed slot is a no-op");
    }

    #[test]
    fn freed_resources_reflect_auto_release_flags() {
        let mut pool = ContextPool::new(2);
        let key = KeyRef::new(KeyId::new(5), EncryptionKind::Aes128);
        let mut ctx = make_context(&mut pool, 1)
            .with_key(key)
            .with_connection(ConnectionId::new(8));
        ctx.auto_release_key = true;
        ctx.auto_release_connection = true;
        let id = pool.insert(ctx).unwrap();

        match pool.release(id) {
            Some(ReleaseOutcome::Freed(freed)) => {
                assert_eq!(freed.key, Some((NodeId::new(1), key)));
                assert_eq!(freed.connection, Some(ConnectionId::new(8)));
            }
            other => panic!("expected freed outcome, got {other:?}"),
        }
    }

    #[test]
    fn freed_resources_empty_without_flags() {
        let mut pool = ContextPool::new(2);
        let ctx = make_context(&mut pool, 1)
            .with_key(KeyRef::new(KeyId::new(5), EncryptionKind::Aes128));
        let id = pool.insert(ctx).unwrap();

        assert_eq!(
            pool.release(id),
            Some(ReleaseOutcome::Freed(FreedResources::default()))
        );
    }

    #[test]
    fn find_matches_exact_tuple_only() {
        let mut pool = ContextPool::new(4);
        let ctx = make_context(&mut pool, 1).with_app_tag(10);
        let id = pool.insert(ctx).unwrap();

        assert_eq!(pool.find(NodeId::new(1), None, 10, true), Some(id));
        assert_eq!(pool.find(NodeId::new(1), None, 11, true), None);
        assert_eq!(pool.find(NodeId::new(2), None, 10, true), None);
        assert_eq!(pool.find(NodeId::new(1), None, 10, false), None);
        assert_eq!(
            pool.find(NodeId::new(1), Some(ConnectionId::new(1)), 10, true),
            None
        );
    }

    #[test]
    fn find_is_first_match_in_allocation_order() {
        let mut pool = ContextPool::new(4);
        let ctx = make_context(&mut pool, 1).with_app_tag(7);
        let first = pool.insert(ctx).unwrap();
        let ctx = make_context(&mut pool, 1).with_app_tag(7);
        let _second = pool.insert(ctx).unwrap();

        assert_eq!(pool.find(NodeId::new(1), None, 7, true), Some(first));
    }

    #[test]
    fn exchange_ids_increase_monotonically() {
        let mut pool = ContextPool::new(2);
        let a = pool.next_exchange_id();
        let b = pool.next_exchange_id();
        assert_eq!(b, a.next());
    }
}
