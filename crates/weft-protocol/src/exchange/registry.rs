//! Unsolicited message handler registry.
//!
//! A fixed-capacity table mapping `(profile id, message type or wildcard,
//! optional connection filter)` to an opaque handler tag. The dispatcher
//! consults this table to accept brand-new conversations.

use weft_core::types::ProfileId;

use crate::error::ExchangeError;
use crate::types::ConnectionId;

/// One registered unsolicited-message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerEntry {
    pub profile_id: ProfileId,
    /// `None` is the wildcard: matches any message type for the profile.
    pub message_type: Option<u8>,
    /// `None` accepts messages from any connection (or none).
    pub connection: Option<ConnectionId>,
    /// Whether duplicate messages are delivered to this handler.
    pub allow_duplicates: bool,
    /// Opaque tag routed back through [`Dispatch::Handler`].
    ///
    /// [`Dispatch::Handler`]: crate::exchange::Dispatch::Handler
    pub handler_tag: u32,
}

impl HandlerEntry {
    fn same_tuple(&self, other: &HandlerEntry) -> bool {
        self.profile_id == other.profile_id
            && self.message_type == other.message_type
            && self.connection == other.connection
    }

    fn accepts(&self, profile_id: ProfileId, connection: Option<ConnectionId>) -> bool {
        self.profile_id == profile_id
            && match self.connection {
                Some(filter) => connection == Some(filter),
                None => true,
            }
    }
}

/// Fixed-capacity handler table.
pub struct HandlerTable {
    slots: Vec<Option<HandlerEntry>>,
}

impl HandlerTable {
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

    /// Register a handler.
    ///
    /// An existing entry with the same `(profile, message type, connection)`
    /// tuple is replaced in place; only if none exists is a free slot
    /// consumed.
    pub fn register(&mut self, entry: HandlerEntry) -> Result<(), ExchangeError> {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|existing| existing.same_tuple(&entry))
        {
            tracing::debug!(
                profile = %entry.profile_id,
                message_type = ?entry.message_type,
                "replacing unsolicited handler"
            );
            *slot = entry;
            return Ok(());
        }

        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                tracing::debug!(
                    profile = %entry.profile_id,
                    message_type = ?entry.message_type,
                    "registered unsolicited handler"
                );
                *slot = Some(entry);
                Ok(())
            }
            None => Err(ExchangeError::TooManyHandlers),
        }
    }

    /// Remove the handler for an exact `(profile, message type, connection)`
    /// tuple.
    pub fn unregister(
        &mut self,
        profile_id: ProfileId,
        message_type: Option<u8>,
        connection: Option<ConnectionId>,
    ) -> Result<(), ExchangeError> {
        let probe = HandlerEntry {
            profile_id,
            message_type,
            connection,
            allow_duplicates: false,
            handler_tag: 0,
        };
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|entry| entry.same_tuple(&probe)) {
                *slot = None;
                return Ok(());
            }
        }
        Err(ExchangeError::HandlerNotFound)
    }

    /// Find the most specific handler for an inbound message: an exact
    /// message-type match is preferred over a wildcard entry for the same
    /// profile and connection filter.
    #[must_use]
    pub fn lookup(
        &self,
        profile_id: ProfileId,
        message_type: u8,
        connection: Option<ConnectionId>,
    ) -> Option<&HandlerEntry> {
        let candidates = || {
            self.slots
                .iter()
                .flatten()
                .filter(move |entry| entry.accepts(profile_id, connection))
        };

        candidates()
            .find(|entry| entry.message_type == Some(message_type))
            .or_else(|| candidates().find(|entry| entry.message_type.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(profile: u32, message_type: Option<u8>, tag: u32) -> HandlerEntry {
        HandlerEntry {
            profile_id: ProfileId::new(profile),
            message_type,
            connection: None,
            allow_duplicates: false,
            handler_tag: tag,
        }
    }

    #[test]
    fn exact_type_preferred_over_wildcard() {
        let mut table = HandlerTable::new(4);
        table.register(entry(9050, None, 1)).unwrap();
        table.register(entry(9050, Some(0x20), 2)).unwrap();

        let matched = table.lookup(ProfileId::new(9050), 0x20, None).unwrap();
        assert_eq!(matched.handler_tag, 2);

        let matched = table.lookup(ProfileId::new(9050), 0x21, None).unwrap();
        assert_eq!(matched.handler_tag, 1, "other types fall through to wildcard");
    }

    #[test]
    fn lookup_respects_profile() {
        let mut table = HandlerTable::new(4);
        table.register(entry(9050, None, 1)).unwrap();
        assert!(table.lookup(ProfileId::new(9051), 0x20, None).is_none());
    }

    #[test]
    fn registering_same_tuple_replaces() {
        let mut table = HandlerTable::new(1);
        table.register(entry(9050, Some(0x20), 1)).unwrap();
        table.register(entry(9050, Some(0x20), 2)).unwrap();

        assert_eq!(table.len(), 1);
        let matched = table.lookup(ProfileId::new(9050), 0x20, None).unwrap();
        assert_eq!(matched.handler_tag, 2);
    }

    #[test]
    fn register_fails_when_full() {
        let mut table = HandlerTable::new(1);
        table.register(entry(9050, Some(0x20), 1)).unwrap();
        assert_eq!(
            table.register(entry(9051, Some(0x20), 2)),
            Err(ExchangeError::TooManyHandlers)
        );
    }

    #[test]
    fn unregister_frees_the_slot() {
        let mut table = HandlerTable::new(1);
        table.register(entry(9050, Some(0x20), 1)).unwrap();
        table
            .unregister(ProfileId::new(9050), Some(0x20), None)
            .unwrap();
        assert!(table.is_empty());
        table.register(entry(9051, None, 2)).unwrap();
    }

    #[test]
    fn unregister_unknown_tuple_fails() {
        let mut table = HandlerTable::new(1);
        assert_eq!(
            table.unregister(ProfileId::new(9050), Some(0x20), None),
            Err(ExchangeError::HandlerNotFound)
        );
    }

    #[test]
    fn connection_filter_restricts_matches() {
        let mut table = HandlerTable::new(4);
        let filtered = HandlerEntry {
            connection: Some(ConnectionId::new(3)),
            ..entry(9050, Some(0x20), 1)
        };
        table.register(filtered).unwrap();

        assert!(table.lookup(ProfileId::new(9050), 0x20, None).is_none());
        assert!(table
            .lookup(ProfileId::new(9050), 0x20, Some(ConnectionId::new(4)))
            .is_none());
        assert!(table
            .lookup(ProfileId::new(9050), 0x20, Some(ConnectionId::new(3)))
            .is_some());
    }

    #[test]
    fn unfiltered_entry_matches_any_connection() {
        let mut table = HandlerTable::new(4);
        table.register(entry(9050, None, 1)).unwrap();
        assert!(table
            .lookup(ProfileId::new(9050), 0x20, Some(ConnectionId::new(3)))
            .is_some());
    }
}
