//! Pure dispatch policy rules.
//!
//! Encodes the decision table for inbound messages that match no live
//! exchange: which messages are admissible at all, when the handler registry
//! applies, and whether a new context is created to invoke a handler, created
//! only to emit an acknowledgment, or not created at all. The ack-only branch
//! interacting with duplicate suppression was the subtlest part of the
//! protocol, so this module makes the rules explicit and exhaustively tested.

use weft_core::header::wire::ExchangeHeader;
use weft_core::types::NodeId;

use crate::exchange::context::ExchangeContext;
use crate::types::ConnectionId;

/// Why an inbound message was discarded without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A duplicate of an already-delivered message, and the matched handler
    /// does not accept duplicates.
    DuplicateSuppressed,
}

/// What to allocate for a message that matched no live exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCreation {
    /// Nothing: the message is dropped.
    None,
    /// A minimal context that exists solely to emit an acknowledgment and is
    /// closed synchronously afterward.
    AckOnly,
    /// A context handed to the matched handler, left open for the
    /// application to close.
    ForHandler,
}

/// Whether a live context matches an inbound message.
///
/// The context's initiator polarity must be the opposite of the header's
/// initiator flag: our initiator contexts receive responder messages and
/// vice versa.
#[must_use]
pub fn context_matches(
    ctx: &ExchangeContext,
    header: &ExchangeHeader,
    source: NodeId,
    connection: Option<ConnectionId>,
) -> bool {
    ctx.exchange_id == header.exchange_id
        && ctx.peer == source
        && ctx.connection == connection
        && ctx.initiator != header.flags.initiator
}

/// Whether a message that matched no live exchange may be processed at all.
///
/// Only initiator-flagged messages can open new conversations; a
/// non-initiator message is admissible only to have its ack request honored.
#[must_use]
pub fn unsolicited_admissible(initiator_flag: bool, needs_ack: bool) -> bool {
    initiator_flag || needs_ack
}

/// Whether the handler registry applies to this message.
///
/// Non-initiator messages never reach handlers, even when admissible for
/// acknowledgment purposes.
#[must_use]
pub fn handler_lookup_applies(initiator_flag: bool) -> bool {
    initiator_flag
}

/// Decide what to allocate for an admissible unsolicited message.
///
/// A handler match normally creates a context for the handler; a duplicate is
/// suppressed unless the handler opted in, and a suppressed duplicate that
/// still requests an ack gets the ack-only treatment. Without any handler
/// match, an ack request alone creates the ack-only context.
#[must_use]
pub fn decide_context_creation(
    handler_matched: bool,
    allow_duplicates: bool,
    is_duplicate: bool,
    needs_ack: bool,
) -> ContextCreation {
    if handler_matched {
        if is_duplicate && !allow_duplicates {
            if needs_ack {
                ContextCreation::AckOnly
            } else {
                ContextCreation::None
            }
        } else {
            ContextCreation::ForHandler
        }
    } else if needs_ack {
        ContextCreation::AckOnly
    } else {
        ContextCreation::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PeerAddress, RmpConfig};
    use std::net::{IpAddr, Ipv6Addr};
    use weft_core::header::flags::ExchangeFlags;
    use weft_core::types::{ExchangeId, ProfileId};

    // === decide_context_creation ===

    #[test]
    fn handler_match_creates_handler_context() {
        assert_eq!(
            decide_context_creation(true, false, false, false),
            ContextCreation::ForHandler
        );
        assert_eq!(
            decide_context_creation(true, false, false, true),
            ContextCreation::ForHandler
        );
    }

    #[test]
    fn duplicate_tolerant_handler_sees_duplicates() {
        assert_eq!(
            decide_context_creation(true, true, true, true),
            ContextCreation::ForHandler
        );
        assert_eq!(
            decide_context_creation(true, true, true, false),
            ContextCreation::ForHandler
        );
    }

    #[test]
    fn suppressed_duplicate_with_ack_request_acks_only() {
        assert_eq!(
            decide_context_creation(true, false, true, true),
            ContextCreation::AckOnly
        );
    }

    #[test]
    fn suppressed_duplicate_without_ack_request_is_dropped() {
        assert_eq!(
            decide_context_creation(true, false, true, false),
            ContextCreation::None
        );
    }

    #[test]
    fn no_handler_with_ack_request_acks_only() {
        assert_eq!(
            decide_context_creation(false, false, false, true),
            ContextCreation::AckOnly
        );
        assert_eq!(
            decide_context_creation(false, false, true, true),
            ContextCreation::AckOnly
        );
    }

    #[test]
    fn no_handler_no_ack_creates_nothing() {
        assert_eq!(
            decide_context_creation(false, false, false, false),
            ContextCreation::None
        );
    }

    #[test]
    fn creation_table_is_exhaustive() {
        // Every input combination maps to exactly one defined outcome, and
        // ForHandler never results from a suppressed duplicate.
        for handler_matched in [false, true] {
            for allow_duplicates in [false, true] {
                for is_duplicate in [false, true] {
                    for needs_ack in [false, true] {
                        let creation = decide_context_creation(
                            handler_matched,
                            allow_duplicates,
                            is_duplicate,
                            needs_ack,
                        );
                        if creation == ContextCreation::ForHandler {
                            assert!(handler_matched);
                            assert!(!is_duplicate || allow_duplicates);
                        }
                        if !handler_matched && !needs_ack {
                            assert_eq!(creation, ContextCreation::None);
                        }
                    }
                }
            }
        }
    }

    // === unsolicited_admissible / handler_lookup_applies ===

    #[test]
    fn non_initiator_without_ack_is_inadmissible() {
        assert!(!unsolicited_admissible(false, false));
    }

    #[test]
    fn non_initiator_with_ack_is_admissible_but_skips_handlers() {
        assert!(unsolicited_admissible(false, true));
        assert!(!handler_lookup_applies(false));
    }

    #[test]
    fn initiator_is_admissible_and_reaches_handlers() {
        assert!(unsolicited_admissible(true, false));
        assert!(unsolicited_admissible(true, true));
        assert!(handler_lookup_applies(true));
    }

    // === context_matches ===

    fn make_context(peer: u64, exchange: u16, initiator: bool) -> ExchangeContext {
        ExchangeContext::new(
            NodeId::new(peer),
            PeerAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7117),
            ExchangeId::new(exchange),
            initiator,
            RmpConfig::default(),
        )
    }

    fn make_header(exchange: u16, initiator: bool) -> ExchangeHeader {
        ExchangeHeader {
            flags: ExchangeFlags {
                initiator,
                needs_ack: false,
                ack_id_present: false,
            },
            message_type: 0x20,
            exchange_id: ExchangeId::new(exchange),
            profile_id: ProfileId::new(9050),
            ack_message_id: None,
        }
    }

    #[test]
    fn matches_opposite_polarity() {
        let ctx = make_context(1, 5, true);
        let header = make_header(5, false);
        assert!(context_matches(&ctx, &header, NodeId::new(1), None));
    }

    #[test]
    fn rejects_same_polarity() {
        let ctx = make_context(1, 5, true);
        let header = make_header(5, true);
        assert!(!context_matches(&ctx, &header, NodeId::new(1), None));
    }

    #[test]
    fn rejects_wrong_exchange_id() {
        let ctx = make_context(1, 5, true);
        let header = make_header(6, false);
        assert!(!context_matches(&ctx, &header, NodeId::new(1), None));
    }

    #[test]
    fn rejects_wrong_peer() {
        let ctx = make_context(1, 5, true);
        let header = make_header(5, false);
        assert!(!context_matches(&ctx, &header, NodeId::new(2), None));
    }

    #[test]
    fn rejects_wrong_connection() {
        let ctx = make_context(1, 5, true).with_connection(ConnectionId::new(3));
        let header = make_header(5, false);
        assert!(!context_matches(&ctx, &header, NodeId::new(1), None));
        assert!(context_matches(
            &ctx,
            &header,
            NodeId::new(1),
            Some(ConnectionId::new(3))
        ));
    }
}
