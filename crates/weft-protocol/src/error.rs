//! Session-layer error types.
//!
//! These errors cover all protocol-layer failures: exchange allocation and
//! dispatch, reliable-messaging delivery, and binding preparation. None of
//! them is fatal to the manager; each reports the failure of one requested
//! operation.

use weft_core::error::HeaderError;

use crate::traits::{ResolverError, SecurityError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("exchange context pool exhausted")]
    PoolExhausted,

    #[error("unsolicited handler table full")]
    TooManyHandlers,

    #[error("no matching unsolicited handler registered")]
    HandlerNotFound,

    #[error("unsolicited message without originator flag")]
    UnsolicitedWithoutOriginator,

    #[error("unknown exchange context")]
    UnknownContext,

    #[error("binding is not ready")]
    BindingNotReady,

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("security error: {0}")]
    Security(#[from] SecurityError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReliableError {
    #[error("retransmission table full")]
    TableFull,

    #[error("message not acknowledged after {0} sends")]
    NotAcknowledged(u8),

    #[error("encryption key failed")]
    KeyFailed,

    #[error("exchange closed before delivery")]
    ExchangeClosed,

    #[error("unknown exchange context")]
    UnknownContext,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("binding pool exhausted")]
    PoolExhausted,

    #[error("unknown binding")]
    UnknownBinding,

    #[error("operation illegal in state {0}")]
    WrongState(&'static str),

    #[error("binding configuration incomplete: {0}")]
    ConfigurationIncomplete(&'static str),

    #[error("security option not implemented")]
    NotImplemented,

    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("security error: {0}")]
    Security(#[from] SecurityError),
}
