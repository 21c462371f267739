//! Protocol state machines for the Weft session layer.
//!
//! This crate implements the stateful session logic between raw transport and
//! application command handling: the exchange context pool and dispatcher, the
//! unsolicited handler registry, the reliable-messaging retransmission engine
//! with its tick-virtualized timer, and the binding preparation state machine.
//!
//! The design is sans-IO: state machines decide, and the caller-supplied
//! [`traits::Platform`] collaborators act. All suspension is modeled as
//! asynchronous completions re-entering the manager through its `on_*` entry
//! points; nothing here blocks.

pub mod binding;
pub mod error;
pub mod exchange;
pub mod reliable;
pub mod traits;
pub mod types;

pub use binding::{Binding, BindingEvent, BindingId, BindingState};
pub use error::{BindingError, ExchangeError, ReliableError};
pub use exchange::{
    ContextId, Dispatch, ExchangeContext, ExchangeManager, HandlerEntry, ManagerConfig,
    MessageInfo,
};
pub use reliable::SendFailure;
pub use types::{ConnectionId, EncryptionKind, KeyRef, PeerAddress, RmpConfig, SendTarget};
