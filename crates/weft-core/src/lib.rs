//! Core types, constants, and wire formats for the Weft session layer.
//!
//! This crate defines the protocol newtypes, the per-message exchange header
//! wire format, and the error types shared by the rest of the stack.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod header;
pub mod types;

pub use constants::{EXCHANGE_VERSION, FIXED_HEADER_SIZE, FULL_HEADER_SIZE};
pub use error::HeaderError;
pub use header::flags::ExchangeFlags;
pub use header::wire::ExchangeHeader;
pub use types::{ExchangeId, KeyId, MessageId, NodeId, ProfileId};
