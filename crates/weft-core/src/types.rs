//! Newtype wrappers for protocol identifier fields.
//!
//! These types prevent accidental mixing of identifiers that share the same
//! underlying integer representation (a peer node id is not an exchange id,
//! even though both fit in a machine word).

use core::fmt;

/// A 64-bit node identifier, unique within a fabric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:016x})", self.0)
    }
}

/// A locally-assigned 16-bit exchange identifier, peer-scoped.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ExchangeId(pub(crate) u16);

impl ExchangeId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// The next exchange id in allocation order, wrapping at the 16-bit bound.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl fmt::Debug for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExchangeId({:04x})", self.0)
    }
}

/// A 32-bit protocol/profile identifier naming an application protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ProfileId(pub(crate) u32);

impl ProfileId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Debug for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileId({:08x})", self.0)
    }
}

/// A 32-bit message identifier assigned by the message layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct MessageId(pub(crate) u32);

impl MessageId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({:08x})", self.0)
    }
}

/// A 16-bit encryption key identifier tracked by the security service.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct KeyId(pub(crate) u16);

impl KeyId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({:04x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_is_zero_padded_hex() {
        let node = NodeId::new(0x1ab);
        assert_eq!(format!("{node}"), "00000000000001ab");
    }

    #[test]
    fn node_id_roundtrip() {
        let node = NodeId::new(u64::MAX);
        assert_eq!(node.to_u64(), u64::MAX);
    }

    #[test]
    fn exchange_id_next_wraps() {
        let id = ExchangeId::new(u16::MAX);
        assert_eq!(id.next(), ExchangeId::new(0));
    }

    #[test]
    fn exchange_id_next_increments() {
        let id = ExchangeId::new(41);
        assert_eq!(id.next(), ExchangeId::new(42));
    }

    #[test]
    fn profile_id_debug_format() {
        let profile = ProfileId::new(0x235a);
        assert_eq!(format!("{profile:?}"), "ProfileId(0000235a)");
    }

    #[test]
    fn key_id_display() {
        let key = KeyId::new(0x4a10);
        assert_eq!(format!("{key}"), "4a10");
    }
}
