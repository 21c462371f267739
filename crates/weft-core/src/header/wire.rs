//! Exchange header parsing and serialization.
//!
//! Every Weft payload is prefixed with this header:
//! ```text
//! byte 0      version(4 bits) | flags(4 bits)
//! byte 1      message type
//! bytes 2-3   exchange id, little-endian
//! bytes 4-7   profile id, little-endian
//! bytes 8-11  acknowledged message id, little-endian (iff ack_id_present)
//! ```

extern crate alloc;
use alloc::vec::Vec;

use crate::constants::{EXCHANGE_VERSION, FIXED_HEADER_SIZE, FULL_HEADER_SIZE};
use crate::error::HeaderError;
use crate::header::flags::ExchangeFlags;
use crate::types::{ExchangeId, MessageId, ProfileId};

/// A decoded exchange header.
///
/// The `ack_id_present` flag is derived from `ack_message_id` on encode, so
/// the two can never disagree on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeHeader {
    pub flags: ExchangeFlags,
    pub message_type: u8,
    pub exchange_id: ExchangeId,
    pub profile_id: ProfileId,
    pub ack_message_id: Option<MessageId>,
}

impl ExchangeHeader {
    /// Encoded size of this header in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        if self.ack_message_id.is_some() {
            FULL_HEADER_SIZE
        } else {
            FIXED_HEADER_SIZE
        }
    }

    /// Serialize the header to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = self.flags;
        flags.ack_id_present = self.ack_message_id.is_some();

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push((EXCHANGE_VERSION << 4) | flags.to_nibble());
        buf.push(self.message_type);
        buf.extend_from_slice(&self.exchange_id.to_u16().to_le_bytes());
        buf.extend_from_slice(&self.profile_id.to_u32().to_le_bytes());
        if let Some(ack_id) = self.ack_message_id {
            buf.extend_from_slice(&ack_id.to_u32().to_le_bytes());
        }
        buf
    }

    /// Parse a header from the start of `raw`.
    ///
    /// Returns the header and the number of bytes consumed; the remainder of
    /// `raw` is the application payload.
    pub fn decode(raw: &[u8]) -> Result<(Self, usize), HeaderError> {
        if raw.len() < FIXED_HEADER_SIZE {
            return Err(HeaderError::TooShort {
                min: FIXED_HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let version = raw[0] >> 4;
        if version != EXCHANGE_VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }

        let flags = ExchangeFlags::from_nibble(raw[0] & 0x0F);
        let message_type = raw[1];
        let exchange_id = ExchangeId::new(u16::from_le_bytes([raw[2], raw[3]]));
        let profile_id = ProfileId::new(u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]));

        if !flags.ack_id_present {
            let header = Self {
                flags,
                message_type,
                exchange_id,
                profile_id,
                ack_message_id: None,
            };
            return Ok((header, FIXED_HEADER_SIZE));
        }

        if raw.len() < FULL_HEADER_SIZE {
            return Err(HeaderError::TooShort {
                min: FULL_HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let ack_id = MessageId::new(u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]));
        let header = Self {
            flags,
            message_type,
            exchange_id,
            profile_id,
            ack_message_id: Some(ack_id),
        };
        Ok((header, FULL_HEADER_SIZE))
    }
}
