//! Protocol constants for the Weft exchange header and common profile.

/// The single exchange header version this implementation speaks.
pub const EXCHANGE_VERSION: u8 = 1;

/// Fixed header portion: version/flags(1) + message type(1) + exchange id(2)
/// + profile id(4).
pub const FIXED_HEADER_SIZE: usize = 8;

/// Size of the optional acknowledged-message-id field.
pub const ACK_ID_SIZE: usize = 4;

/// Header size when the acknowledged-message-id field is present.
pub const FULL_HEADER_SIZE: usize = FIXED_HEADER_SIZE + ACK_ID_SIZE;

/// Profile id of the common profile (stand-alone acknowledgments).
pub const PROFILE_COMMON: u32 = 0x0000_0000;

/// Common-profile message type for a stand-alone acknowledgment.
pub const MSG_TYPE_ACK: u8 = 0x01;

/// Default UDP port for Weft traffic.
pub const DEFAULT_PORT: u16 = 7117;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes_are_consistent() {
        assert_eq!(FULL_HEADER_SIZE, FIXED_HEADER_SIZE + ACK_ID_SIZE);
    }

    #[test]
    fn constants_match_test_vectors() {
        let v = weft_test_vectors::exchange_headers::load();
        let constants = &v.constants;

        assert_eq!(EXCHANGE_VERSION, constants.exchange_version as u8);
        assert_eq!(FIXED_HEADER_SIZE, constants.fixed_header_size_bytes as usize);
        assert_eq!(FULL_HEADER_SIZE, constants.full_header_size_bytes as usize);
        assert_eq!(ACK_ID_SIZE, constants.ack_id_size_bytes as usize);
    }
}
