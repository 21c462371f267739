//! Exchange flag nibble encoding and decoding.
//!
//! The version/flags byte layout:
//! ```text
//! Bits 7-4: header version (currently always 1)
//! Bit 3: reserved (ignored on decode, zero on encode)
//! Bit 2: ack_id_present (an acknowledged-message id follows the profile id)
//! Bit 1: needs_ack (the sender requests an acknowledgment)
//! Bit 0: initiator (the sender initiated this exchange)
//! ```

/// The three exchange flags carried in the low nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeFlags {
    pub initiator: bool,
    pub needs_ack: bool,
    pub ack_id_present: bool,
}

impl ExchangeFlags {
    /// Decode the flag set from the low nibble of the version/flags byte.
    ///
    /// Bit 3 is reserved and ignored, so nibbles `0x8..=0xF` decode
    /// identically to their lower 3-bit equivalents.
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Self {
        Self {
            initiator: nibble & 0x01 != 0,
            needs_ack: nibble & 0x02 != 0,
            ack_id_present: nibble & 0x04 != 0,
        }
    }

    /// Encode the flag set into the low nibble (reserved bit zero).
    #[must_use]
    pub fn to_nibble(&self) -> u8 {
        (self.initiator as u8) | ((self.needs_ack as u8) << 1) | ((self.ack_id_present as u8) << 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_packing_vectors() {
        let v = weft_test_vectors::exchange_headers::load();

        for fv in &v.flag_packing_vectors {
            let flags = ExchangeFlags {
                initiator: fv.initiator != 0,
                needs_ack: fv.needs_ack != 0,
                ack_id_present: fv.ack_id_present != 0,
            };
            let expected =
                u8::from_str_radix(&fv.nibble, 16).expect("invalid hex nibble");
            assert_eq!(
                flags.to_nibble(),
                expected,
                "flag packing mismatch for: {}",
                fv.description
            );
            assert_eq!(
                ExchangeFlags::from_nibble(expected),
                flags,
                "flag unpacking mismatch for: {}",
                fv.description
            );
        }
    }

    #[test]
    fn flag_roundtrip_all_nibbles() {
        for nibble in 0x0..=0x7u8 {
            let flags = ExchangeFlags::from_nibble(nibble);
            assert_eq!(flags.to_nibble(), nibble);
        }
    }

    #[test]
    fn reserved_bit_is_ignored() {
        for nibble in 0x8..=0xFu8 {
            assert_eq!(
                ExchangeFlags::from_nibble(nibble),
                ExchangeFlags::from_nibble(nibble & 0x7),
                "bit 3 should not affect decoded flags for nibble 0x{nibble:x}"
            );
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn flags_roundtrip(nibble in 0x0..=0x7u8) {
            let flags = ExchangeFlags::from_nibble(nibble);
            prop_assert_eq!(flags.to_nibble(), nibble);
        }
    }
}
