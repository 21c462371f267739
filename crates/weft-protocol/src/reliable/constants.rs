//! Reliable-messaging constants.
//!
//! Values sourced from `retry_ticks.json` test vectors.

/// Real-time milliseconds per virtual tick.
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 200;

/// Retransmission countdown (ticks) before the peer has responded.
pub const DEFAULT_INITIAL_RETRANSMIT_TICKS: u16 = 3;

/// Retransmission countdown (ticks) once the peer has proven responsive.
pub const DEFAULT_ACTIVE_RETRANSMIT_TICKS: u16 = 2;

/// Retransmissions attempted before a send is failed.
pub const DEFAULT_MAX_RETRANSMISSIONS: u8 = 3;

/// Ticks an acknowledgment waits for an outbound message to piggyback on
/// before a stand-alone ack is sent.
pub const DEFAULT_ACK_PIGGYBACK_TICKS: u16 = 1;

/// Default response timeout for bindings, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_test_vectors() {
        let v = weft_test_vectors::retry_ticks::load();
        let constants = &v.constants;

        assert_eq!(
            DEFAULT_TICK_INTERVAL_MS as u64,
            constants.default_tick_interval_ms
        );
        assert_eq!(
            DEFAULT_INITIAL_RETRANSMIT_TICKS as u64,
            constants.default_initial_retransmit_ticks
        );
        assert_eq!(
            DEFAULT_ACTIVE_RETRANSMIT_TICKS as u64,
            constants.default_active_retransmit_ticks
        );
        assert_eq!(
            DEFAULT_MAX_RETRANSMISSIONS as u64,
            constants.default_max_retransmissions
        );
        assert_eq!(
            DEFAULT_ACK_PIGGYBACK_TICKS as u64,
            constants.default_ack_piggyback_ticks
        );
    }
}
