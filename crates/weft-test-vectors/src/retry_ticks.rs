//! Test vector types for retry_ticks.json
//!
//! Virtual-tick expiry, countdown clamping, retransmit bound, and timer
//! scheduling vectors for the reliable-messaging engine.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TickConstants {
    pub default_tick_interval_ms: u64,
    pub default_initial_retransmit_ticks: u64,
    pub default_active_retransmit_ticks: u64,
    pub default_max_retransmissions: u64,
    pub default_ack_piggyback_ticks: u64,
}

#[derive(Debug, Deserialize)]
pub struct TickExpiryVector {
    pub description: String,
    pub tick_interval_ms: u64,
    pub time_base_ms: u64,
    pub now_ms: u64,
    pub elapsed_ticks: u64,
    pub new_time_base_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CountdownVector {
    pub description: String,
    pub start_tick: u64,
    pub elapsed_ticks: u64,
    pub result: u64,
}

#[derive(Debug, Deserialize)]
pub struct RetransmitBoundVector {
    pub description: String,
    pub max_retransmissions: u64,
    pub total_sends: u64,
}

#[derive(Debug, Deserialize)]
pub struct TimerScheduleVector {
    pub description: String,
    pub tick_interval_ms: u64,
    pub time_base_ms: u64,
    pub now_ms: u64,
    pub pending_ticks: Vec<u64>,
    /// `None` means the timer should be cancelled.
    pub expected_duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RetryTicksVectors {
    pub description: String,
    pub source: String,
    pub constants: TickConstants,
    pub tick_expiry_vectors: Vec<TickExpiryVector>,
    pub countdown_vectors: Vec<CountdownVector>,
    pub retransmit_bound_vectors: Vec<RetransmitBoundVector>,
    pub timer_schedule_vectors: Vec<TimerScheduleVector>,
}

pub fn load() -> RetryTicksVectors {
    let json = include_str!("../../../.test-vectors/retry_ticks.json");
    serde_json::from_str(json).expect("Failed to deserialize retry_ticks.json")
}
