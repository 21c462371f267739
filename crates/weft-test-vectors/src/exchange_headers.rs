//! Test vector types for exchange_headers.json
//!
//! Exchange flag nibble packing and header codec test vectors.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HeaderConstants {
    pub exchange_version: u64,
    pub fixed_header_size_bytes: u64,
    pub full_header_size_bytes: u64,
    pub ack_id_size_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct FlagPackingVector {
    pub description: String,
    pub initiator: u64,
    pub needs_ack: u64,
    pub ack_id_present: u64,
    pub nibble: String,
}

#[derive(Debug, Deserialize)]
pub struct HeaderVector {
    pub description: String,
    pub raw: String,
    pub initiator: u64,
    pub needs_ack: u64,
    pub message_type: u64,
    pub exchange_id: u64,
    pub profile_id: u64,
    pub ack_message_id: Option<u64>,
    pub header_length: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorVector {
    pub description: String,
    pub raw: String,
    /// Either "too_short" or "unsupported_version".
    pub kind: String,
    pub min: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeHeadersVectors {
    pub description: String,
    pub source: String,
    pub constants: HeaderConstants,
    pub flag_byte_layout: serde_json::Value,
    pub flag_packing_vectors: Vec<FlagPackingVector>,
    pub header_vectors: Vec<HeaderVector>,
    pub error_vectors: Vec<ErrorVector>,
}

pub fn load() -> ExchangeHeadersVectors {
    let json = include_str!("../../../.test-vectors/exchange_headers.json");
    serde_json::from_str(json).expect("Failed to deserialize exchange_headers.json")
}
