//! Test vector loading infrastructure for Weft.
//!
//! Each module corresponds to a single JSON test vector file under
//! `.test-vectors/` at the repository root and provides:
//! - Typed structs matching the JSON schema
//! - A `load()` function that deserializes the embedded JSON via `include_str!`
//!
//! # Usage
//!
//! ```rust
//! let vectors = weft_test_vectors::exchange_headers::load();
//! for v in &vectors.header_vectors {
//!     // ... decode v.raw and compare fields
//! }
//! ```

pub mod exchange_headers;
pub mod retry_ticks;

pub use exchange_headers::ExchangeHeadersVectors;
pub use retry_ticks::RetryTicksVectors;
