//! Reliable messaging: retransmission table and tick-virtualized scheduling.
//!
//! At-least-once delivery over unreliable transports. In-flight sends live in
//! a fixed-capacity table; all pending countdowns (acknowledgments,
//! retransmissions, throttles) are expressed in virtual ticks and collapsed
//! into a single armed real timer, so an idle or lightly-loaded node wakes
//! exactly once per due action instead of once per tick.

pub mod constants;
pub mod engine;
pub mod table;
pub mod ticks;

pub use engine::SendFailure;
pub use table::{RetransEntry, RetransTable};
pub use ticks::{TickClock, TimerCommand};
