//! Tick virtualization.
//!
//! Real time is divided into fixed-width virtual ticks anchored at
//! `time_base`. Pending work is stored as tick countdowns; expiry computes
//! how many whole ticks have elapsed, decrements every countdown, and
//! advances the base by whole-tick multiples only. Scheduling finds the
//! minimum countdown across all pending work and arms one real timer for it.

// ---------------------------------------------------------------------------
// Pure tick arithmetic
// ---------------------------------------------------------------------------

/// Whole virtual ticks elapsed between `time_base_ms` and `now_ms`.
///
/// A clock reading behind the base yields zero; partial ticks round down.
#[must_use]
pub fn elapsed_ticks(now_ms: u64, time_base_ms: u64, tick_interval_ms: u32) -> u64 {
    now_ms.saturating_sub(time_base_ms) / u64::from(tick_interval_ms)
}

/// Advance the time base by a whole number of ticks.
#[must_use]
pub fn advance_time_base(time_base_ms: u64, elapsed: u64, tick_interval_ms: u32) -> u64 {
    time_base_ms + elapsed * u64::from(tick_interval_ms)
}

/// Decrement a countdown by `elapsed` ticks, clamping at zero.
#[must_use]
pub fn decrement_clamped(tick: u16, elapsed: u64) -> u16 {
    if elapsed >= u64::from(tick) {
        0
    } else {
        tick - elapsed as u16
    }
}

/// What the scheduler decided about the single real timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Arm (or re-arm) the timer for this many milliseconds.
    Arm { duration_ms: u64 },
    /// Nothing is pending; cancel any armed timer.
    Cancel,
    /// The armed deadline is already correct.
    Unchanged,
}

// ---------------------------------------------------------------------------
// TickClock
// ---------------------------------------------------------------------------

/// Tick state for one manager: the interval, the base, and the deadline of
/// the currently-armed real timer.
#[derive(Debug, Clone)]
pub struct TickClock {
    tick_interval_ms: u32,
    time_base_ms: u64,
    armed_deadline_ms: Option<u64>,
}

impl TickClock {
    pub fn new(tick_interval_ms: u32, now_ms: u64) -> Self {
        Self {
            tick_interval_ms,
            time_base_ms: now_ms,
            armed_deadline_ms: None,
        }
    }

    #[must_use]
    pub fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    #[must_use]
    pub fn time_base_ms(&self) -> u64 {
        self.time_base_ms
    }

    /// Expire elapsed ticks: returns how many whole ticks have passed and
    /// advances the base accordingly. Must be called before any countdown is
    /// read or mutated, so all counters stay consistent relative to now.
    pub fn expire(&mut self, now_ms: u64) -> u64 {
        let elapsed = elapsed_ticks(now_ms, self.time_base_ms, self.tick_interval_ms);
        if elapsed > 0 {
            self.time_base_ms = advance_time_base(self.time_base_ms, elapsed, self.tick_interval_ms);
            tracing::trace!(
                elapsed,
                time_base_ms = self.time_base_ms,
                "expired virtual ticks"
            );
        }
        elapsed
    }

    /// The real timer fired; forget the armed deadline.
    pub fn timer_lapsed(&mut self) {
        self.armed_deadline_ms = None;
    }

    /// Decide how to (re-)arm the single real timer given the minimum
    /// pending countdown across all work. Call after [`TickClock::expire`].
    pub fn schedule(&mut self, min_pending_tick: Option<u16>, now_ms: u64) -> TimerCommand {
        match min_pending_tick {
            None => {
                if self.armed_deadline_ms.take().is_some() {
                    TimerCommand::Cancel
                } else {
                    TimerCommand::Unchanged
                }
            }
            Some(tick) => {
                let deadline =
                    self.time_base_ms + u64::from(tick) * u64::from(self.tick_interval_ms);
                if self.armed_deadline_ms == Some(deadline) {
                    return TimerCommand::Unchanged;
                }
                self.armed_deadline_ms = Some(deadline);
                TimerCommand::Arm {
                    duration_ms: deadline.saturating_sub(now_ms),
                }
            }
        }
    }
}
