//! A monotonic tick counter extended from a narrow hardware timer.
//!
//! Microcontroller timers are typically 16 bits wide and raise an interrupt on overflow. The
//! interrupt handler does nothing except call [`TickCounter::on_overflow`], which increments the
//! software-extended high bits. Reading combines those bits with the live hardware register into
//! a 48-bit tick value. The combined value is offered at three resolutions: full, divided by 256
//! and divided by 65536.
//!
//! The read side must tolerate an overflow between sampling the two halves. It samples the high
//! bits, the hardware register and the high bits again, and retries once when an overflow was
//! observed in between.
//!
//! [`TickCounter::on_overflow`]: struct.TickCounter.html#method.on_overflow
use core::sync::atomic::{AtomicU32, Ordering};

use super::Instant;

/// The hardware half of the tick counter.
pub trait Timer {
    /// The current value of the free running hardware counter.
    fn counter(&self) -> u16;

    /// Whether the counter wrapped but the overflow interrupt was not yet serviced.
    fn overflow_pending(&self) -> bool;
}

/// The software-extended tick counter.
///
/// Can be placed in a `static` and shared between the interrupt handler and the main loop, the
/// only shared state is an atomic integer.
#[derive(Debug)]
pub struct TickCounter {
    high: AtomicU32,
    per_second: u32,
}

impl TickCounter {
    /// Create a counter for a timer running at `per_second` ticks per second.
    pub const fn new(per_second: u32) -> Self {
        TickCounter {
            high: AtomicU32::new(0),
            per_second,
        }
    }

    /// Account for one wrap of the hardware counter.
    ///
    /// Call this, and only this, from the overflow interrupt.
    pub fn on_overflow(&self) {
        self.high.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of ticks per second.
    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Read the full 48-bit tick value.
    pub fn ticks(&self, timer: &impl Timer) -> u64 {
        for _ in 0..2 {
            let high = self.high.load(Ordering::Acquire);
            let low = timer.counter();
            if timer.overflow_pending() || self.high.load(Ordering::Acquire) != high {
                continue;
            }
            return Self::combine(high, low);
        }

        // The interrupt is likely masked by our caller. Account for the pending wrap manually.
        let low = timer.counter();
        let pending = if timer.overflow_pending() { 1 } else { 0 };
        let high = self.high.load(Ordering::Acquire).wrapping_add(pending);
        Self::combine(high, low)
    }

    /// The lower 32 bits of the tick value.
    pub fn get(&self, timer: &impl Timer) -> u32 {
        self.ticks(timer) as u32
    }

    /// Bits 8 through 39 of the tick value.
    pub fn get_div256(&self, timer: &impl Timer) -> u32 {
        (self.ticks(timer) >> 8) as u32
    }

    /// Bits 16 through 47 of the tick value.
    pub fn get_div64k(&self, timer: &impl Timer) -> u32 {
        (self.ticks(timer) >> 16) as u32
    }

    /// Convert the current tick value to an instant.
    pub fn now(&self, timer: &impl Timer) -> Instant {
        let ticks = self.ticks(timer);
        let per_second = u64::from(self.per_second.max(1));
        let millis = ticks / per_second * 1000 + ticks % per_second * 1000 / per_second;
        Instant::from_millis(millis as i64)
    }

    fn combine(high: u32, low: u16) -> u64 {
        (u64::from(high) << 16 | u64::from(low)) & 0xffff_ffff_ffff
    }
}
