use crate::time::Duration;

/// Retransmission back-off.
///
/// Every timeout doubles the interval until the next attempt. An acknowledgement that frees
/// buffer space starts over. When a retransmission had nothing to send, for example because the
/// remote window is closed, the last step is taken back so that a stalled connection does not
/// count against its retry budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Retry {
    count: u8,
    interval: Duration,
}

impl Retry {
    /// Fresh state with the first interval `start`.
    pub fn new(start: Duration) -> Self {
        Retry {
            count: 0,
            interval: start,
        }
    }

    /// Start over with the first interval `start`.
    pub fn reset(&mut self, start: Duration) {
        *self = Retry::new(start);
    }

    /// Number of timeouts since the last reset.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Time to wait for the current attempt.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether `cap` retries have been used up.
    pub fn exhausted(&self, cap: u8) -> bool {
        self.count >= cap
    }

    /// Account for a timeout that leads to a retransmission.
    pub fn on_timeout(&mut self) {
        self.count = self.count.saturating_add(1);
        self.interval *= 2;
    }

    /// Take back the last timeout, nothing could be retransmitted.
    pub fn on_stalled(&mut self) {
        self.count = self.count.saturating_sub(1);
        self.interval /= 2;
    }

    /// Account for a timeout but cap the growth after `limit` steps.
    ///
    /// Used for address resolution which retries forever at a constant rate once the limit has
    /// been reached.
    pub fn on_timeout_limited(&mut self, limit: u8) {
        if self.count < limit {
            self.on_timeout();
        }
    }
}
