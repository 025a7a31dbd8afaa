use std::time::{Duration, Instant};

/// Doubling retransmission timeout.
///
/// Starts at `start_rto`, doubles per attempt, never exceeds `max_rto`.
/// There is no retry limit, a handshake keeps retransmitting until the
/// agent is reset or closed.
#[derive(Debug)]
pub(crate) struct Backoff {
    start_rto: Duration,
    max_rto: Duration,
    rto: Duration,
}

impl Backoff {
    pub fn new(start_rto: Duration, max_rto: Duration) -> Self {
        Self {
            start_rto,
            max_rto,
            rto: start_rto,
        }
    }

    /// Back to the start value, used when a new flight begins.
    pub fn reset(&mut self) {
        self.rto = self.start_rto;
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    pub fn attempt(&mut self) {
        self.rto = self.rto.saturating_mul(2).min(self.max_rto);
    }
}

/// The single retransmission timer of an agent.
///
/// Arming replaces any previous deadline, so there is never more than one
/// outstanding.
#[derive(Debug, Default)]
pub(crate) struct RetransmitTimer {
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn arm(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }
}
