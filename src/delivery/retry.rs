use std::time::Duration;

/// Fixed, ordered delays between delivery attempts.
///
/// The delay after attempt `n` (0-based) is the `n`-th entry; attempts past
/// the end of the table reuse the last entry. An empty table means no delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }

    /// Delay to wait after failed attempt `attempt` before the next one
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let index = usize::try_from(attempt).unwrap_or(usize::MAX);
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_millis(&[250, 1_000, 3_000])
    }
}
