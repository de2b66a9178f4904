//! 10%-granularity progress reporting

use core::iter::StepBy;
use core::ops::RangeInclusive;

/// Tracks which multiples of 10 percent have been reported
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    total: u64,
    reported: u8,
}

impl ProgressTracker {
    /// Start tracking a transfer of `total` bytes
    pub fn new(total: u64) -> Self {
        Self { total, reported: 0 }
    }

    /// Percent complete after `copied` bytes
    pub fn percent(&self, copied: u64) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (copied.min(self.total) as u128 * 100 / self.total as u128) as u8
    }

    /// Record progress and yield every multiple of 10 newly reached
    ///
    /// A chunk that stays inside one 10% bucket yields nothing; a chunk that
    /// jumps several buckets yields each of them in order.
    pub fn advance(&mut self, copied: u64) -> StepBy<RangeInclusive<u8>> {
        let percent = self.percent(copied);
        let reached = percent - percent % 10;
        let from = self.reported + 10;
        self.reported = self.reported.max(reached);
        (from..=reached).step_by(10)
    }
}
