//!
//! The statistical interface flush targets expose to the selection
//! strategies.
//!

use std::ops::AddAssign;
use std::time::SystemTime;

use utils::serial::SerialNum;

/// Heap bytes a flush would free: estimated usage before and after the
/// flush.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryGain {
    before: u64,
    after: u64,
}

impl MemoryGain {
    pub fn new(before: u64, after: u64) -> MemoryGain {
        MemoryGain { before, after }
    }

    pub fn before(&self) -> u64 {
        self.before
    }

    pub fn after(&self) -> u64 {
        self.after
    }

    /// Bytes freed by flushing. Negative when the flushed form is estimated
    /// to take more memory than the current one.
    pub fn gain(&self) -> i64 {
        self.before as i64 - self.after as i64
    }
}

/// Disk bytes a flush would reclaim, e.g. by rewriting a bloated file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiskGain {
    before: u64,
    after: u64,
}

impl DiskGain {
    pub fn new(before: u64, after: u64) -> DiskGain {
        DiskGain { before, after }
    }

    pub fn before(&self) -> u64 {
        self.before
    }

    pub fn after(&self) -> u64 {
        self.after
    }

    /// Bytes reclaimed by flushing. Negative when flushing grows the disk
    /// footprint.
    pub fn gain(&self) -> i64 {
        self.before as i64 - self.after as i64
    }
}

impl AddAssign for DiskGain {
    fn add_assign(&mut self, rhs: DiskGain) {
        self.before += rhs.before;
        self.after += rhs.after;
    }
}

/// A persistable in-memory component owned by a flush handler.
///
/// The selection strategies see targets only through the statistics below;
/// what a flush actually writes is between the target and the flush engine.
/// Every target reports all four signals, with zeroes for the ones it does
/// not participate in.
pub trait FlushTarget: Send + Sync {
    /// Target name, unique within its handler.
    fn name(&self) -> &str;

    /// Heap bytes that flushing this target would free.
    fn approx_memory_gain(&self) -> MemoryGain;

    /// Disk bytes that flushing this target would reclaim.
    fn approx_disk_gain(&self) -> DiskGain;

    /// Serial number of the last mutation this target has persisted.
    fn flushed_serial(&self) -> SerialNum;

    /// Completion time of the last flush, or `None` if the target has never
    /// been flushed.
    fn last_flush_time(&self) -> Option<SystemTime>;

    /// Whether the target must be flushed regardless of resource pressure,
    /// e.g. to finish an interrupted reconfiguration.
    fn need_urgent_flush(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_may_be_negative() {
        let gain = MemoryGain::new(100, 40);
        assert_eq!(gain.before(), 100);
        assert_eq!(gain.after(), 40);
        assert_eq!(gain.gain(), 60);
        assert_eq!(MemoryGain::new(40, 100).gain(), -60);
        assert_eq!(DiskGain::default().gain(), 0);
    }

    #[test]
    fn disk_gain_accumulates_both_sides() {
        let mut total = DiskGain::default();
        total += DiskGain::new(100, 70);
        total += DiskGain::new(50, 60);
        assert_eq!(total.before(), 150);
        assert_eq!(total.after(), 130);
        assert_eq!(total.gain(), 20);
    }
}
