//! Queue statistics for a site.

use serde::{Deserialize, Serialize};

use crate::ItemStatus;

/// Three-way partition of a site's queue items.
///
/// Failed items are never counted as pending or successful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatistic {
    pub pending_count: u64,
    pub failed_count: u64,
    pub success_count: u64,
}

impl QueueStatistic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one item under its status.
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Pending => self.pending_count += 1,
            ItemStatus::Failed => self.failed_count += 1,
            ItemStatus::Success => self.success_count += 1,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.pending_count + self.failed_count + self.success_count
    }

    pub fn pending_percentage(&self) -> f64 {
        self.percentage(self.pending_count)
    }

    pub fn failed_percentage(&self) -> f64 {
        self.percentage(self.failed_count)
    }

    pub fn success_percentage(&self) -> f64 {
        self.percentage(self.success_count)
    }

    /// Share of `count` in the total, rounded to two decimals.
    fn percentage(&self, count: u64) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        ((count as f64 / total as f64) * 10_000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_partitions() {
        let mut stats = QueueStatistic::new();
        stats.record(ItemStatus::Pending);
        stats.record(ItemStatus::Pending);
        stats.record(ItemStatus::Failed);
        stats.record(ItemStatus::Success);

        assert_eq!(stats.pending_count, 2);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.total_count(), 4);
    }

    #[test]
    fn test_percentages() {
        let stats = QueueStatistic {
            pending_count: 1,
            failed_count: 1,
            success_count: 1,
        };
        assert!((stats.pending_percentage() - 33.33).abs() < f64::EPSILON);
        assert!((stats.success_percentage() - 33.33).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_percentages_are_zero() {
        let stats = QueueStatistic::new();
        assert_eq!(stats.failed_percentage(), 0.0);
    }
}
