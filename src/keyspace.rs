//! Splits the document keyspace between operation kinds.

use std::ops::Range;

use rand::seq::SliceRandom;

use crate::configuration::{RetrieveBound, WorkloadSpec};

/// Key ranges targeted by each phase of a workload.
///
/// Updates and deletes act on the prefix of the created range, so with
/// `create_count >= delete_count` the keys that survive all phases are
/// `[start + delete_count, start + create_count)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyspacePartition {
    pub start: u64,
    pub create_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
}

impl KeyspacePartition {
    pub fn new(spec: &WorkloadSpec) -> Self {
        Self {
            start: spec.start_seq_num,
            create_count: count_for(spec.num_ops, spec.percent_create),
            update_count: count_for(spec.num_ops, spec.percent_update),
            delete_count: count_for(spec.num_ops, spec.percent_delete),
        }
    }

    // Ranges are clamped at `u64::MAX` instead of wrapping around.
    fn range_of(&self, count: u64) -> Range<u64> {
        self.start..self.start.saturating_add(count)
    }

    pub fn create_range(&self) -> Range<u64> {
        self.range_of(self.create_count)
    }

    pub fn update_range(&self) -> Range<u64> {
        self.range_of(self.update_count)
    }

    pub fn delete_range(&self) -> Range<u64> {
        self.range_of(self.delete_count)
    }

    /// The range of keys fetched by the Retrieve phase.
    pub fn retrieve_range(&self, bound: RetrieveBound) -> Range<u64> {
        let first = self.start.saturating_add(self.delete_count);
        let end = match bound {
            // The upper bound is inclusive and is not offset by `start`.
            RetrieveBound::Legacy => self.create_count.saturating_add(1),
            RetrieveBound::Exact => self.start.saturating_add(self.create_count),
        };
        first..end.max(first)
    }

    /// The number of documents expected to survive the workload.
    pub fn expected_count(&self) -> u64 {
        self.create_count.saturating_sub(self.delete_count)
    }
}

/// `floor(num_ops * percent / 100)`
pub fn count_for(num_ops: u64, percent: u64) -> u64 {
    (num_ops as u128 * percent as u128 / 100) as u64
}

pub fn format_key(prefix: &str, id: u64, suffix: &str) -> String {
    format!("{prefix}{id}{suffix}")
}

/// Recovers the integer id from a key built with `format_key`.
pub fn extract_id(prefix: &str, key: &str, suffix: &str) -> Option<u64> {
    key.strip_prefix(prefix)?.strip_suffix(suffix)?.parse().ok()
}

/// Materializes the ids of a range in the order in which they will be
/// dispatched to workers.
pub fn dispatch_order(range: Range<u64>, shuffle: bool) -> Vec<u64> {
    let mut ids: Vec<u64> = range.collect();
    if shuffle {
        ids.shuffle(&mut rand::thread_rng());
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::spec_with;

    #[test]
    fn test_counts_are_floored() {
        assert_eq!(count_for(100, 100), 100);
        assert_eq!(count_for(100, 20), 20);
        assert_eq!(count_for(7, 50), 3);
        assert_eq!(count_for(1000, 0), 0);
        assert_eq!(count_for(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn test_scenario_ranges() {
        let spec = spec_with(100, 100, 0, 20, 1);
        let p = KeyspacePartition::new(&spec);

        assert_eq!(p.create_range(), 1..101);
        assert_eq!(p.delete_range(), 1..21);
        assert_eq!(p.update_range(), 1..1);
        assert_eq!(p.retrieve_range(RetrieveBound::Legacy), 21..101);
        assert_eq!(p.retrieve_range(RetrieveBound::Exact), 21..101);
        assert_eq!(p.expected_count(), 80);
    }

    #[test]
    fn test_legacy_bound_ignores_start() {
        let spec = spec_with(100, 50, 0, 10, 1000);
        let p = KeyspacePartition::new(&spec);

        assert_eq!(p.create_range(), 1000..1050);
        assert_eq!(p.retrieve_range(RetrieveBound::Exact), 1010..1050);
        // The legacy upper bound is below the first key, so nothing is fetched
        assert!(p.retrieve_range(RetrieveBound::Legacy).is_empty());
        assert_eq!(p.expected_count(), 40);
    }

    #[test]
    fn test_retrieve_size_matches_expected_count() {
        for num_ops in [0, 1, 7, 100, 999] {
            for pc in [0, 10, 50, 100] {
                for pd in [0, 5, 10] {
                    if pd > pc {
                        continue;
                    }
                    let p = KeyspacePartition::new(&spec_with(num_ops, pc, 0, pd, 1));
                    let expected = p.expected_count();
                    let legacy = p.retrieve_range(RetrieveBound::Legacy);
                    let exact = p.retrieve_range(RetrieveBound::Exact);
                    assert_eq!(exact.end - exact.start, expected);
                    assert_eq!(legacy.end - legacy.start, expected);
                }
            }
        }
    }

    #[test]
    fn test_ranges_do_not_wrap() {
        let p = KeyspacePartition::new(&spec_with(100, 100, 0, 20, u64::MAX - 10));
        assert_eq!(p.create_range(), u64::MAX - 10..u64::MAX);
        assert_eq!(p.delete_range(), u64::MAX - 10..u64::MAX);
        assert_eq!(p.retrieve_range(RetrieveBound::Exact), u64::MAX..u64::MAX);
        assert!(p.retrieve_range(RetrieveBound::Legacy).is_empty());
    }

    #[test]
    fn test_keys() {
        assert_eq!(format_key("doc_", 17, ""), "doc_17");
        assert_eq!(format_key("a-", 3, "-z"), "a-3-z");
        assert_eq!(extract_id("a-", "a-3-z", "-z"), Some(3));
        assert_eq!(extract_id("doc_", "doc_x", ""), None);
        assert_eq!(extract_id("doc_", "user_1", ""), None);
    }

    #[test]
    fn test_dispatch_order() {
        assert_eq!(dispatch_order(3..7, false), vec![3, 4, 5, 6]);

        let mut shuffled = dispatch_order(0..1000, true);
        assert_eq!(shuffled.len(), 1000);
        shuffled.sort_unstable();
        assert_eq!(shuffled, (0..1000).collect::<Vec<_>>());
    }
}
