//! Comparison of the expected and the observed surviving documents.

use std::fmt;
use std::ops::Range;

use crate::configuration::RetrieveBound;
use crate::keyspace::KeyspacePartition;
use crate::run::RunReport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `create_count - delete_count`
    pub expected_count: u64,

    /// The ids fetched by the Retrieve phase.
    pub checked_range: Range<u64>,

    pub fetched: u64,

    /// Ids from `checked_range` which could not be fetched.
    pub missing: Vec<u64>,
}

impl ReconcileReport {
    /// `expected_count - fetched`. Negative if more documents were fetched
    /// than expected.
    pub fn discrepancy(&self) -> i128 {
        self.expected_count as i128 - self.fetched as i128
    }

    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.discrepancy() == 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} documents, checked ids {:?}, fetched {}, missing {}",
            self.expected_count,
            self.checked_range,
            self.fetched,
            self.missing.len()
        )
    }
}

/// Builds the report from the result of a Retrieve phase over
/// `partition.retrieve_range(bound)`. Nothing is repaired.
pub fn reconcile(
    partition: &KeyspacePartition,
    bound: RetrieveBound,
    retrieve: &RunReport,
) -> ReconcileReport {
    ReconcileReport {
        expected_count: partition.expected_count(),
        checked_range: partition.retrieve_range(bound),
        fetched: retrieve.done,
        missing: retrieve.missing_keys.clone(),
    }
}
