//! The phase pipeline of a single collection.

use std::sync::Arc;

use thiserror::Error as ThisError;
use tracing::{info, warn};

use crate::configuration::{ExecutionLimits, WorkloadSpec};
use crate::keyspace::KeyspacePartition;
use crate::operation::{self, OperationKind, PhaseContext};
use crate::reconcile::{self, ReconcileReport};
use crate::run::RunReport;
use crate::secondary::{SecondarySync, SecondarySyncError};
use crate::store::{Collection, CollectionName};
use crate::template::DocumentTemplate;

#[derive(Debug, ThisError)]
pub enum WorkloadError {
    /// A phase failed. Other collections may still complete.
    #[error("{0:#}")]
    Phase(anyhow::Error),

    /// The secondary store could not be kept in sync. Fatal for the run.
    #[error(transparent)]
    SecondarySync(#[from] SecondarySyncError),
}

pub struct PhaseSummary {
    pub kind: OperationKind,
    pub report: RunReport,

    /// Bulk files uploaded to the secondary store after the phase.
    pub synced_files: usize,
}

pub struct CollectionReport {
    pub collection: CollectionName,
    pub phases: Vec<PhaseSummary>,
    pub reconcile: ReconcileReport,
}

/// Runs the phases of a workload against collections.
///
/// Phases of one collection run strictly one after another:
/// Create, Update, Delete and Retrieve. Deltas of every mutating phase are
/// mirrored to the secondary store, if enabled, before the next phase starts.
pub struct Workload {
    spec: Arc<WorkloadSpec>,
    template: Arc<dyn DocumentTemplate>,
    limits: ExecutionLimits,
    secondary: Option<Arc<SecondarySync>>,
}

impl Workload {
    pub fn new(
        spec: Arc<WorkloadSpec>,
        template: Arc<dyn DocumentTemplate>,
        limits: ExecutionLimits,
        secondary: Option<Arc<SecondarySync>>,
    ) -> Self {
        Self {
            spec,
            template,
            limits,
            secondary,
        }
    }

    pub fn spec(&self) -> &WorkloadSpec {
        &self.spec
    }

    pub async fn run_collection(
        &self,
        collection: Arc<dyn Collection>,
    ) -> Result<CollectionReport, WorkloadError> {
        let name = collection.name().clone();
        let partition = KeyspacePartition::new(&self.spec);
        let phase = PhaseContext {
            spec: Arc::clone(&self.spec),
            template: Arc::clone(&self.template),
            collection,
        };

        let mut phases = Vec::with_capacity(4);
        let mutations = [
            (OperationKind::Create, partition.create_range()),
            (OperationKind::Update, partition.update_range()),
            (OperationKind::Delete, partition.delete_range()),
        ];
        for (kind, range) in mutations {
            if range.is_empty() {
                continue;
            }
            let ids = operation::ids_for(&self.spec, range);
            let result = operation::execute_phase(kind, &phase, ids, &self.limits)
                .await
                .map_err(WorkloadError::Phase)?;

            let synced_files = match &self.secondary {
                Some(secondary) => {
                    secondary
                        .sync(&name, kind, self.template.dataset_name(), &result.deltas)
                        .await?
                }
                None => 0,
            };
            phases.push(PhaseSummary {
                kind,
                report: result.report,
                synced_files,
            });
        }

        let bound = self.spec.retrieve_bound;
        let ids = operation::ids_for(&self.spec, partition.retrieve_range(bound));
        let retrieved = operation::execute_phase(OperationKind::Retrieve, &phase, ids, &self.limits)
            .await
            .map_err(WorkloadError::Phase)?;

        let reconcile = reconcile::reconcile(&partition, bound, &retrieved.report);
        if reconcile.is_consistent() {
            info!(collection = %name, "{reconcile}");
        } else {
            warn!(collection = %name, discrepancy = %reconcile.discrepancy(), "{reconcile}");
        }
        phases.push(PhaseSummary {
            kind: OperationKind::Retrieve,
            report: retrieved.report,
            synced_files: 0,
        });

        Ok(CollectionReport {
            collection: name,
            phases,
            reconcile,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ntest::timeout;
    use parking_lot::Mutex;

    use super::*;
    use crate::configuration::SecondarySyncTarget;
    use crate::secondary::BulkSink;
    use crate::store::memory::MemoryStore;
    use crate::store::DocumentStore;
    use crate::template;
    use crate::test_util::spec_with;

    #[derive(Default)]
    struct LineCountingSink {
        files: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BulkSink for LineCountingSink {
        async fn send(&self, file: &Path) -> anyhow::Result<()> {
            let content = tokio::fs::read_to_string(file).await?;
            self.files.lock().push(content.lines().count());
            Ok(())
        }
    }

    fn workload(spec: WorkloadSpec, secondary: Option<Arc<SecondarySync>>) -> Workload {
        let template = template::build(&spec).unwrap();
        let limits = ExecutionLimits {
            concurrency: 16,
            max_retries: 2,
            ..Default::default()
        };
        Workload::new(Arc::new(spec), template, limits, secondary)
    }

    #[tokio::test]
    #[timeout(20000)]
    async fn test_create_delete_retrieve() {
        let store = MemoryStore::new();
        let name = CollectionName::new("_default", "default");
        let memory = store.create_collection("default", &name);
        let collection = store.collection("default", &name).await.unwrap();

        let report = workload(spec_with(100, 100, 0, 20, 1), None)
            .run_collection(collection)
            .await
            .unwrap();

        let kinds: Vec<_> = report.phases.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            [OperationKind::Create, OperationKind::Delete, OperationKind::Retrieve]
        );
        assert_eq!(report.phases[0].report.done, 100);
        assert_eq!(report.phases[1].report.done, 20);

        assert_eq!(report.reconcile.expected_count, 80);
        assert_eq!(report.reconcile.checked_range, 21..101);
        assert_eq!(report.reconcile.fetched, 80);
        assert!(report.reconcile.missing.is_empty());
        assert!(report.reconcile.is_consistent());

        assert_eq!(memory.len(), 80);
        assert!(!memory.contains("doc_20"));
        assert!(memory.contains("doc_21") && memory.contains("doc_100"));
    }

    #[tokio::test]
    #[timeout(20000)]
    async fn test_secondary_sync_after_each_phase() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(LineCountingSink::default());
        let target = SecondarySyncTarget {
            host: "localhost".into(),
            port: "9200".into(),
            login: String::new(),
            password: String::new(),
            bulk_dir: dir.path().to_path_buf(),
            max_retries: 5,
        };

        let mut spec = spec_with(2500, 100, 10, 4, 1);
        spec.secondary_sync = Some(target.clone());
        spec.shuffle = true;
        let secondary = Arc::new(SecondarySync::new(target, sink.clone()));

        let store = MemoryStore::new();
        let collection = store
            .collection("default", &CollectionName::new("_default", "default"))
            .await
            .unwrap();
        let report = workload(spec, Some(secondary))
            .run_collection(collection)
            .await
            .unwrap();

        let synced: Vec<_> = report.phases.iter().map(|p| p.synced_files).collect();
        assert_eq!(synced, [3, 1, 1, 0]);
        // Create and update rows take two lines, deletes one
        assert_eq!(*sink.files.lock(), [2000, 2000, 1000, 500, 100]);
        assert!(report.reconcile.is_consistent());
    }
}
