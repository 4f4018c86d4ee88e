//! The executors of the four operation kinds.
//!
//! Each phase builds its own [`PhaseContext`] and hands it to the workers,
//! so operations of different phases or collections never share mutable
//! state.

mod create;
mod delete;
mod retrieve;
mod transaction;
mod update;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use strum_macros::Display;
use tracing::info;

use crate::configuration::{ExecutionLimits, Operation, WorkloadSpec};
use crate::keyspace;
use crate::run::{self, RunReport};
use crate::secondary::DeltaMap;
use crate::store::Collection;
use crate::template::DocumentTemplate;

pub use create::CreateOperation;
pub use delete::DeleteOperation;
pub use retrieve::RetrieveOperation;
pub use update::UpdateOperation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Retrieve,
}

impl OperationKind {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, OperationKind::Retrieve)
    }
}

/// Parameters of a single executor invocation, shared read-only by its
/// workers.
#[derive(Clone)]
pub struct PhaseContext {
    pub spec: Arc<WorkloadSpec>,
    pub template: Arc<dyn DocumentTemplate>,
    pub collection: Arc<dyn Collection>,
}

impl PhaseContext {
    fn key(&self, id: u64) -> String {
        self.spec.key_for(id)
    }

    fn new_deltas(&self) -> Option<Arc<DeltaMap>> {
        self.spec
            .secondary_sync
            .is_some()
            .then(|| Arc::new(DeltaMap::new()))
    }

    // Per-key output, enabled with the output flag
    fn log_mutation(&self, kind: OperationKind, key: &str) {
        if self.spec.output {
            info!(collection = %self.collection.name(), key, "{kind} done");
        }
    }
}

/// The result of one executor invocation.
pub struct PhaseResult {
    pub kind: OperationKind,
    pub report: RunReport,

    /// Mutations to mirror to the secondary store. Empty when secondary
    /// sync is disabled.
    pub deltas: BTreeMap<String, Option<Value>>,
}

/// Runs one operation kind over the given key ids.
///
/// In transactional mode, mutations are committed in a single transaction
/// instead of one call per key.
pub async fn execute_phase(
    kind: OperationKind,
    phase: &PhaseContext,
    ids: Vec<u64>,
    limits: &ExecutionLimits,
) -> Result<PhaseResult> {
    let deltas = phase.new_deltas();
    let count = ids.len();
    info!(collection = %phase.collection.name(), %kind, keys = count, "phase started");

    let report = if phase.spec.transactional && kind.is_mutation() {
        transaction::execute(kind, phase, ids, limits, deltas.as_deref()).await
    } else {
        let operation: Arc<dyn Operation> = match kind {
            OperationKind::Create => Arc::new(CreateOperation::new(phase.clone(), deltas.clone())),
            OperationKind::Update => Arc::new(UpdateOperation::new(phase.clone(), deltas.clone())),
            OperationKind::Delete => Arc::new(DeleteOperation::new(phase.clone(), deltas.clone())),
            OperationKind::Retrieve => Arc::new(RetrieveOperation::new(phase.clone())),
        };
        run::run(run::Configuration {
            keys: ids,
            limits: limits.clone(),
            operation,
        })
        .await
    }
    .with_context(|| format!("{kind} phase failed on {}", phase.collection.name()))?;

    info!(
        collection = %phase.collection.name(),
        %kind,
        done = report.done,
        missing = report.missing,
        batches = report.batches,
        elapsed = ?report.elapsed,
        stats = %report.stats,
        "phase finished"
    );

    Ok(PhaseResult {
        kind,
        report,
        deltas: deltas.map(|d| d.take()).unwrap_or_default(),
    })
}

/// Materializes the ids of a range in dispatch order.
pub fn ids_for(spec: &WorkloadSpec, range: std::ops::Range<u64>) -> Vec<u64> {
    keyspace::dispatch_order(range, spec.shuffle)
}
