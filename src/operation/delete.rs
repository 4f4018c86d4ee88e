use std::sync::Arc;

use tracing::warn;

use crate::configuration::{KeyOutcome, Operation, OperationContext};
use crate::secondary::DeltaMap;
use crate::store::StoreError;

use super::{OperationKind, PhaseContext};

/// Removes every document.
///
/// Removing a key which does not exist is not an error, so a delete
/// phase can be repeated.
pub struct DeleteOperation {
    phase: PhaseContext,
    deltas: Option<Arc<DeltaMap>>,
}

impl DeleteOperation {
    pub fn new(phase: PhaseContext, deltas: Option<Arc<DeltaMap>>) -> Self {
        Self { phase, deltas }
    }
}

#[async_trait]
impl Operation for DeleteOperation {
    async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
        let key = self.phase.key(ctx.key_id);

        let outcome = match self.phase.collection.remove(&key).await {
            Ok(()) => KeyOutcome::Done,
            Err(err) if err.is_not_found() => {
                warn!(collection = %self.phase.collection.name(), key, "deleting a missing key");
                KeyOutcome::Missing
            }
            Err(err) => return Err(err),
        };

        if let Some(deltas) = &self.deltas {
            deltas.record_tombstone(&key);
        }
        self.phase.log_mutation(OperationKind::Delete, &key);
        Ok(outcome)
    }
}
