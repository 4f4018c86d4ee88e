use std::sync::Arc;

use crate::configuration::{KeyOutcome, Operation, OperationContext};
use crate::secondary::DeltaMap;
use crate::store::StoreError;

use super::{OperationKind, PhaseContext};

/// Generates a document for every key and upserts it.
pub struct CreateOperation {
    phase: PhaseContext,
    deltas: Option<Arc<DeltaMap>>,
}

impl CreateOperation {
    pub fn new(phase: PhaseContext, deltas: Option<Arc<DeltaMap>>) -> Self {
        Self { phase, deltas }
    }
}

#[async_trait]
impl Operation for CreateOperation {
    async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
        let key = self.phase.key(ctx.key_id);
        let payload = self.phase.template.generate(ctx.key_id);

        self.phase
            .collection
            .upsert(&key, &payload, self.phase.spec.expiry)
            .await?;

        if let Some(deltas) = &self.deltas {
            deltas.record_upsert(&key, &payload);
        }
        self.phase.log_mutation(OperationKind::Create, &key);
        Ok(KeyOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::super::tests::{fast_limits, phase_for};
    use super::super::{execute_phase, ids_for, OperationKind};
    use crate::test_util::spec_with;

    #[tokio::test]
    #[timeout(10000)]
    async fn test_create_with_transient_failures() {
        let (phase, memory) = phase_for(spec_with(100, 100, 0, 0, 1)).await;
        memory.fail_next_calls(5);

        let ids = ids_for(&phase.spec, 1..101);
        let result = execute_phase(OperationKind::Create, &phase, ids, &fast_limits())
            .await
            .unwrap();

        assert_eq!(result.report.done, 100);
        assert_eq!(result.report.stats.retries, 5);
        assert_eq!(memory.len(), 100);
        assert!(memory.contains("doc_1") && memory.contains("doc_100"));
        // Secondary sync is disabled
        assert!(result.deltas.is_empty());
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_create_fails_after_retry_ceiling() {
        let (phase, memory) = phase_for(spec_with(10, 100, 0, 0, 1)).await;
        memory.fail_next_calls(1000);

        let limits = fast_limits();
        let err = execute_phase(OperationKind::Create, &phase, vec![1], &limits)
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("transient"));
        assert_eq!(memory.call_count(), 1 + limits.max_retries as u64);
    }
}
