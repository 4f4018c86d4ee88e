use tracing::warn;

use crate::configuration::{KeyOutcome, Operation, OperationContext};
use crate::store::StoreError;

use super::PhaseContext;

/// Fetches every document. Keys which cannot be fetched after the last
/// retry are counted as missing.
pub struct RetrieveOperation {
    phase: PhaseContext,
}

impl RetrieveOperation {
    pub fn new(phase: PhaseContext) -> Self {
        Self { phase }
    }
}

#[async_trait]
impl Operation for RetrieveOperation {
    async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
        let key = self.phase.key(ctx.key_id);
        self.phase.collection.get(&key).await?;
        Ok(KeyOutcome::Done)
    }

    fn on_retries_exhausted(
        &self,
        ctx: &OperationContext,
        err: StoreError,
    ) -> Result<KeyOutcome, StoreError> {
        warn!(
            collection = %self.phase.collection.name(),
            key = self.phase.key(ctx.key_id),
            error = %err,
            "giving up on key"
        );
        Ok(KeyOutcome::Missing)
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::super::tests::{fast_limits, phase_for};
    use super::super::{execute_phase, OperationKind};
    use crate::store::Collection;
    use crate::test_util::spec_with;

    #[tokio::test]
    #[timeout(10000)]
    async fn test_missing_keys_are_counted() {
        let (phase, memory) = phase_for(spec_with(10, 100, 0, 0, 1)).await;
        let limits = fast_limits();

        execute_phase(OperationKind::Create, &phase, (1..11).collect(), &limits)
            .await
            .unwrap();
        memory.remove("doc_4").await.unwrap();
        memory.remove("doc_7").await.unwrap();

        let result = execute_phase(OperationKind::Retrieve, &phase, (1..11).collect(), &limits)
            .await
            .unwrap();
        assert_eq!(result.report.done, 8);
        assert_eq!(result.report.missing_keys, vec![4, 7]);
        assert_eq!(result.report.stats.retries, 2 * limits.max_retries as u64);
    }
}
