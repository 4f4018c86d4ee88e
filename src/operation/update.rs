use std::sync::Arc;

use crate::configuration::{KeyOutcome, Operation, OperationContext};
use crate::secondary::DeltaMap;
use crate::store::StoreError;

use super::{OperationKind, PhaseContext};

/// Fetches every document, mutates it and writes it back.
///
/// The read and the write are separate calls, so a concurrent writer
/// of the same key may lose its update.
pub struct UpdateOperation {
    phase: PhaseContext,
    deltas: Option<Arc<DeltaMap>>,
}

impl UpdateOperation {
    pub fn new(phase: PhaseContext, deltas: Option<Arc<DeltaMap>>) -> Self {
        Self { phase, deltas }
    }
}

#[async_trait]
impl Operation for UpdateOperation {
    async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
        let key = self.phase.key(ctx.key_id);
        let existing = self.phase.collection.get(&key).await?;

        let payload = self
            .phase
            .template
            .mutate(existing, &self.phase.spec.fields_to_update)
            .map_err(|err| StoreError::Malformed {
                key: key.clone(),
                reason: format!("{err:#}"),
            })?;

        self.phase
            .collection
            .upsert(&key, &payload, self.phase.spec.expiry)
            .await?;

        if let Some(deltas) = &self.deltas {
            deltas.record_upsert(&key, &payload);
        }
        self.phase.log_mutation(OperationKind::Update, &key);
        Ok(KeyOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;
    use serde_json::json;

    use super::super::tests::{fast_limits, phase_for};
    use super::super::{execute_phase, OperationKind};
    use crate::payload::Payload;
    use crate::store::Collection;
    use crate::test_util::spec_with;

    #[tokio::test]
    #[timeout(10000)]
    async fn test_update_mutates_documents() {
        let (phase, memory) = phase_for(spec_with(20, 100, 50, 0, 1)).await;
        let limits = fast_limits();

        execute_phase(OperationKind::Create, &phase, (1..21).collect(), &limits)
            .await
            .unwrap();
        let before = memory.get("doc_5").await.unwrap();

        let result = execute_phase(OperationKind::Update, &phase, (1..11).collect(), &limits)
            .await
            .unwrap();
        assert_eq!(result.report.done, 10);

        let after = memory.get("doc_5").await.unwrap();
        assert_ne!(before, after);
        assert_eq!(after.as_json().unwrap()["mutated"], 1);
        let untouched = memory.get("doc_15").await.unwrap();
        assert_eq!(untouched.as_json().unwrap()["mutated"], 0);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_update_of_missing_key_is_fatal() {
        let (phase, _memory) = phase_for(spec_with(10, 0, 100, 0, 1)).await;
        let result = execute_phase(OperationKind::Update, &phase, vec![1], &fast_limits()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_update_of_foreign_document_is_fatal() {
        let (phase, memory) = phase_for(spec_with(10, 0, 100, 0, 1)).await;
        memory
            .upsert("doc_1", &Payload::Json(json!([1, 2])), None)
            .await
            .unwrap();

        let err = execute_phase(OperationKind::Update, &phase, vec![1], &fast_limits())
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("malformed document doc_1"));
        // Malformed documents are not retried
        assert_eq!(memory.call_count(), 2);
    }
}
