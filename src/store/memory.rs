//! An in-process store. Used for dry runs and by the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Collection, CollectionName, DocumentStore, StoreError, TransactionOp, TransactionOptions};
use crate::payload::Payload;

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<CollectionName, Arc<MemoryCollection>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collection, creating it if it does not exist yet.
    pub fn create_collection(&self, bucket: &str, name: &CollectionName) -> Arc<MemoryCollection> {
        let mut buckets = self.buckets.lock();
        let collections = buckets.entry(bucket.to_string()).or_default();
        Arc::clone(
            collections
                .entry(name.clone())
                .or_insert_with(|| Arc::new(MemoryCollection::new(name.clone()))),
        )
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn wait_until_ready(&self, _timeout: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    async fn collections(&self, bucket: &str) -> anyhow::Result<Vec<CollectionName>> {
        let buckets = self.buckets.lock();
        let collections = buckets
            .get(bucket)
            .ok_or_else(|| anyhow::anyhow!("bucket {bucket} does not exist"))?;
        Ok(collections.keys().cloned().collect())
    }

    async fn collection(
        &self,
        bucket: &str,
        name: &CollectionName,
    ) -> anyhow::Result<Arc<dyn Collection>> {
        Ok(self.create_collection(bucket, name))
    }
}

struct Entry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| now < t)
    }
}

pub struct MemoryCollection {
    name: CollectionName,
    docs: Mutex<HashMap<String, Entry>>,

    // The next `pending_failures` calls fail with a transient error
    pending_failures: AtomicU32,
    calls: AtomicU64,
}

impl MemoryCollection {
    fn new(name: CollectionName) -> Self {
        Self {
            name,
            docs: Mutex::new(HashMap::new()),
            pending_failures: AtomicU32::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Makes the next `count` calls to this collection fail with
    /// `StoreError::Transient`.
    pub fn fail_next_calls(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// The number of calls served so far, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The number of live documents.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.docs.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.docs.lock().get(key).is_some_and(|e| e.is_live(now))
    }

    fn enter_call(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transient(format!(
                "injected failure in {}",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &CollectionName {
        &self.name
    }

    async fn upsert(
        &self,
        key: &str,
        payload: &Payload,
        expiry: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.enter_call()?;
        let entry = Entry {
            payload: payload.clone(),
            expires_at: expiry.map(|e| Instant::now() + e),
        };
        self.docs.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Payload, StoreError> {
        self.enter_call()?;
        let now = Instant::now();
        let mut docs = self.docs.lock();
        match docs.get(key) {
            Some(entry) if entry.is_live(now) => Ok(entry.payload.clone()),
            Some(_) => {
                docs.remove(key);
                Err(StoreError::NotFound(key.to_string()))
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.enter_call()?;
        let now = Instant::now();
        match self.docs.lock().remove(key) {
            Some(entry) if entry.is_live(now) => Ok(()),
            _ => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn transaction(
        &self,
        ops: Vec<TransactionOp>,
        _options: &TransactionOptions,
    ) -> Result<(), StoreError> {
        self.enter_call()?;
        let now = Instant::now();
        let mut docs = self.docs.lock();

        // Validate everything under the lock first, then apply
        for op in &ops {
            let exists = docs.get(op.key()).is_some_and(|e| e.is_live(now));
            match op {
                TransactionOp::Insert { key, .. } if exists => {
                    return Err(StoreError::Transaction(format!("{key} already exists")));
                }
                TransactionOp::Replace { key, .. } | TransactionOp::Remove { key } if !exists => {
                    return Err(StoreError::Transaction(format!("{key} does not exist")));
                }
                _ => {}
            }
        }

        for op in ops {
            match op {
                TransactionOp::Insert { key, payload } | TransactionOp::Replace { key, payload } => {
                    docs.insert(
                        key,
                        Entry {
                            payload,
                            expires_at: None,
                        },
                    );
                }
                TransactionOp::Remove { key } => {
                    docs.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(v: i64) -> Payload {
        Payload::Json(json!({ "v": v }))
    }

    #[tokio::test]
    async fn test_basic_calls() {
        let store = MemoryStore::new();
        let name = CollectionName::new("_default", "default");
        let coll = store.collection("b", &name).await.unwrap();

        coll.upsert("k", &doc(1), None).await.unwrap();
        assert_eq!(coll.get("k").await.unwrap(), doc(1));
        coll.upsert("k", &doc(2), None).await.unwrap();
        assert_eq!(coll.get("k").await.unwrap(), doc(2));

        coll.remove("k").await.unwrap();
        assert!(coll.get("k").await.unwrap_err().is_not_found());
        assert!(coll.remove("k").await.unwrap_err().is_not_found());

        assert_eq!(store.collections("b").await.unwrap(), vec![name]);
        assert!(store.collections("missing").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = MemoryStore::new();
        let coll = store.create_collection("b", &CollectionName::new("s", "c"));

        coll.upsert("k", &doc(1), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(coll.contains("k"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!coll.contains("k"));
        assert!(coll.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let coll = store.create_collection("b", &CollectionName::new("s", "c"));
        coll.fail_next_calls(2);

        assert!(matches!(
            coll.upsert("k", &doc(1), None).await,
            Err(StoreError::Transient(_))
        ));
        assert!(coll.upsert("k", &doc(1), None).await.is_err());
        coll.upsert("k", &doc(1), None).await.unwrap();
        assert_eq!(coll.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transaction_is_all_or_nothing() {
        let store = MemoryStore::new();
        let coll = store.create_collection("b", &CollectionName::new("s", "c"));
        let opts = TransactionOptions::default();

        coll.upsert("b", &doc(0), None).await.unwrap();

        let ops = vec![
            TransactionOp::Insert {
                key: "a".into(),
                payload: doc(1),
            },
            TransactionOp::Insert {
                key: "b".into(),
                payload: doc(2),
            },
        ];
        let err = coll.transaction(ops, &opts).await.unwrap_err();
        assert!(matches!(err, StoreError::Transaction(_)));
        assert!(!coll.contains("a"));
        assert_eq!(coll.get("b").await.unwrap(), doc(0));

        let ops = vec![
            TransactionOp::Insert {
                key: "a".into(),
                payload: doc(1),
            },
            TransactionOp::Replace {
                key: "b".into(),
                payload: doc(2),
            },
        ];
        coll.transaction(ops, &opts).await.unwrap();
        assert_eq!(coll.get("a").await.unwrap(), doc(1));
        assert_eq!(coll.get("b").await.unwrap(), doc(2));

        let ops = vec![
            TransactionOp::Remove { key: "a".into() },
            TransactionOp::Remove { key: "b".into() },
        ];
        coll.transaction(ops, &opts).await.unwrap();
        assert!(coll.is_empty());
    }
}
