//! Access to the document store under test.
//!
//! A store is organized into buckets, each bucket into scopes and each scope
//! into collections. Documents are addressed by key within a collection.

pub mod cql;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::payload::Payload;

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// Timeouts, overload and similar conditions which may go away by themselves.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("malformed document {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// A transaction was rolled back. None of its mutations were applied.
    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether the failed call is worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::NotFound(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Identifies a collection within a bucket.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionName {
    pub scope: String,
    pub collection: String,
}

impl CollectionName {
    pub fn new(scope: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.collection)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
    One,
    Majority,
    All,
}

#[derive(Clone, Debug)]
pub struct TransactionOptions {
    pub durability: Durability,

    /// The transaction is rolled back if it does not commit within this time.
    pub expiration: Duration,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            durability: Durability::Majority,
            expiration: Duration::from_secs(36000),
        }
    }
}

/// A single mutation within a transaction.
#[derive(Clone, Debug)]
pub enum TransactionOp {
    /// Fails the transaction if the key exists.
    Insert { key: String, payload: Payload },

    /// Fails the transaction if the key does not exist.
    Replace { key: String, payload: Payload },

    /// Fails the transaction if the key does not exist.
    Remove { key: String },
}

impl TransactionOp {
    pub fn key(&self) -> &str {
        match self {
            TransactionOp::Insert { key, .. }
            | TransactionOp::Replace { key, .. }
            | TransactionOp::Remove { key } => key,
        }
    }
}

/// A handle to a single collection. Safe to share between concurrent tasks.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &CollectionName;

    /// Inserts or overwrites a document.
    async fn upsert(
        &self,
        key: &str,
        payload: &Payload,
        expiry: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Fetches a document, failing with `NotFound` if it is absent.
    async fn get(&self, key: &str) -> Result<Payload, StoreError>;

    /// Removes a document, failing with `NotFound` if it is absent.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Applies all mutations atomically, or none of them.
    async fn transaction(
        &self,
        ops: Vec<TransactionOp>,
        options: &TransactionOptions,
    ) -> Result<(), StoreError>;
}

/// A connected store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Waits until the store can serve requests.
    async fn wait_until_ready(&self, timeout: Duration) -> anyhow::Result<()>;

    /// Lists every collection of the bucket, in every scope.
    async fn collections(&self, bucket: &str) -> anyhow::Result<Vec<CollectionName>>;

    /// Opens a collection of the bucket.
    async fn collection(
        &self,
        bucket: &str,
        name: &CollectionName,
    ) -> anyhow::Result<Arc<dyn Collection>>;

    /// Releases the resources held by the store.
    async fn close(&self) {}
}
