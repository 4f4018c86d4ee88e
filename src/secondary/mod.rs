//! Mirroring of mutations to a secondary store.
//!
//! After a mutating phase, the recorded deltas are written into bulk files
//! which are then uploaded one by one. A file which is still rejected after
//! the last retry fails the whole run: the secondary store is a strict
//! mirror and must not silently drift.

pub mod bulk;
mod delta;
mod sink;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::{debug, error, info};

use crate::configuration::SecondarySyncTarget;
use crate::operation::OperationKind;
use crate::store::CollectionName;

pub use delta::DeltaMap;
pub use sink::{BulkSink, HttpBulkSink};

#[derive(Debug, ThisError)]
pub enum SecondarySyncError {
    #[error("failed to write bulk file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bulk file {path} was rejected {attempts} times, last error: {last_error:#}")]
    Rejected {
        path: PathBuf,
        attempts: u32,
        last_error: anyhow::Error,
    },
}

/// Uploads phase deltas through a bulk sink.
pub struct SecondarySync {
    target: SecondarySyncTarget,
    sink: Arc<dyn BulkSink>,
}

impl SecondarySync {
    pub fn new(target: SecondarySyncTarget, sink: Arc<dyn BulkSink>) -> Self {
        Self { target, sink }
    }

    /// Connects to the HTTP bulk endpoint of the target.
    pub fn http(target: SecondarySyncTarget) -> anyhow::Result<Self> {
        let sink = Arc::new(HttpBulkSink::new(&target)?);
        Ok(Self::new(target, sink))
    }

    /// Writes the deltas of one phase into bulk files and uploads them.
    ///
    /// Files of each collection are kept in a separate subdirectory, so
    /// that collections can be synced concurrently. Returns the number
    /// of uploaded files.
    pub async fn sync(
        &self,
        collection: &CollectionName,
        kind: OperationKind,
        dataset: &str,
        deltas: &BTreeMap<String, Option<Value>>,
    ) -> Result<usize, SecondarySyncError> {
        if deltas.is_empty() {
            return Ok(0);
        }

        let dir = self.target.bulk_dir.join(collection.to_string());
        let files = bulk::write_files(&dir, kind, dataset, deltas).await?;
        info!(%collection, %kind, rows = deltas.len(), files = files.len(), "secondary sync started");

        for (i, file) in files.iter().enumerate() {
            debug!(file = %file.display(), number = i + 1, "syncing file");
            self.send_with_retries(file).await?;
        }

        info!(%collection, %kind, "secondary sync completed");
        Ok(files.len())
    }

    async fn send_with_retries(&self, file: &std::path::Path) -> Result<(), SecondarySyncError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.send(file).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt > self.target.max_retries => {
                    return Err(SecondarySyncError::Rejected {
                        path: file.to_path_buf(),
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    error!(file = %file.display(), attempt, error = %format!("{err:#}"), "secondary sync failed");
                }
            }
        }
    }
}
