//! Running a workload against several collections of a bucket at once.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::store::{CollectionName, DocumentStore};
use crate::workload::{CollectionReport, Workload, WorkloadError};

/// Which collections of a bucket are exercised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Single(CollectionName),

    /// Every collection of every scope.
    All,
}

/// Per-collection results. A failed collection does not prevent the
/// others from completing.
pub struct FanOutReport {
    pub collections: Vec<(CollectionName, Result<CollectionReport, WorkloadError>)>,
}

impl FanOutReport {
    pub fn failures(&self) -> impl Iterator<Item = (&CollectionName, &WorkloadError)> {
        self.collections
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|err| (name, err)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Runs the workload against the targeted collections, at most
/// `parallelism` collections at a time.
///
/// Fails right away if the secondary store could not be synced for any
/// collection. Other failures are reported per collection.
pub async fn run(
    store: &dyn DocumentStore,
    bucket: &str,
    target: &Target,
    workload: Arc<Workload>,
    parallelism: usize,
) -> Result<FanOutReport> {
    let names = match target {
        Target::Single(name) => vec![name.clone()],
        Target::All => store
            .collections(bucket)
            .await
            .with_context(|| format!("Failed to list collections of bucket {bucket}"))?,
    };
    info!(bucket, collections = names.len(), "starting workload");

    let mut results = stream::iter(names)
        .map(|name| {
            let workload = Arc::clone(&workload);
            async move {
                let result = match store.collection(bucket, &name).await {
                    Ok(collection) => workload.run_collection(collection).await,
                    Err(err) => Err(WorkloadError::Phase(
                        err.context(format!("Failed to open collection {name}")),
                    )),
                };
                (name, result)
            }
        })
        .buffer_unordered(parallelism.max(1));

    let mut collections = Vec::new();
    while let Some((name, result)) = results.next().await {
        match result {
            Err(WorkloadError::SecondarySync(err)) => {
                return Err(anyhow::Error::new(err).context(format!("secondary sync of {name} failed")));
            }
            Err(err) => {
                error!(collection = %name, error = %err, "collection failed");
                collections.push((name, Err(err)));
            }
            Ok(report) => {
                info!(collection = %name, "{}", report.reconcile);
                collections.push((name, Ok(report)));
            }
        }
    }
    collections.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(FanOutReport { collections })
}
