//! Transactional mode: a whole phase is committed as one transaction.
//!
//! The documents are prepared first, with the usual per-key calls. Then
//! all mutations are committed at once. If the commit fails, nothing is
//! applied and the phase fails without retrying. The per-key calls made
//! before the commit are retried like in the worker pool.

use std::future::Future;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::configuration::ExecutionLimits;
use crate::payload::Payload;
use crate::run::RunReport;
use crate::secondary::DeltaMap;
use crate::sharded_stats::StatsFactory;
use crate::stats::PhaseStatsFactory;
use crate::store::{StoreError, TransactionOp, TransactionOptions};

use super::{OperationKind, PhaseContext};

pub(super) async fn execute(
    kind: OperationKind,
    phase: &PhaseContext,
    ids: Vec<u64>,
    limits: &ExecutionLimits,
    deltas: Option<&DeltaMap>,
) -> Result<RunReport> {
    let phase_run = execute_within_deadline(kind, phase, ids, limits, deltas);
    tokio::time::timeout(limits.deadline, phase_run)
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "transactional {kind} did not finish within {:?}",
                limits.deadline
            )
        })?
}

async fn execute_within_deadline(
    kind: OperationKind,
    phase: &PhaseContext,
    ids: Vec<u64>,
    limits: &ExecutionLimits,
    deltas: Option<&DeltaMap>,
) -> Result<RunReport> {
    let start_time = Instant::now();
    let processed = ids.len() as u64;

    let (ops, missing_keys) = match kind {
        OperationKind::Create => {
            remove_existing(phase, &ids, limits).await?;
            let ops = ids
                .iter()
                .map(|&id| TransactionOp::Insert {
                    key: phase.key(id),
                    payload: phase.template.generate(id),
                })
                .collect();
            (ops, Vec::new())
        }
        OperationKind::Update => {
            let (found, missing) = fetch_all(phase, &ids, limits).await?;
            if let Some(&first) = missing.first() {
                anyhow::bail!(
                    "cannot update {} missing keys, first of them: {}",
                    missing.len(),
                    phase.key(first)
                );
            }
            let mut ops = Vec::with_capacity(found.len());
            for (key, existing) in found {
                let payload = phase
                    .template
                    .mutate(existing, &phase.spec.fields_to_update)
                    .with_context(|| format!("Failed to mutate {key}"))?;
                ops.push(TransactionOp::Replace { key, payload });
            }
            (ops, missing)
        }
        OperationKind::Delete => {
            let (found, missing) = fetch_all(phase, &ids, limits).await?;
            for &id in &missing {
                warn!(collection = %phase.collection.name(), key = phase.key(id), "deleting a missing key");
            }
            let ops = found
                .into_iter()
                .map(|(key, _)| TransactionOp::Remove { key })
                .collect();
            (ops, missing)
        }
        OperationKind::Retrieve => anyhow::bail!("retrieve does not mutate"),
    };

    let mut stats = PhaseStatsFactory::new()?.create();
    let done = ops.len() as u64;
    if !ops.is_empty() {
        let committed: Vec<(String, Option<Payload>)> = ops
            .iter()
            .map(|op| match op {
                TransactionOp::Insert { key, payload } | TransactionOp::Replace { key, payload } => {
                    (key.clone(), Some(payload.clone()))
                }
                TransactionOp::Remove { key } => (key.clone(), None),
            })
            .collect();

        let commit_start = Instant::now();
        let options = TransactionOptions::default();
        let result = phase.collection.transaction(ops, &options).await;
        stats.account_attempt(commit_start.elapsed(), &result);
        result.context("transaction aborted, no mutation was applied")?;
        info!(collection = %phase.collection.name(), %kind, mutations = done, "transaction committed");

        for (key, payload) in committed {
            if let Some(deltas) = deltas {
                match &payload {
                    Some(payload) => deltas.record_upsert(&key, payload),
                    None => deltas.record_tombstone(&key),
                }
            }
            phase.log_mutation(kind, &key);
        }
    }

    Ok(RunReport {
        processed,
        done,
        missing: missing_keys.len() as u64,
        missing_keys,
        batches: 1,
        elapsed: start_time.elapsed(),
        stats,
    })
}

// Retries transient failures of a single call up to `max_retries` times.
// A missing key is an answer, not a failure, so it is returned at once.
async fn with_retries<T, F, Fut>(limits: &ExecutionLimits, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() || !err.is_retryable() => return Err(err),
            Err(err) => err,
        };
        if attempt >= limits.max_retries {
            return Err(err);
        }
        debug!(attempt, error = %err, "retrying");
        attempt += 1;
        if !limits.retry_backoff.is_zero() {
            tokio::time::sleep(limits.retry_backoff).await;
        }
    }
}

// Makes sure that none of the keys exists, so that inserts cannot conflict.
async fn remove_existing(phase: &PhaseContext, ids: &[u64], limits: &ExecutionLimits) -> Result<()> {
    stream::iter(ids.iter().map(|&id| phase.key(id)))
        .map(|key| async move {
            match with_retries(limits, || phase.collection.remove(&key)).await {
                Err(err) if !err.is_not_found() => Err(err),
                _ => Ok(()),
            }
        })
        .buffer_unordered(limits.concurrency.max(1))
        .try_collect::<()>()
        .await
        .context("Failed to remove pre-existing documents")
}

// Fetches the documents of all keys, separating out the missing ones.
async fn fetch_all(
    phase: &PhaseContext,
    ids: &[u64],
    limits: &ExecutionLimits,
) -> Result<(Vec<(String, Payload)>, Vec<u64>)> {
    let fetched: Vec<(u64, Option<Payload>)> = stream::iter(ids.iter().copied())
        .map(|id| async move {
            let key = phase.key(id);
            match with_retries(limits, || phase.collection.get(&key)).await {
                Ok(payload) => Ok((id, Some(payload))),
                Err(err) if err.is_not_found() => Ok((id, None)),
                Err(err) => Err(err),
            }
        })
        .buffered(limits.concurrency.max(1))
        .try_collect()
        .await
        .context("Failed to fetch documents")?;

    let mut found = Vec::with_capacity(fetched.len());
    let mut missing = Vec::new();
    for (id, payload) in fetched {
        match payload {
            Some(payload) => found.push((phase.key(id), payload)),
            None => missing.push(id),
        }
    }
    missing.sort_unstable();
    Ok((found, missing))
}
