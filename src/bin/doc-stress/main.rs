mod args;
mod cli;

#[cfg(test)]
mod args_test;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scylla::statement::Consistency;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use doc_stress::fanout::{self, FanOutReport};
use doc_stress::secondary::{SecondarySync, SecondarySyncError};
use doc_stress::store::cql::{ScyllaStore, ScyllaStoreConfig};
use doc_stress::store::memory::MemoryStore;
use doc_stress::store::DocumentStore;
use doc_stress::template;
use doc_stress::workload::Workload;

use crate::args::{DocStressArgs, LogLevel, ParseResult, StoreKind};

const READY_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ExitCode {
    let args = match args::parse_doc_stress_args(std::env::args(), true) {
        Some(ParseResult::Config(args)) => args,
        Some(ParseResult::HelpDisplayed | ParseResult::VersionDisplayed) => return ExitCode::SUCCESS,
        None => return ExitCode::FAILURE,
    };

    init_logging(args.log_level);
    args.print_configuration();

    let store = match connect(&args).await {
        Ok(store) => store,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Failed to connect to the store");
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = run(&args, store.as_ref()) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, closing the store");
            if args.loop_forever {
                Ok(())
            } else {
                Err(anyhow::anyhow!("interrupted before the workload completed"))
            }
        }
    };
    store.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "An error occurred during the workload");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect(args: &DocStressArgs) -> Result<Box<dyn DocumentStore>> {
    let store: Box<dyn DocumentStore> = match args.store {
        StoreKind::Cql => {
            let config = ScyllaStoreConfig {
                nodes: args.nodes.clone(),
                username: args.username.clone(),
                password: args.password.clone(),
                replication_factor: args.replication_factor,
                consistency: Consistency::Quorum,
            };
            Box::new(ScyllaStore::connect(&config).await?)
        }
        StoreKind::Memory => {
            let store = MemoryStore::new();
            store.create_collection(&args.bucket, &args.collection);
            Box::new(store)
        }
    };

    store
        .wait_until_ready(READY_TIMEOUT)
        .await
        .context("The store did not become ready")?;
    Ok(store)
}

async fn run(args: &DocStressArgs, store: &dyn DocumentStore) -> Result<()> {
    let spec = Arc::new(args.workload.clone());
    let template = template::build(&spec).context("Failed to prepare the document template")?;
    let secondary = match &spec.secondary_sync {
        Some(target) => Some(Arc::new(
            SecondarySync::http(target.clone()).context("Failed to set up secondary sync")?,
        )),
        None => None,
    };
    let workload = Arc::new(Workload::new(spec, template, args.limits.clone(), secondary));

    let mut iteration = 0u64;
    loop {
        iteration += 1;
        let result = run_once(args, store, Arc::clone(&workload)).await;
        if !args.loop_forever {
            return result;
        }

        if let Err(err) = result {
            if err.downcast_ref::<SecondarySyncError>().is_some() {
                return Err(err);
            }
            error!(iteration, error = %format!("{err:#}"), "workload iteration failed");
        }
        info!(iteration, interval = ?args.loop_interval, "waiting for the next iteration");
        tokio::time::sleep(args.loop_interval).await;
    }
}

async fn run_once(
    args: &DocStressArgs,
    store: &dyn DocumentStore,
    workload: Arc<Workload>,
) -> Result<()> {
    let report = fanout::run(
        store,
        &args.bucket,
        &args.target,
        workload,
        args.limits.concurrency,
    )
    .await?;
    print_report(&report);

    let failed = report.failures().count();
    anyhow::ensure!(
        failed == 0,
        "{failed} of {} collections failed",
        report.collections.len()
    );
    Ok(())
}

fn print_report(report: &FanOutReport) {
    for (name, result) in &report.collections {
        let Ok(collection) = result else {
            continue;
        };
        for phase in &collection.phases {
            let r = &phase.report;
            println!(
                "{name}\t{:<8}\tdone={} missing={} batches={} time={:?} {}",
                phase.kind.to_string(),
                r.done,
                r.missing,
                r.batches,
                r.elapsed,
                r.stats,
            );
            if phase.synced_files > 0 {
                println!("{name}\t{:<8}\tsynced files={}", "", phase.synced_files);
            }
        }
        if !collection.reconcile.is_consistent() {
            warn!(collection = %name, missing = ?collection.reconcile.missing, "documents are missing");
        }
        println!("{name}\t{}", collection.reconcile);
    }
}
