use std::iter::Iterator;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use strum_macros::{Display, EnumString};

use doc_stress::configuration::{ExecutionLimits, RetrieveBound, SecondarySyncTarget, WorkloadSpec};
use doc_stress::fanout::Target;
use doc_stress::store::CollectionName;
use doc_stress::template::TemplateKind;

use crate::cli::flags::{FlagType, ParserBuilder};

const SECONDARY_SYNC_MAX_RETRIES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    Cql,
    Memory,
}

/// Accepted for compatibility. Keys are always dispatched in sequential
/// or shuffled order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LoadPattern {
    Uniform,
    Sparse,
    Dense,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl LogLevel {
    /// The equivalent filter directive.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
            LogLevel::Off => "off",
        }
    }
}

macro_rules! strum_flag_type {
    ($($t:ty),*) => {
        $(
            impl FlagType for $t {
                fn parse(s: &str) -> Result<Self> {
                    s.parse()
                        .map_err(|_| anyhow::anyhow!("Invalid value: {s}"))
                }

                fn to_string(&self) -> String {
                    ToString::to_string(self)
                }
            }
        )*
    };
}

strum_flag_type!(StoreKind, LoadPattern, LogLevel, RetrieveBound);

// Explicitly marked as `pub(crate)`, because with `pub` rustc doesn't
// complain about fields which are never read
pub(crate) struct DocStressArgs {
    pub store: StoreKind,
    pub nodes: Vec<String>,
    pub username: String,
    pub password: String,
    pub bucket: String,
    pub replication_factor: u64,

    /// The collection given by `-s` and `-c`.
    pub collection: CollectionName,
    pub target: Target,

    pub workload: WorkloadSpec,
    pub limits: ExecutionLimits,

    pub percent_read: u64,
    pub load_pattern: LoadPattern,

    pub loop_forever: bool,
    pub loop_interval: Duration,
    pub log_level: LogLevel,
}

impl DocStressArgs {
    pub fn print_configuration(&self) {
        let spec = &self.workload;
        println!("Configuration");
        println!("Store:\t\t\t{}", self.store);
        if self.store == StoreKind::Cql {
            println!("Nodes:\t\t\t{}", self.nodes.join(","));
            println!("Replication factor:\t{}", self.replication_factor);
        }
        println!("Bucket:\t\t\t{}", self.bucket);
        match &self.target {
            Target::Single(name) => println!("Collection:\t\t{name}"),
            Target::All => println!("Collection:\t\tall"),
        }
        println!("Operations:\t\t{}", spec.num_ops);
        println!(
            "Create/update/delete:\t{}% / {}% / {}%",
            spec.percent_create, spec.percent_update, spec.percent_delete
        );
        if self.percent_read > 0 {
            println!("Read:\t\t\t{}% (ignored)", self.percent_read);
        }
        println!("Load pattern:\t\t{}", self.load_pattern);
        println!("Keys:\t\t\t{}", spec.key_for(spec.start_seq_num));
        println!("Template:\t\t{}", spec.template_name);
        println!("Document size:\t\t{}", spec.doc_size);
        match spec.expiry {
            Some(expiry) => println!("Expiry:\t\t\t{}s", expiry.as_secs()),
            None => println!("Expiry:\t\t\tnone"),
        }
        println!("Shuffle:\t\t{}", spec.shuffle);
        println!("Transactions:\t\t{}", spec.transactional);
        println!("Workers:\t\t{}", self.limits.concurrency);
        println!("Max retries:\t\t{}", self.limits.max_retries);
        println!(
            "Deadline:\t\t{}",
            crate::cli::strconv::format_duration(self.limits.deadline)
        );
        println!("Retrieve bound:\t\t{}", spec.retrieve_bound);
        if let Some(target) = &spec.secondary_sync {
            println!("Secondary sync:\t\t{}", target.bulk_url());
            println!("Bulk directory:\t\t{}", target.bulk_dir.display());
        }
        if self.loop_forever {
            println!("Loop interval:\t\t{}s", self.loop_interval.as_secs());
        }
        println!();
    }
}

pub(crate) enum ParseResult {
    Config(Box<DocStressArgs>),
    HelpDisplayed,
    VersionDisplayed,
}

/// Parses and validates the command line.
///
/// Prints the error and the usage on failure, in which case `None`
/// is returned.
pub(crate) fn parse_doc_stress_args<I, S>(mut args: I, print_info: bool) -> Option<ParseResult>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let program_name = args
        .next()
        .map(|s| s.as_ref().to_string())
        .unwrap_or_else(|| "doc-stress".to_string());

    let mut flag = ParserBuilder::new();

    // Connection
    let cluster = flag.string_var(&["i", "cluster"], "", "comma separated contact nodes (required)");
    let username = flag.string_var(&["u", "username"], "Administrator", "user of the store");
    let password = flag.string_var(&["p", "password"], "password", "password of the store user");
    let bucket = flag.string_var(&["b", "bucket"], "default", "name of the bucket");
    let scope = flag.string_var(&["s", "scope"], "_default", "name of the scope");
    let collection = flag.string_var(&["c", "collection"], "default", "name of the collection");
    let store = flag.var(&["store"], StoreKind::Cql, "store backend: cql, memory");
    let replication_factor = flag.u64_var(
        &["rf", "replication_factor"],
        1,
        "replication factor of keyspaces created by the cql store",
    );

    // Operations
    let num_ops = flag.u64_var(&["n", "num_ops"], 1000, "number of operations");
    let percent_create = flag.u64_var(&["pc", "percent_create"], 100, "percentage of creates out of num_ops");
    let percent_update = flag.u64_var(&["pu", "percent_update"], 0, "percentage of updates out of num_ops");
    let percent_delete = flag.u64_var(&["pd", "percent_delete"], 0, "percentage of deletes out of num_ops");
    let percent_read = flag.u64_var(
        &["pr", "percent_read"],
        0,
        "percentage of reads out of num_ops (ignored, surviving documents are always read)",
    );
    let load_pattern = flag.var(
        &["l", "load_pattern"],
        LoadPattern::Uniform,
        "load pattern: uniform, sparse, dense",
    );
    let num_threads = flag.u64_var(&["nt", "num_threads"], 4, "number of workers per operation kind");
    let shuffle_docs = flag.bool_var(
        &["sd", "shuffle_docs"],
        false,
        "if true, shuffle docs, else operate sequentially",
    );
    let all_collections = flag.bool_var(
        &["ac", "all_collections"],
        false,
        "if true, all collections of the bucket will be exercised",
    );
    let loop_forever = flag.bool_var(&["lf", "loop_forever"], false, "if true, repeat the workload forever");
    let loop_interval = flag.u64_var(&["li", "loop_interval"], 30, "sleep interval between loops in seconds");
    let transactions = flag.bool_var(
        &["tx", "transactions"],
        false,
        "apply the mutations of each phase in a single transaction",
    );

    // Documents
    let start_seq_num = flag.u64_var(&["dsn", "start_seq_num"], 1, "doc id start sequence number");
    let prefix = flag.string_var(&["dpx", "prefix"], "doc_", "doc id prefix");
    let suffix = flag.string_var(&["dsx", "suffix"], "", "doc id suffix");
    let template = flag.string_var(&["dt", "template"], "Person", "document template");
    let expiry = flag.u64_var(&["de", "expiry"], 0, "document expiry in seconds (0 for none)");
    let size = flag.u64_var(&["ds", "size"], 500, "document size in bytes");
    let fields_to_update = flag.string_var(
        &["fu", "fields_to_update"],
        "",
        "comma separated list of fields to update",
    );
    let data_file = flag.string_var(
        &["df", "data_file"],
        "",
        "JSON lines file with the records of a file-backed template",
    );

    // Secondary sync
    let elastic_sync = flag.bool_var(
        &["es", "elastic_sync"],
        false,
        "if true, mirror every mutation to the secondary store",
    );
    let elastic_host = flag.string_var(&["es_host", "elastic_host"], "", "secondary store host");
    let elastic_port = flag.string_var(&["es_port", "elastic_port"], "", "secondary store port");
    let elastic_login = flag.string_var(&["es_login", "elastic_login"], "", "secondary store user login");
    let elastic_password =
        flag.string_var(&["es_password", "elastic_password"], "", "secondary store password");
    let elastic_dir = flag.string_var(
        &["es_dir", "elastic_dir"],
        "",
        "directory for the bulk files (system temporary directory if empty)",
    );

    // Execution
    let queue_depth = flag.u64_var(&["qd", "queue_depth"], 100, "maximum number of keys waiting for a worker");
    let batch_size = flag.u64_var(&["bs", "batch_size"], 1000, "number of results drained at once");
    let max_retries = flag.u64_var(&["mr", "max_retries"], 20, "retries of a failed key");
    let deadline = flag.duration_var(
        &["dl", "deadline"],
        Duration::from_secs(1000),
        "a phase fails if it does not complete within this duration",
    );
    let retrieve_bound = flag.var(
        &["rb", "retrieve_bound"],
        RetrieveBound::Legacy,
        "upper bound of the retrieved range: legacy, exact",
    );

    // Output
    let log_level = flag.var(
        &["log_level"],
        LogLevel::Info,
        "log level: DEBUG, INFO, WARN, ERROR, FATAL, OFF",
    );
    let output = flag.bool_var(&["output"], false, "log the result of every mutation");
    let help = flag.bool_var(&["h", "help"], false, "print usage and exit");
    let version = flag.bool_var(&["v", "version"], false, "print version information and exit");

    let (parser, desc) = flag.build();

    let result = || -> Result<ParseResult> {
        parser.parse_args(args)?;

        if help.get() {
            if print_info {
                desc.print_help(&mut std::io::stdout(), &program_name)?;
            }
            return Ok(ParseResult::HelpDisplayed);
        }
        if version.get() {
            if print_info {
                println!("{}", doc_stress::version::format_version_info_human());
            }
            return Ok(ParseResult::VersionDisplayed);
        }

        let store = store.get();
        let nodes: Vec<String> = cluster
            .get()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        anyhow::ensure!(
            store == StoreKind::Memory || !nodes.is_empty(),
            "-i/--cluster is required by the {store} store"
        );

        let percent_create = percent_create.get();
        let percent_update = percent_update.get();
        let percent_delete = percent_delete.get();
        for (name, percent) in [
            ("percent_create", percent_create),
            ("percent_update", percent_update),
            ("percent_delete", percent_delete),
        ] {
            anyhow::ensure!(percent <= 100, "{name} must not exceed 100, got {percent}");
        }
        anyhow::ensure!(
            percent_delete <= percent_create,
            "percent_delete ({percent_delete}) must not exceed percent_create ({percent_create})"
        );

        let num_ops = num_ops.get();
        let start_seq_num = start_seq_num.get();
        anyhow::ensure!(
            start_seq_num.checked_add(num_ops).is_some(),
            "start_seq_num ({start_seq_num}) plus num_ops ({num_ops}) exceeds the key range"
        );

        let num_threads = num_threads.get();
        anyhow::ensure!(num_threads > 0, "num_threads must be positive");
        let queue_depth = queue_depth.get();
        anyhow::ensure!(queue_depth > 0, "queue_depth must be positive");
        let batch_size = batch_size.get();
        anyhow::ensure!(batch_size > 0, "batch_size must be positive");
        let max_retries = u32::try_from(max_retries.get()).context("max_retries is too large")?;

        let template_name = template.get();
        let data_file = data_file.get();
        let data_file = (!data_file.is_empty()).then(|| PathBuf::from(data_file));
        let template = TemplateKind::resolve(&template_name);
        anyhow::ensure!(
            template != TemplateKind::Dataset || data_file.is_some(),
            "template {template_name} is not built in, -df/--data_file is required"
        );

        let secondary_sync = if elastic_sync.get() {
            let host = elastic_host.get();
            let port = elastic_port.get();
            anyhow::ensure!(
                !host.is_empty() && !port.is_empty(),
                "-es_host and -es_port are required by -es/--elastic_sync"
            );
            let dir = elastic_dir.get();
            let bulk_dir = if dir.is_empty() {
                std::env::temp_dir()
            } else {
                PathBuf::from(dir)
            };
            Some(SecondarySyncTarget {
                host,
                port,
                login: elastic_login.get(),
                password: elastic_password.get(),
                bulk_dir,
                max_retries: SECONDARY_SYNC_MAX_RETRIES,
            })
        } else {
            None
        };

        let expiry = expiry.get();
        let workload = WorkloadSpec {
            num_ops,
            percent_create,
            percent_update,
            percent_delete,
            start_seq_num,
            key_prefix: prefix.get(),
            key_suffix: suffix.get(),
            template,
            template_name,
            data_file,
            doc_size: usize::try_from(size.get()).context("size is too large")?,
            expiry: (expiry > 0).then(|| Duration::from_secs(expiry)),
            shuffle: shuffle_docs.get(),
            transactional: transactions.get(),
            fields_to_update: fields_to_update
                .get()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            secondary_sync,
            output: output.get(),
            retrieve_bound: retrieve_bound.get(),
        };

        let limits = ExecutionLimits {
            concurrency: num_threads as usize,
            queue_depth: queue_depth as usize,
            batch_size: batch_size as usize,
            max_retries,
            deadline: deadline.get(),
            ..Default::default()
        };

        let collection = CollectionName::new(scope.get(), collection.get());
        let target = if all_collections.get() {
            Target::All
        } else {
            Target::Single(collection.clone())
        };

        Ok(ParseResult::Config(Box::new(DocStressArgs {
            store,
            nodes,
            username: username.get(),
            password: password.get(),
            bucket: bucket.get(),
            replication_factor: replication_factor.get(),
            collection,
            target,
            workload,
            limits,
            percent_read: percent_read.get(),
            load_pattern: load_pattern.get(),
            loop_forever: loop_forever.get(),
            loop_interval: Duration::from_secs(loop_interval.get()),
            log_level: log_level.get(),
        })))
    }();

    match result {
        Ok(result) => Some(result),
        Err(err) => {
            if print_info {
                eprintln!("Failed to parse flags: {err:#}");
                let _ = desc.print_help(&mut std::io::stderr(), &program_name);
            }
            None
        }
    }
}
