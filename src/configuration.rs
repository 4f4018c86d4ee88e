use std::path::PathBuf;
use std::time::Duration;

use crate::store::StoreError;
use crate::template::TemplateKind;

/// Describes a workload: how many documents are touched by each kind of
/// operation, how their keys look like and what they contain.
///
/// Built once per run and shared read-only by every phase.
#[derive(Clone, Debug)]
pub struct WorkloadSpec {
    /// The base operation count. Counts of individual operation kinds
    /// are derived from it with the `percent_*` fields.
    pub num_ops: u64,

    /// Percentage of `num_ops` which will be created.
    pub percent_create: u64,

    /// Percentage of `num_ops` which will be updated.
    ///
    /// Updates target keys from the created range, not new ones.
    pub percent_update: u64,

    /// Percentage of `num_ops` which will be deleted.
    ///
    /// Like updates, deletes target keys from the created range. Callers
    /// are expected to keep `percent_create >= percent_delete`.
    pub percent_delete: u64,

    /// The integer id of the first document.
    pub start_seq_num: u64,

    pub key_prefix: String,
    pub key_suffix: String,

    /// The resolved document template.
    pub template: TemplateKind,

    /// The template name as given by the user. File-backed templates
    /// put it into the `type` field of every record.
    pub template_name: String,

    /// Path to the JSON-lines dataset used by file-backed templates.
    pub data_file: Option<PathBuf>,

    /// Target payload size, in bytes.
    pub doc_size: usize,

    /// Document expiry. `None` means that documents never expire.
    pub expiry: Option<Duration>,

    /// Whether keys should be dispatched in random order.
    pub shuffle: bool,

    /// Whether mutations are grouped into one atomic transaction per phase.
    pub transactional: bool,

    /// Whitelist of fields modified by updates. Empty list means that
    /// the template modifies its default field.
    pub fields_to_update: Vec<String>,

    /// Where the mutation deltas are mirrored, if anywhere.
    pub secondary_sync: Option<SecondarySyncTarget>,

    /// Logs every individual mutation result.
    pub output: bool,

    /// How the upper end of the retrieve range is computed.
    pub retrieve_bound: RetrieveBound,
}

impl WorkloadSpec {
    pub fn key_for(&self, id: u64) -> String {
        crate::keyspace::format_key(&self.key_prefix, id, &self.key_suffix)
    }
}

/// Connection details of the secondary bulk sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondarySyncTarget {
    pub host: String,
    pub port: String,
    pub login: String,
    pub password: String,

    /// Directory where the bulk files are staged before upload.
    pub bulk_dir: PathBuf,

    /// How many times a rejected file is sent again.
    pub max_retries: u32,
}

impl SecondarySyncTarget {
    pub fn bulk_url(&self) -> String {
        format!("http://{}:{}/_bulk", self.host, self.port)
    }
}

/// The upper bound used to compute the range of keys verified by Retrieve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RetrieveBound {
    /// `[start + delete_count, create_count]`, inclusive and not shifted
    /// by the starting sequence number.
    Legacy,

    /// `[start + delete_count, start + create_count)`.
    Exact,
}

/// Limits imposed on a single executor invocation.
#[derive(Clone, Debug)]
pub struct ExecutionLimits {
    /// The number of worker tasks. Must not be zero.
    pub concurrency: usize,

    /// The maximum number of keys waiting for a free worker.
    pub queue_depth: usize,

    /// The number of results gathered before they are drained.
    pub batch_size: usize,

    /// How many times a failed key is retried after the first attempt.
    pub max_retries: u32,

    /// The whole phase fails if it takes longer than this.
    pub deadline: Duration,

    /// Pause between two attempts of the same key.
    pub retry_backoff: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_depth: 100,
            batch_size: 1000,
            max_retries: 20,
            deadline: Duration::from_secs(1000),
            retry_backoff: Duration::ZERO,
        }
    }
}

/// Contains all necessary context needed to execute an Operation.
pub struct OperationContext {
    /// The sequential number of the key within the phase.
    ///
    /// The tool dispatches keys in order, however because of the parallelism
    /// the operations can be reordered.
    pub operation_id: u64,

    /// The integer id of the targeted document.
    pub key_id: u64,

    /// Zero for the first attempt, incremented on every retry.
    pub attempt: u32,
}

/// What happened to a single key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Done,

    /// The key was not there. Counted, but not fatal.
    Missing,
}

/// Represents an operation which is performed once for every key of a phase.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Executes the operation for the key described by the OperationContext.
    ///
    /// The operation should behave deterministically, i.e. the same action
    /// should be performed when given the same key. This makes it possible
    /// to control the retry logic outside the Operation.
    async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError>;

    /// Decides what happens to a key which still fails after the last retry.
    ///
    /// Returning `Err` makes the whole phase fail.
    fn on_retries_exhausted(
        &self,
        _ctx: &OperationContext,
        err: StoreError,
    ) -> Result<KeyOutcome, StoreError> {
        Err(err)
    }
}
