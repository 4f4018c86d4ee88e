#[macro_use]
extern crate async_trait;

#[cfg(test)]
pub(crate) mod test_util;

pub mod configuration;
pub mod fanout;
pub mod keyspace;
pub mod operation;
pub mod payload;
pub mod reconcile;
pub mod run;
pub mod secondary;
pub mod sharded_stats;
pub mod stats;
pub mod store;
pub mod template;
pub mod version;
pub mod workload;
