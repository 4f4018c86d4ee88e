//! A store backed by a Scylla / Cassandra cluster.
//!
//! A bucket maps to a keyspace and a collection to the table
//! `<scope>__<collection>` within it. Every table has the same layout:
//!
//! ```text
//! key text PRIMARY KEY, body blob, is_binary boolean
//! ```
//!
//! Transactions are executed as a single LOGGED batch after checking that
//! every key is in the expected state. Logged batches are atomic, but large
//! ones are rejected by the cluster (`batch_size_fail_threshold_in_kb`), so
//! transactional runs should be kept small.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::{Batch, BatchType};
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::Consistency;
use scylla::value::CqlValue;
use tracing::{debug, info, warn};

use super::{
    Collection, CollectionName, DocumentStore, Durability, StoreError, TransactionOp,
    TransactionOptions,
};
use crate::payload::Payload;

const TABLE_SEPARATOR: &str = "__";

pub struct ScyllaStoreConfig {
    pub nodes: Vec<String>,
    pub username: String,
    pub password: String,
    pub replication_factor: u64,
    pub consistency: Consistency,
}

pub struct ScyllaStore {
    session: Arc<Session>,
    replication_factor: u64,
    consistency: Consistency,
}

impl ScyllaStore {
    pub async fn connect(config: &ScyllaStoreConfig) -> Result<Self> {
        let mut builder = SessionBuilder::new().known_nodes(&config.nodes);

        if !config.username.is_empty() && !config.password.is_empty() {
            builder = builder.user(&config.username, &config.password);
        }

        let session = builder
            .build()
            .await
            .with_context(|| format!("Failed to connect to {:?}", config.nodes))?;

        Ok(Self {
            session: Arc::new(session),
            replication_factor: config.replication_factor,
            consistency: config.consistency,
        })
    }

    async fn ensure_table(&self, bucket: &str, name: &CollectionName) -> Result<()> {
        let create_keyspace_query_str = format!(
            "CREATE KEYSPACE IF NOT EXISTS \"{}\" WITH REPLICATION = \
            {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            bucket, self.replication_factor,
        );
        self.session
            .query_unpaged(create_keyspace_query_str, ())
            .await
            .context("Failed to create keyspace")?;

        let create_table_query_str = format!(
            "CREATE TABLE IF NOT EXISTS {} \
            (key text PRIMARY KEY, body blob, is_binary boolean)",
            qualified_table(bucket, name),
        );
        self.session
            .query_unpaged(create_table_query_str, ())
            .await
            .context("Failed to create table")?;

        self.session.await_schema_agreement().await?;
        Ok(())
    }

    async fn prepare(&self, query: String) -> Result<PreparedStatement> {
        let mut statement = self.session.prepare(query).await?;
        statement.set_is_idempotent(true);
        statement.set_consistency(self.consistency);
        Ok(statement)
    }
}

#[async_trait]
impl DocumentStore for ScyllaStore {
    async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let wait = async {
            loop {
                match self
                    .session
                    .query_unpaged("SELECT release_version FROM system.local", ())
                    .await
                {
                    Ok(_) => return,
                    Err(err) => {
                        warn!(error = %err, "cluster is not ready yet");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .with_context(|| format!("Cluster was not ready within {timeout:?}"))
    }

    async fn collections(&self, bucket: &str) -> Result<Vec<CollectionName>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT table_name FROM system_schema.tables WHERE keyspace_name = ?",
                (bucket,),
            )
            .await
            .with_context(|| format!("Failed to list tables of {bucket}"))?;

        let mut names = Vec::new();
        for row in result.into_rows_result()?.rows::<(String,)>()? {
            let (table,) = row?;
            match table.split_once(TABLE_SEPARATOR) {
                Some((scope, collection)) => names.push(CollectionName::new(scope, collection)),
                None => debug!(table, "skipping table which is not a collection"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn collection(&self, bucket: &str, name: &CollectionName) -> Result<Arc<dyn Collection>> {
        self.ensure_table(bucket, name).await?;

        let table = qualified_table(bucket, name);
        let upsert = self
            .prepare(format!(
                "INSERT INTO {table} (key, body, is_binary) VALUES (?, ?, ?) USING TTL ?"
            ))
            .await?;
        let select = self
            .prepare(format!("SELECT body, is_binary FROM {table} WHERE key = ?"))
            .await?;
        let exists = self
            .prepare(format!("SELECT key FROM {table} WHERE key = ?"))
            .await?;
        let delete = self
            .prepare(format!("DELETE FROM {table} WHERE key = ?"))
            .await?;

        info!(collection = %name, table, "opened collection");

        Ok(Arc::new(ScyllaCollection {
            session: Arc::clone(&self.session),
            name: name.clone(),
            upsert,
            select,
            exists,
            delete,
        }))
    }
}

pub struct ScyllaCollection {
    session: Arc<Session>,
    name: CollectionName,
    upsert: PreparedStatement,
    select: PreparedStatement,
    exists: PreparedStatement,
    delete: PreparedStatement,
}

impl ScyllaCollection {
    async fn key_exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self
            .session
            .execute_unpaged(&self.exists, (key,))
            .await
            .map_err(transient)?;
        let row = result
            .into_rows_result()
            .map_err(transient)?
            .maybe_first_row::<(String,)>()
            .map_err(transient)?;
        Ok(row.is_some())
    }

    fn upsert_values(key: &str, payload: &Payload, ttl: i32) -> Vec<CqlValue> {
        vec![
            CqlValue::Text(key.to_string()),
            CqlValue::Blob(payload.to_bytes()),
            CqlValue::Boolean(payload.is_binary()),
            CqlValue::Int(ttl),
        ]
    }
}

#[async_trait]
impl Collection for ScyllaCollection {
    fn name(&self) -> &CollectionName {
        &self.name
    }

    async fn upsert(
        &self,
        key: &str,
        payload: &Payload,
        expiry: Option<Duration>,
    ) -> Result<(), StoreError> {
        let values = Self::upsert_values(key, payload, ttl_seconds(expiry));
        self.session
            .execute_unpaged(&self.upsert, values)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Payload, StoreError> {
        let result = self
            .session
            .execute_unpaged(&self.select, (key,))
            .await
            .map_err(transient)?;
        let row = result
            .into_rows_result()
            .map_err(transient)?
            .maybe_first_row::<(Vec<u8>, bool)>()
            .map_err(|err| StoreError::Malformed {
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        let (body, is_binary) = row.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Payload::from_bytes(body, is_binary).map_err(|err| StoreError::Malformed {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.key_exists(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.session
            .execute_unpaged(&self.delete, (key,))
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn transaction(
        &self,
        ops: Vec<TransactionOp>,
        options: &TransactionOptions,
    ) -> Result<(), StoreError> {
        let checks = ops.iter().map(|op| self.key_exists(op.key()));
        let existing = future::try_join_all(checks).await?;

        let mut batch = Batch::new(BatchType::Logged);
        batch.set_consistency(consistency_for(options.durability));
        let mut values: Vec<Vec<CqlValue>> = Vec::with_capacity(ops.len());

        for (op, exists) in ops.iter().zip(existing) {
            match op {
                TransactionOp::Insert { key, .. } if exists => {
                    return Err(StoreError::Transaction(format!("{key} already exists")));
                }
                TransactionOp::Replace { key, .. } | TransactionOp::Remove { key } if !exists => {
                    return Err(StoreError::Transaction(format!("{key} does not exist")));
                }
                TransactionOp::Insert { key, payload } | TransactionOp::Replace { key, payload } => {
                    batch.append_statement(self.upsert.clone());
                    values.push(Self::upsert_values(key, payload, 0));
                }
                TransactionOp::Remove { key } => {
                    batch.append_statement(self.delete.clone());
                    values.push(vec![CqlValue::Text(key.clone())]);
                }
            }
        }

        if values.is_empty() {
            return Ok(());
        }

        match tokio::time::timeout(options.expiration, self.session.batch(&batch, values)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(StoreError::Transaction(err.to_string())),
            Err(_) => Err(StoreError::Transaction(format!(
                "not committed within {:?}",
                options.expiration
            ))),
        }
    }
}

fn qualified_table(bucket: &str, name: &CollectionName) -> String {
    format!(
        "\"{}\".\"{}{}{}\"",
        bucket, name.scope, TABLE_SEPARATOR, name.collection
    )
}

fn consistency_for(durability: Durability) -> Consistency {
    match durability {
        Durability::One => Consistency::One,
        Durability::Majority => Consistency::Quorum,
        Durability::All => Consistency::All,
    }
}

// Zero means "no TTL"
fn ttl_seconds(expiry: Option<Duration>) -> i32 {
    expiry
        .map(|e| e.as_secs().min(i32::MAX as u64) as i32)
        .unwrap_or(0)
}

fn transient(err: impl Display) -> StoreError {
    StoreError::Transient(err.to_string())
}
