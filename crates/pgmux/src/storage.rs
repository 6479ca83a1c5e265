//! Storage facade: builds statements with a [`QueryBuilder`] and runs them on a client.
//!
//! ```ignore
//! use pgmux::{Joiner, Storage};
//!
//! let mut storage = Storage::new(client, model);
//! let ids = storage.create(&[("name", "ann".into()), ("bio", "hi".into())]).await?;
//! storage.featuring(Joiner::And, [("bio", "h")])?;
//! let rows = storage.read(&["name", "bio"], &[]).await?;
//! ```
//!
//! Multi-table writes run as separate statements. Hand the facade a
//! `tokio_postgres::Transaction` when the write has to be atomic.

use crate::client::GenericClient;
use crate::error::{MuxError, MuxResult};
use crate::manifest::ManifestModel;
use crate::qb::{Criteria, Identity, Joiner, Match, QueryBuilder, SortDirection, TableStatement};
use crate::row::{Record, get_i64};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "tracing")]
fn log_statement(kind: &'static str, table: Option<&str>, sql: &str, param_count: usize) {
    tracing::debug!(
        target: "pgmux.sql",
        query_type = kind,
        table = table.unwrap_or("-"),
        param_count,
        sql = %sql,
    );
}

#[cfg(not(feature = "tracing"))]
fn log_statement(_kind: &'static str, _table: Option<&str>, _sql: &str, _param_count: usize) {}

/// Entity storage over a manifest, bound to one client.
///
/// Condition, sort and limit calls accumulate on the facade and are consumed by the next
/// [`Storage::read`]. One facade serves one request at a time.
pub struct Storage<C> {
    client: C,
    builder: QueryBuilder,
}

impl<C: GenericClient> Storage<C> {
    pub fn new(client: C, model: Arc<ManifestModel>) -> Self {
        Self {
            client,
            builder: QueryBuilder::new(model),
        }
    }

    /// Qualify table names with a Postgres schema.
    pub fn with_schema(client: C, model: Arc<ManifestModel>, schema: &str) -> MuxResult<Self> {
        Ok(Self {
            client,
            builder: QueryBuilder::new(model).with_schema(schema)?,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn model(&self) -> &ManifestModel {
        self.builder.model()
    }

    /// Read flat records for `columns`, narrowed by any accumulated conditions and by
    /// `filter` (exact matches, AND-joined).
    pub async fn read(
        &mut self,
        columns: &[&str],
        filter: &[(&str, Value)],
    ) -> MuxResult<Vec<Record>> {
        if !filter.is_empty() {
            let criteria: Criteria = filter.iter().map(|(k, v)| (*k, v.clone())).collect();
            self.builder.matching(Joiner::And, criteria)?;
        }
        let built = self.builder.select(columns)?;
        log_statement("select", None, &built.sql, built.params.len());
        self.client.query(&built.sql, &built.params.as_refs()).await
    }

    /// Write one logical entity across its tables.
    ///
    /// Returns table → identity the row was written under.
    pub async fn create(&mut self, values: &[(&str, Value)]) -> MuxResult<BTreeMap<String, i64>> {
        let plan = self.builder.insert(values)?;
        let key = self.builder.model().primary_key().to_string();

        let mut generated: Option<i64> = None;
        let mut ids = BTreeMap::new();
        for stmt in &plan.statements {
            let params = stmt.bind(generated)?;
            log_statement("insert", Some(&stmt.table), &stmt.sql, params.len());

            if stmt.returns_key {
                let rows = self.client.query(&stmt.sql, &params.as_refs()).await?;
                let id = rows
                    .first()
                    .and_then(|r| get_i64(r, &key))
                    .ok_or_else(|| MuxError::decode(&key, "insert returned no generated key"))?;
                generated = Some(id);
                ids.insert(stmt.table.clone(), id);
                continue;
            }

            if let Err(e) = self.client.execute(&stmt.sql, &params.as_refs()).await {
                #[cfg(feature = "tracing")]
                if let Some(id) = generated {
                    tracing::warn!(
                        target: "pgmux.sql",
                        table = %stmt.table,
                        orphaned_id = id,
                        error = %e,
                        "secondary insert failed after primary insert"
                    );
                }
                return Err(e);
            }
            let id = match stmt.identity {
                Identity::Supplied(id) => id,
                Identity::Generated => generated.ok_or_else(|| {
                    MuxError::request(format!("no generated key for `{}`", stmt.table))
                })?,
            };
            ids.insert(stmt.table.clone(), id);
        }
        Ok(ids)
    }

    /// Update every table touched by `values`; returns table → affected rows.
    pub async fn update(
        &mut self,
        values: &[(&str, Value)],
        filter: &[(&str, Value)],
    ) -> MuxResult<BTreeMap<String, u64>> {
        let statements = self.builder.update(values, filter)?;
        self.execute_each("update", statements).await
    }

    /// Delete from every table `filter` projects onto; returns table → affected rows.
    pub async fn delete(&mut self, filter: &[(&str, Value)]) -> MuxResult<BTreeMap<String, u64>> {
        let statements = self.builder.delete(filter)?;
        self.execute_each("delete", statements).await
    }

    async fn execute_each(
        &self,
        kind: &'static str,
        statements: Vec<TableStatement>,
    ) -> MuxResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for stmt in statements {
            log_statement(kind, Some(&stmt.table), &stmt.sql, stmt.params.len());
            let affected = self.client.execute(&stmt.sql, &stmt.params.as_refs()).await?;
            counts.insert(stmt.table, affected);
        }
        Ok(counts)
    }

    pub fn condition(
        &mut self,
        kind: Match,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.builder.condition(kind, joiner, criteria)
    }

    pub fn matching(&mut self, joiner: Joiner, criteria: impl Into<Criteria>) -> MuxResult<String> {
        self.builder.matching(joiner, criteria)
    }

    pub fn featuring(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.builder.featuring(joiner, criteria)
    }

    pub fn starts_with(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.builder.starts_with(joiner, criteria)
    }

    pub fn ends_with(
        &mut self,
        joiner: Joiner,
        criteria: impl Into<Criteria>,
    ) -> MuxResult<String> {
        self.builder.ends_with(joiner, criteria)
    }

    pub fn either(&mut self, criteria: impl Into<Criteria>) -> MuxResult<String> {
        self.builder.either(criteria)
    }

    pub fn sort(&mut self, column: &str, direction: SortDirection) -> MuxResult<()> {
        self.builder.sort(column, direction)
    }

    pub fn limit(&mut self, page: u64, page_size: u64) -> MuxResult<()> {
        self.builder.limit(page, page_size)
    }

    /// Create every manifest table inside `namespace`.
    pub async fn create_tables_from_manifest(&self, namespace: &str) -> MuxResult<()> {
        let statements = self.builder.create_tables_sql(namespace)?;
        let batch = statements.join(";\n");
        log_statement("create", None, &batch, 0);
        self.client.batch_execute(&batch).await
    }
}
