//! Generic client trait for unified database access.

use crate::error::{MuxError, MuxResult};
use crate::row::{FromRow, Record};
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
///
/// [`crate::Storage`] runs every statement through this trait, so a caller can hand it a
/// plain connection or a transaction to make multi-table writes atomic.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows as flat records.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = MuxResult<Vec<Record>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = MuxResult<u64>> + Send;

    /// Execute one or more parameterless statements separated by `;`.
    fn batch_execute(&self, sql: &str) -> impl std::future::Future<Output = MuxResult<()>> + Send;
}

fn records(rows: Vec<tokio_postgres::Row>) -> MuxResult<Vec<Record>> {
    rows.iter().map(Record::from_row).collect()
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> MuxResult<Vec<Record>> {
        let rows = tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(MuxError::from_db_error)?;
        records(rows)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> MuxResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(MuxError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> MuxResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(MuxError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> MuxResult<Vec<Record>> {
        let rows = tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(MuxError::from_db_error)?;
        records(rows)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> MuxResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(MuxError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> MuxResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(MuxError::from_db_error)
    }
}
