//! Flat result records.

use crate::error::{MuxError, MuxResult};
use crate::value::Value;
use std::collections::BTreeMap;
use tokio_postgres::Row;

/// One result row keyed by output column name.
pub type Record = BTreeMap<String, Value>;

/// Trait for types that can be built from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> MuxResult<Self>;
}

impl FromRow for Record {
    fn from_row(row: &Row) -> MuxResult<Self> {
        let mut record = Record::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value: Value = row
                .try_get(idx)
                .map_err(|e| MuxError::decode(column.name(), e.to_string()))?;
            record.insert(column.name().to_string(), value);
        }
        Ok(record)
    }
}

/// Integer view of a record column, if present and integral.
pub fn get_i64(record: &Record, column: &str) -> Option<i64> {
    record.get(column).and_then(Value::as_i64)
}
