use super::condition::render_where;
use super::{BuiltQuery, QueryBuilder};
use crate::error::{MuxError, MuxResult};
use crate::ident;
use crate::param::ParamList;
use std::sync::Arc;

impl QueryBuilder {
    /// Assemble a SELECT over flat logical column names.
    ///
    /// Every requested column pulls in its table and that table's index column. When more
    /// than one table is active, the shared key is registered too, so the primary table
    /// always anchors the FROM clause and every other table is joined to it on the shared
    /// key. Index columns of joined tables are projected as `<table>_<index>`.
    pub fn select(&mut self, columns: &[&str]) -> MuxResult<BuiltQuery> {
        let mut state = self.take_state();
        let model = Arc::clone(&self.model);

        for column in columns {
            state.register(&model, column)?;
        }
        if state.active_tables.is_empty() {
            return Err(MuxError::request("select requires at least one column"));
        }

        let key = model.primary_key();
        if state.active_tables.len() > 1 {
            state.register(&model, key)?;
        }
        let anchor = state
            .active_tables
            .iter()
            .find(|t| *t == model.primary_table())
            .unwrap_or(&state.active_tables[0])
            .clone();

        let mut projection = state.projection.clone();
        let mut from = format!("FROM {}", self.table_ref(&anchor));

        for table in state.active_tables.iter().filter(|t| **t != anchor) {
            let anchor_key = model.key_column_in(&anchor).ok_or_else(|| {
                MuxError::schema(format!("table `{anchor}` does not carry the key `{key}`"))
            })?;
            let table_key = model.key_column_in(table).ok_or_else(|| {
                MuxError::schema(format!("table `{table}` does not carry the key `{key}`"))
            })?;
            from.push_str(&format!(
                " JOIN {} ON {} = {}",
                self.table_ref(table),
                ident::qualified(table, table_key),
                ident::qualified(&anchor, anchor_key),
            ));

            let index = model.column(model.table_index(table)?)?;
            projection.push(format!(
                "{} AS {}",
                index.qualified(),
                ident::quote(&format!("{}_{}", table, index.column))
            ));
        }

        let mut params = ParamList::new();
        let mut sql = format!("SELECT {} {}", projection.join(", "), from);
        if let Some(filter) = render_where(&state.roots, state.bound_terms, &mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        if !state.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&state.sort.join(", "));
        }
        if let Some(limit) = &state.limit {
            sql.push(' ');
            sql.push_str(limit);
        }

        Ok(BuiltQuery { sql, params })
    }
}
