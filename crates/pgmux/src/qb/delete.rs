use super::{QueryBuilder, TableStatement, project_filter, render_filter};
use crate::error::{MuxError, MuxResult};
use crate::param::ParamList;
use crate::value::Value;

impl QueryBuilder {
    /// Plan one DELETE per table that `filter` projects onto.
    ///
    /// Filtering on the shared key removes the entity from every table carrying it.
    pub fn delete(&mut self, filter: &[(&str, Value)]) -> MuxResult<Vec<TableStatement>> {
        self.reset();
        let model = &self.model;

        let groups = project_filter(model, filter)?;
        if groups.is_empty() {
            return Err(MuxError::request("delete requires a filter"));
        }

        let mut statements = Vec::with_capacity(groups.len());
        for (table, scoped) in groups {
            let mut params = ParamList::new();
            let filter_sql = render_filter(model, &scoped, &mut params)?;
            statements.push(TableStatement {
                sql: format!("DELETE FROM {} WHERE {}", self.table_ref(&table), filter_sql),
                table,
                params,
            });
        }
        Ok(statements)
    }
}
