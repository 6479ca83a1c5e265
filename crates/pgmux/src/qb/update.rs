use super::{QueryBuilder, TableStatement, group_by_table, project_filter, render_filter, resolve};
use crate::error::{MuxError, MuxResult};
use crate::ident;
use crate::param::ParamList;
use crate::value::Value;

impl QueryBuilder {
    /// Plan one UPDATE per table touched by `values`.
    ///
    /// Each statement is scoped by the part of `filter` that projects onto its table; a
    /// touched table with nothing to filter on is rejected rather than updated wholesale.
    pub fn update(
        &mut self,
        values: &[(&str, Value)],
        filter: &[(&str, Value)],
    ) -> MuxResult<Vec<TableStatement>> {
        self.reset();
        let model = &self.model;

        let mut entries = Vec::with_capacity(values.len());
        for (name, value) in values {
            entries.push((resolve(model, name)?.clone(), name.to_string(), value.clone()));
        }
        let groups = group_by_table(model, entries);
        if groups.is_empty() {
            return Err(MuxError::request("update has no columns to write"));
        }
        let filters = project_filter(model, filter)?;

        let mut statements = Vec::with_capacity(groups.len());
        for (table, columns) in groups {
            let scoped = filters
                .iter()
                .find(|(t, _)| *t == table)
                .map(|(_, f)| f.as_slice())
                .unwrap_or_default();
            if scoped.is_empty() {
                return Err(MuxError::request(format!(
                    "update of `{table}` has no filter on that table"
                )));
            }

            let mut params = ParamList::new();
            let mut sets = Vec::with_capacity(columns.len());
            for (column, logical, value) in columns {
                let param = model.binding_type(&logical).bind(&logical, value)?;
                let idx = params.push(param);
                sets.push(format!("{} = ${}", ident::quote(&column.column), idx));
            }
            let filter_sql = render_filter(model, scoped, &mut params)?;

            statements.push(TableStatement {
                sql: format!(
                    "UPDATE {} SET {} WHERE {}",
                    self.table_ref(&table),
                    sets.join(", "),
                    filter_sql
                ),
                table,
                params,
            });
        }
        Ok(statements)
    }
}
