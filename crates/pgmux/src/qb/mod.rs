//! Manifest-aware query builder.
//!
//! [`QueryBuilder`] accumulates request-scoped state across calls (active tables and
//! columns, condition fragments, bound terms, sort, limit) and turns it into SQL text plus an
//! ordered parameter list when an assembly call runs:
//!
//! - [`QueryBuilder::select`]: projection over flat logical names, joined on the shared key
//! - [`QueryBuilder::insert`]: one INSERT per table, primary table first
//! - [`QueryBuilder::update`] / [`QueryBuilder::delete`]: one statement per affected table
//! - [`QueryBuilder::create_tables_sql`]: DDL for the whole manifest
//!
//! Assembly calls take the state out of the builder before doing anything else, so the
//! builder is clean again afterwards whether assembly succeeded or not. A builder call that
//! fails (unknown column, value of the wrong class, ...) abandons the request state too.
//!
//! # Example
//!
//! ```ignore
//! use pgmux::qb::{Criteria, Joiner, QueryBuilder, SortDirection};
//!
//! let mut qb = QueryBuilder::new(model.clone());
//! let adults = qb.matching(Joiner::And, [("age", 18)])?;
//! qb.featuring(Joiner::Or, Criteria::new().fragment(&adults).column("bio", "rust"))?;
//! qb.sort("name", SortDirection::Ascending)?;
//! qb.limit(2, 20)?;
//! let built = qb.select(&["name", "bio"])?;
//! ```
//!
//! A builder is request-scoped and must not be shared by concurrent requests; the
//! [`ManifestModel`] behind it can be.

mod condition;
mod ddl;
mod delete;
mod insert;
mod select;
mod update;

pub use condition::{Criteria, Criterion, Joiner, Match};
pub use insert::{Identity, InsertParam, InsertPlan, InsertStatement};

use crate::error::{MuxError, MuxResult};
use crate::ident;
use crate::manifest::{ColumnRef, ManifestModel};
use crate::param::ParamList;
use crate::value::Value;
use std::sync::Arc;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Small to large.
    Ascending,
    /// Large to small.
    Descending,
}

impl SortDirection {
    pub const fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// SQL text and its positional parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParamList,
}

/// A statement scoped to one table of the manifest.
#[derive(Debug, Clone)]
pub struct TableStatement {
    pub table: String,
    pub sql: String,
    pub params: ParamList,
}

/// Request-scoped builder state.
#[derive(Debug, Default)]
pub(crate) struct QueryState {
    /// Tables pulled in by any column reference, in first-reference order.
    active_tables: Vec<String>,
    /// Qualified column expressions, in first-reference order.
    active_columns: Vec<String>,
    /// Projection entries matching `active_columns`, aliased to the logical name when it
    /// differs from the physical one.
    projection: Vec<String>,
    /// Condition fragments not (yet) embedded in a later fragment.
    roots: Vec<String>,
    /// Placeholder token → bound param, in registration order.
    bound_terms: Vec<(String, crate::param::Param)>,
    /// Monotonic per-request condition call counter.
    call_index: u64,
    sort: Vec<String>,
    limit: Option<String>,
}

impl QueryState {
    /// Ensure a logical column and its table's local index are registered.
    ///
    /// Returns the qualified expression of `name`. Recursion stops at the index column
    /// itself, so every referenced table stays re-keyable.
    fn register(&mut self, model: &ManifestModel, name: &str) -> MuxResult<String> {
        let column = resolve(model, name)?;
        let expr = column.qualified();
        if !self.active_columns.contains(&expr) {
            self.active_columns.push(expr.clone());
            self.projection.push(if column.column == name {
                expr.clone()
            } else {
                format!("{} AS {}", expr, ident::quote(name))
            });
        }
        push_unique(&mut self.active_tables, &column.table);

        let index = model.table_index(&column.table)?;
        if index != name {
            self.register(model, index)?;
        }
        Ok(expr)
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Resolve a logical name referenced by a request.
fn resolve<'m>(model: &'m ManifestModel, name: &str) -> MuxResult<&'m ColumnRef> {
    model
        .column(name)
        .map_err(|_| MuxError::request(format!("unknown column `{name}`")))
}

/// Manifest-aware SQL builder with request-scoped state.
#[derive(Debug)]
pub struct QueryBuilder {
    model: Arc<ManifestModel>,
    schema: Option<String>,
    state: QueryState,
}

impl QueryBuilder {
    pub fn new(model: Arc<ManifestModel>) -> Self {
        Self {
            model,
            schema: None,
            state: QueryState::default(),
        }
    }

    /// Qualify every table reference with a Postgres schema.
    pub fn with_schema(mut self, schema: &str) -> MuxResult<Self> {
        ident::validate(schema)?;
        self.schema = Some(schema.to_string());
        Ok(self)
    }

    pub fn model(&self) -> &ManifestModel {
        &self.model
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Register a logical column for the current request.
    ///
    /// Also registers the owning table's index column, so the table stays joinable.
    pub fn register_column(&mut self, name: &str) -> MuxResult<String> {
        let model = Arc::clone(&self.model);
        let result = self.state.register(&model, name);
        self.abandon_on_error(result)
    }

    /// Tables pulled into the current request, in first-reference order.
    pub fn active_tables(&self) -> &[String] {
        &self.state.active_tables
    }

    /// Qualified column expressions of the current request.
    pub fn active_columns(&self) -> &[String] {
        &self.state.active_columns
    }

    /// Add an ORDER BY term. Repeated calls append further terms.
    pub fn sort(&mut self, column: &str, direction: SortDirection) -> MuxResult<()> {
        let expr = self.register_column(column)?;
        self.state
            .sort
            .push(format!("{} {}", expr, direction.as_sql()));
        Ok(())
    }

    /// Page the result: `page` is 1-based, `page_size` rows per page.
    pub fn limit(&mut self, page: u64, page_size: u64) -> MuxResult<()> {
        if page == 0 {
            return Err(MuxError::request("page number must be greater than 0"));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| MuxError::request("page offset overflows"))?;
        self.state.limit = Some(format!("LIMIT {page_size} OFFSET {offset}"));
        Ok(())
    }

    /// Drop all request-scoped state.
    pub fn reset(&mut self) {
        self.state = QueryState::default();
    }

    fn take_state(&mut self) -> QueryState {
        std::mem::take(&mut self.state)
    }

    fn abandon_on_error<T>(&mut self, result: MuxResult<T>) -> MuxResult<T> {
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// `"schema"."table"` or `"table"`.
    fn table_ref(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", ident::quote(schema), ident::quote(table)),
            None => ident::quote(table),
        }
    }
}

/// Column/value pairs grouped by owning table, in manifest order.
type TableGroups = Vec<(String, Vec<(ColumnRef, String, Value)>)>;

fn group_by_table(model: &ManifestModel, entries: Vec<(ColumnRef, String, Value)>) -> TableGroups {
    let mut groups: TableGroups = Vec::new();
    for table in model.table_names() {
        let cols: Vec<_> = entries
            .iter()
            .filter(|(c, _, _)| c.table == table)
            .cloned()
            .collect();
        if !cols.is_empty() {
            groups.push((table.to_string(), cols));
        }
    }
    groups
}

/// Project an equality filter onto tables.
///
/// A column lands on its owning table; the shared key lands on every table that carries it.
fn project_filter(model: &ManifestModel, filter: &[(&str, Value)]) -> MuxResult<TableGroups> {
    let mut entries = Vec::new();
    for (name, value) in filter {
        if *name == model.primary_key() {
            for table in model.table_names() {
                if let Some(key) = model.key_column_in(table) {
                    entries.push((
                        ColumnRef {
                            table: table.to_string(),
                            column: key.to_string(),
                            ty: resolve(model, name)?.ty,
                        },
                        name.to_string(),
                        value.clone(),
                    ));
                }
            }
        } else {
            entries.push((resolve(model, name)?.clone(), name.to_string(), value.clone()));
        }
    }
    Ok(group_by_table(model, entries))
}

/// Render `"t"."c" = $n AND ...` for one table's projected filter.
fn render_filter(
    model: &ManifestModel,
    filter: &[(ColumnRef, String, Value)],
    params: &mut ParamList,
) -> MuxResult<String> {
    let mut parts = Vec::with_capacity(filter.len());
    for (column, logical, value) in filter {
        if value.is_null() {
            parts.push(format!("{} IS NULL", column.qualified()));
            continue;
        }
        let param = model.binding_type(logical).bind(logical, value.clone())?;
        let idx = params.push(param);
        parts.push(format!("{} = ${}", column.qualified(), idx));
    }
    Ok(parts.join(" AND "))
}

#[cfg(test)]
mod tests;
