use super::{QueryBuilder, group_by_table, resolve};
use crate::error::{MuxError, MuxResult};
use crate::ident;
use crate::param::{Param, ParamList};
use crate::value::Value;
use std::collections::HashSet;

/// Identity a table's row is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Produced by the primary-table insert.
    Generated,
    /// Supplied by the caller.
    Supplied(i64),
}

/// One parameter slot of an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertParam {
    Bound(Param),
    /// Filled with the key returned by the primary-table insert.
    GeneratedKey,
}

/// One INSERT of a multi-table write.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: String,
    pub sql: String,
    pub params: Vec<InsertParam>,
    /// The statement ends in `RETURNING <key>`.
    pub returns_key: bool,
    pub identity: Identity,
}

impl InsertStatement {
    pub fn needs_generated_key(&self) -> bool {
        self.params.contains(&InsertParam::GeneratedKey)
    }

    /// Resolve the param slots, substituting `generated` for the generated-key slot.
    pub fn bind(&self, generated: Option<i64>) -> MuxResult<ParamList> {
        self.params
            .iter()
            .map(|slot| match slot {
                InsertParam::Bound(p) => Ok(p.clone()),
                InsertParam::GeneratedKey => generated.map(Param::Integer).ok_or_else(|| {
                    MuxError::request(format!(
                        "insert into `{}` needs the generated key, which is not available",
                        self.table
                    ))
                }),
            })
            .collect()
    }
}

/// Ordered inserts for one logical write: the primary table first, then manifest order.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub statements: Vec<InsertStatement>,
}

impl InsertPlan {
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().map(|s| s.table.as_str())
    }
}

impl QueryBuilder {
    /// Plan the inserts for one logical entity spread across tables.
    ///
    /// The shared key may be supplied to write secondary rows for an existing entity; it
    /// cannot be combined with primary-table columns. Secondary tables that do not get the
    /// key from the caller receive the key generated by the primary insert.
    pub fn insert(&mut self, values: &[(&str, Value)]) -> MuxResult<InsertPlan> {
        self.reset();
        let model = &self.model;
        let key = model.primary_key();

        let mut seen = HashSet::new();
        let mut supplied_key: Option<i64> = None;
        let mut entries = Vec::with_capacity(values.len());
        for (name, value) in values {
            if !seen.insert(*name) {
                return Err(MuxError::request(format!("column `{name}` is given twice")));
            }
            if *name == key {
                let id = value.as_i64().ok_or_else(|| {
                    MuxError::request(format!("shared key `{key}` must be an integer, got '{value}'"))
                })?;
                supplied_key = Some(id);
                continue;
            }
            entries.push((resolve(model, name)?.clone(), name.to_string(), value.clone()));
        }

        let mut groups = group_by_table(model, entries);
        if groups.is_empty() {
            return Err(MuxError::request("insert has no columns to write"));
        }
        groups.sort_by_key(|(table, _)| table != model.primary_table());

        let writes_primary = groups[0].0 == model.primary_table();
        if writes_primary && supplied_key.is_some() {
            return Err(MuxError::request(format!(
                "`{key}` cannot be supplied together with columns of `{}`",
                model.primary_table()
            )));
        }

        let mut statements = Vec::with_capacity(groups.len());
        for (table, columns) in groups {
            let is_primary = table == model.primary_table();
            let mut names = Vec::with_capacity(columns.len() + 1);
            let mut params = Vec::with_capacity(columns.len() + 1);
            let mut identity = Identity::Generated;

            let carries_key = columns.iter().any(|(c, _, _)| c.column == key);
            if !is_primary && !carries_key {
                let physical = model.key_column_in(&table).ok_or_else(|| {
                    MuxError::schema(format!("table `{table}` does not carry the key `{key}`"))
                })?;
                names.push(ident::quote(physical));
                match supplied_key {
                    Some(id) => {
                        params.push(InsertParam::Bound(Param::Integer(id)));
                        identity = Identity::Supplied(id);
                    }
                    None if writes_primary => params.push(InsertParam::GeneratedKey),
                    None => {
                        return Err(MuxError::request(format!(
                            "insert into `{table}` needs `{key}` or columns of `{}`",
                            model.primary_table()
                        )));
                    }
                }
            }

            for (column, logical, value) in columns {
                if !is_primary && column.column == key {
                    identity = value.as_i64().map(Identity::Supplied).ok_or_else(|| {
                        MuxError::request(format!("`{logical}` must be an integer, got '{value}'"))
                    })?;
                }
                names.push(ident::quote(&column.column));
                let param = model.binding_type(&logical).bind(&logical, value)?;
                params.push(InsertParam::Bound(param));
            }

            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("${i}")).collect();
            let mut sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table_ref(&table),
                names.join(", "),
                placeholders.join(", ")
            );
            if is_primary {
                sql.push_str(&format!(" RETURNING {}", ident::quote(key)));
            }

            statements.push(InsertStatement {
                table,
                sql,
                params,
                returns_key: is_primary,
                identity,
            });
        }

        Ok(InsertPlan { statements })
    }
}
