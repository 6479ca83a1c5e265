//! Declarative schema and its validated lookup indexes.
//!
//! A [`Manifest`] lists tables in order, each with ordered `(column, LogicalType)` pairs.
//! Exactly one column in the whole manifest is [`LogicalType::UniqueIntegerMainKey`]: its
//! table is the *primary table* and the column is the *shared primary key* that stitches one
//! logical entity across every table carrying a column of the same name.
//!
//! [`ManifestModel::load`] validates the manifest once and derives:
//!
//! - the column index: logical column name → [`ColumnRef`]. The shared key inside a
//!   non-primary table is addressed as `<table>_<key>`.
//! - the table index map: table → logical name of its local index column (the shared key for
//!   the primary table, the table's `UNIQUE_INTEGER` column otherwise).
//!
//! # Example
//! ```ignore
//! use pgmux::{LogicalType::*, Manifest, ManifestModel};
//!
//! let model = ManifestModel::load(
//!     Manifest::new()
//!         .table("users", [("user_id", UniqueIntegerMainKey), ("name", String)])
//!         .table("profiles", [("profile_id", UniqueInteger), ("user_id", Integer), ("bio", String)]),
//! )?;
//! assert_eq!(model.primary_table(), "users");
//! assert_eq!(model.column_table("bio")?, "profiles");
//! assert_eq!(model.table_index("profiles")?, "profile_id");
//! # Ok::<(), pgmux::MuxError>(())
//! ```

use crate::error::{MuxError, MuxResult};
use crate::ident;
use crate::param::BindingType;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Binding class used for column names the manifest does not know.
///
/// Permissive on purpose: unknown names bind as text rather than failing. Callers that want
/// strictness should resolve names through [`ManifestModel::column`] first.
pub const UNKNOWN_COLUMN_BINDING: BindingType = BindingType::Text;

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalType {
    String,
    Integer,
    UniqueInteger,
    UniqueIntegerMainKey,
    Boolean,
    Date,
    DateTime,
    Float,
    Blob,
}

impl LogicalType {
    /// Storage column definition used by table creation.
    pub const fn sql_definition(self) -> &'static str {
        match self {
            LogicalType::String => "VARCHAR(255) NOT NULL DEFAULT ''",
            LogicalType::Integer => "BIGINT NOT NULL DEFAULT 0",
            LogicalType::UniqueInteger => "BIGSERIAL NOT NULL",
            LogicalType::UniqueIntegerMainKey => "BIGSERIAL NOT NULL",
            LogicalType::Boolean => "BOOLEAN NOT NULL DEFAULT FALSE",
            LogicalType::Date => "DATE NOT NULL DEFAULT '1979-04-20'",
            LogicalType::DateTime => "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP",
            LogicalType::Float => "DOUBLE PRECISION NOT NULL DEFAULT 0",
            LogicalType::Blob => "BYTEA NOT NULL DEFAULT ''",
        }
    }

    /// Driver parameter class for values of this type.
    pub const fn binding_type(self) -> BindingType {
        match self {
            LogicalType::Integer
            | LogicalType::UniqueInteger
            | LogicalType::UniqueIntegerMainKey
            | LogicalType::Boolean => BindingType::Integer,
            LogicalType::Float => BindingType::Decimal,
            LogicalType::String | LogicalType::Date | LogicalType::DateTime => BindingType::Text,
            LogicalType::Blob => BindingType::Binary,
        }
    }

    /// Whether the column is a generated unique integer (eligible as a table's primary key).
    pub const fn is_unique(self) -> bool {
        matches!(
            self,
            LogicalType::UniqueInteger | LogicalType::UniqueIntegerMainKey
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Integer => "INTEGER",
            LogicalType::UniqueInteger => "UNIQUE_INTEGER",
            LogicalType::UniqueIntegerMainKey => "UNIQUE_INTEGER_MAIN_KEY",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Date => "DATE",
            LogicalType::DateTime => "DATE_TIME",
            LogicalType::Float => "FLOAT",
            LogicalType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table of a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<(String, LogicalType)>,
}

impl TableDef {
    pub fn column_type(&self, column: &str) -> Option<LogicalType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_type(column).is_some()
    }
}

/// Ordered table → (column → logical type) mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    tables: Vec<TableDef>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table with its columns in order.
    pub fn table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, LogicalType)>,
        S: Into<String>,
    {
        self.tables.push(TableDef {
            name: name.into(),
            columns: columns.into_iter().map(|(c, t)| (c.into(), t)).collect(),
        });
        self
    }

    /// Parse a manifest from a JSON object of objects, keeping table and column order.
    ///
    /// ```json
    /// { "users": { "user_id": "UNIQUE_INTEGER_MAIN_KEY", "name": "STRING" } }
    /// ```
    pub fn from_json(text: &str) -> MuxResult<Self> {
        let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
            .map_err(|e| MuxError::schema(format!("failed to parse manifest JSON: {e}")))?;

        let mut manifest = Manifest::new();
        for (table, columns) in root {
            let columns = columns.as_object().ok_or_else(|| {
                MuxError::schema(format!("table `{table}` must map column names to types"))
            })?;
            let mut defs = Vec::with_capacity(columns.len());
            for (column, ty) in columns {
                let ty = LogicalType::deserialize(ty).map_err(|e| {
                    MuxError::schema(format!("type of `{table}`.`{column}`: {e}"))
                })?;
                defs.push((column.clone(), ty));
            }
            manifest = manifest.table(table, defs);
        }
        Ok(manifest)
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn get(&self, table: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == table)
    }
}

/// Resolution of a logical column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Owning table.
    pub table: String,
    /// Physical column name inside `table`.
    pub column: String,
    pub ty: LogicalType,
}

impl ColumnRef {
    /// `"table"."column"`
    pub fn qualified(&self) -> String {
        ident::qualified(&self.table, &self.column)
    }
}

/// Validated manifest with its derived, immutable lookup indexes.
///
/// Safe to share (e.g. behind an `Arc`) between any number of builders.
#[derive(Debug, Clone)]
pub struct ManifestModel {
    manifest: Manifest,
    primary_table: String,
    primary_key: String,
    columns: HashMap<String, ColumnRef>,
    indexes: HashMap<String, String>,
}

impl ManifestModel {
    /// Validate `manifest` and build the column index and table index map.
    pub fn load(manifest: Manifest) -> MuxResult<Self> {
        validate_names(&manifest)?;
        let (primary_table, primary_key) = discover_primary(&manifest)?;

        let mut columns: HashMap<String, ColumnRef> = HashMap::new();
        let mut indexes: HashMap<String, String> = HashMap::new();

        for table in manifest.tables() {
            let mut unique_seen: Option<&str> = None;
            for (column, ty) in &table.columns {
                if ty.is_unique() {
                    if let Some(prev) = unique_seen {
                        return Err(MuxError::schema(format!(
                            "table `{}` declares more than one unique integer column (`{}`, `{}`)",
                            table.name, prev, column
                        )));
                    }
                    unique_seen = Some(column.as_str());
                }

                let logical = if *column == primary_key && table.name != primary_table {
                    format!("{}_{}", table.name, column)
                } else {
                    column.clone()
                };

                if let Some(existing) = columns.get(&logical) {
                    return Err(MuxError::schema(format!(
                        "Conflicting column names found `{}` (tables `{}` and `{}`)",
                        logical, existing.table, table.name
                    )));
                }

                if ty.is_unique() {
                    indexes.insert(table.name.clone(), logical.clone());
                }
                columns.insert(
                    logical,
                    ColumnRef {
                        table: table.name.clone(),
                        column: column.clone(),
                        ty: *ty,
                    },
                );
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "pgmux.manifest",
            primary_table = %primary_table,
            primary_key = %primary_key,
            tables = manifest.tables().len(),
            columns = columns.len(),
            "manifest loaded"
        );

        Ok(Self {
            manifest,
            primary_table,
            primary_key,
            columns,
            indexes,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Table holding the shared primary key.
    pub fn primary_table(&self) -> &str {
        &self.primary_table
    }

    /// Name of the shared primary key column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Resolve a logical column name.
    pub fn column(&self, name: &str) -> MuxResult<&ColumnRef> {
        self.columns.get(name).ok_or_else(|| {
            MuxError::schema(format!("column `{name}` was not found in manifest"))
        })
    }

    /// Owning table of a logical column name.
    pub fn column_table(&self, name: &str) -> MuxResult<&str> {
        self.column(name).map(|c| c.table.as_str())
    }

    /// Logical name of a table's local index column.
    pub fn table_index(&self, table: &str) -> MuxResult<&str> {
        self.indexes
            .get(table)
            .map(String::as_str)
            .ok_or_else(|| MuxError::schema(format!("`{table}` index was not found")))
    }

    /// Physical name of the shared key column inside `table`, if the table carries it.
    pub fn key_column_in(&self, table: &str) -> Option<&str> {
        self.manifest
            .get(table)
            .filter(|t| t.has_column(&self.primary_key))
            .map(|_| self.primary_key.as_str())
    }

    /// Binding class for a column name.
    ///
    /// Logical names resolve through the column index; otherwise tables are scanned in
    /// manifest order for the first one with a physical column of that name. Unknown names
    /// fall back to [`UNKNOWN_COLUMN_BINDING`].
    pub fn binding_type(&self, name: &str) -> BindingType {
        if let Some(c) = self.columns.get(name) {
            return c.ty.binding_type();
        }
        if let Some(ty) = self.manifest.tables().iter().find_map(|t| t.column_type(name)) {
            return ty.binding_type();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "pgmux.manifest",
            column = name,
            "unknown column binds as text"
        );
        UNKNOWN_COLUMN_BINDING
    }

    /// Table names in manifest order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.manifest.tables().iter().map(|t| t.name.as_str())
    }
}

fn validate_names(manifest: &Manifest) -> MuxResult<()> {
    let mut tables = HashSet::new();
    for table in manifest.tables() {
        ident::validate(&table.name)?;
        if !tables.insert(table.name.as_str()) {
            return Err(MuxError::schema(format!(
                "table `{}` is declared twice",
                table.name
            )));
        }
        let mut seen = HashSet::new();
        for (column, _) in &table.columns {
            ident::validate(column)?;
            if !seen.insert(column.as_str()) {
                return Err(MuxError::schema(format!(
                    "column `{}` is declared twice in table `{}`",
                    column, table.name
                )));
            }
        }
    }
    Ok(())
}

fn discover_primary(manifest: &Manifest) -> MuxResult<(String, String)> {
    let mut found: Option<(String, String)> = None;
    for table in manifest.tables() {
        for (column, ty) in &table.columns {
            if *ty != LogicalType::UniqueIntegerMainKey {
                continue;
            }
            if let Some((t, c)) = &found {
                return Err(MuxError::schema(format!(
                    "Manifest specifies more than one primary key (`{}`.`{}`, `{}`.`{}`)",
                    t, c, table.name, column
                )));
            }
            found = Some((table.name.clone(), column.clone()));
        }
    }
    found.ok_or_else(|| MuxError::schema("Manifest does not specify primary key"))
}
