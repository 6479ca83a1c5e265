//! # pgmux
//!
//! Manifest-driven data access for PostgreSQL: one logical entity, many tables.
//!
//! A [`Manifest`] declares tables and their columns. Exactly one column is the shared
//! primary key; every table carrying a column of that name holds a slice of the same entity.
//! Callers address columns by flat logical names and never name tables:
//!
//! - reads join every table a request touches on the shared key
//! - writes split a flat value map into one statement per table, propagating the key the
//!   primary-table insert generated
//! - conditions are composable fragments whose values are always bound, never inlined
//!
//! ```ignore
//! use pgmux::{LogicalType::*, Manifest, ManifestModel, Storage};
//! use std::sync::Arc;
//!
//! let model = Arc::new(ManifestModel::load(
//!     Manifest::new()
//!         .table("users", [("user_id", UniqueIntegerMainKey), ("name", String)])
//!         .table("profiles", [("profile_id", UniqueInteger), ("user_id", Integer), ("bio", String)]),
//! )?);
//!
//! let client = pgmux::connect(&pgmux::DatabaseConfig::from_file("config.ini")?).await?;
//! let mut storage = Storage::new(client, model);
//! storage.create_tables_from_manifest("public").await?;
//! let ids = storage.create(&[("name", "ann".into()), ("bio", "hi".into())]).await?;
//! let rows = storage.read(&["name", "bio"], &[("user_id", ids["users"].into())]).await?;
//! ```
//!
//! ## Modules
//!
//! - [`manifest`]: schema declaration and validated lookup indexes
//! - [`qb`]: request-scoped SQL synthesis
//! - [`storage`]: facade that executes synthesized statements on a [`GenericClient`]
//! - [`config`] / [`connect()`]: connection settings and a single-connection helper

pub mod client;
pub mod config;
pub mod connect;
pub mod error;
pub mod ident;
pub mod manifest;
pub mod param;
pub mod qb;
pub mod row;
pub mod storage;
pub mod value;

pub use client::GenericClient;
pub use config::{ConfigFormat, DatabaseConfig};
pub use connect::connect;
pub use error::{MuxError, MuxResult};
pub use manifest::{ColumnRef, LogicalType, Manifest, ManifestModel, TableDef, UNKNOWN_COLUMN_BINDING};
pub use param::{BindingType, Param, ParamList};
pub use qb::{BuiltQuery, Criteria, Criterion, Joiner, Match, QueryBuilder, SortDirection};
pub use row::{FromRow, Record};
pub use storage::Storage;
pub use value::Value;

// Re-export tokio_postgres for convenience
pub use tokio_postgres;
