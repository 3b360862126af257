//! Schema introspection.
//!
//! [`SchemaProvider`] loads tables, keys, relations, routine metadata and
//! catalog listings through a [`Driver`](crate::core::Driver) and a
//! [`SchemaDialect`](crate::core::SchemaDialect), and executes the dialect's
//! DDL templates.

mod columns;
mod integrity;
mod provider;
mod relations;

pub use columns::{column_from_row, display_name, resolve_name, ResolvedName};
pub use integrity::IntegrityCache;
pub use provider::SchemaProvider;
pub use relations::{apply_foreign_keys, apply_primary_key, ForeignKeyRow};

pub use crate::core::identifier::compare_table_names;
