//! # mssql-schema
//!
//! SQL Server schema introspection and statement generation.
//!
//! - **Type translation** between abstract column specs (`pk`, `string`,
//!   `boolean`, ...) and native SQL Server types
//! - **Catalog introspection**: tables, columns, keys, relations, routines
//! - **DDL generation** from abstract column specs
//! - **Stored procedure calls** with OUT/INOUT parameters, with or without
//!   driver support for output binding
//! - **Drivers**: pure Rust TDS (tiberius) and ODBC (Microsoft driver or
//!   FreeTDS)
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_schema::{adapter, Config};
//!
//! #[tokio::main]
//! async fn main() -> mssql_schema::Result<()> {
//!     let config = Config::load("connection.yaml")?;
//!     let conn = adapter::open(&config.connection).await?;
//!     let table = conn.provider().load_table("dbo.Users").await?;
//!     println!("{} has {} columns", table.display_name, table.columns.len());
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod procedure;
pub mod schema;

// Re-exports for convenient access
pub use adapter::{check_requirements, open, Connection, OpenOptions};
pub use config::{Config, ConnectionConfig, DriverKind, FreeTdsConfig};
pub use crate::core::{
    AbstractType, BoundParameter, ColumnDefault, ColumnSchema, ColumnSpec, DialectRegistry, Driver,
    ParamDirection, PrimaryKey, Relation, RelationKind, ResultSet, RoutineKind, RoutineSchema,
    SchemaDialect, SqlValue, TableNameInfo, TableSchema, TypeTranslator,
};
pub use dialect::MssqlTypeTranslator;
pub use drivers::{EnvironmentReport, MssqlDialect, OdbcDriver, TdsDriver};
pub use error::{ObjectKind, Result, SchemaError};
pub use procedure::{CallResult, FunctionReturn, ProcedureInvoker, ProcedureParam};
pub use schema::{compare_table_names, IntegrityCache, SchemaProvider};
