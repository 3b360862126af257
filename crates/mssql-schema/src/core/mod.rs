//! Core abstractions for schema introspection.
//!
//! - [`value`]: SQL scalar values and result sets
//! - [`identifier`]: identifier validation and quoting
//! - [`spec`]: abstract column descriptions
//! - [`schema`]: introspected table, column and routine metadata
//! - [`traits`]: driver, dialect and type-translator seams
//! - [`catalog`]: dialect registry
//!
//! Driver modules (`drivers/mssql`) implement these traits; the schema
//! provider and procedure invoker are written against them only.

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod spec;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use catalog::DialectRegistry;
pub use schema::{
    ColumnSchema, ForeignKeyRef, Junction, ParamDirection, PrimaryKey, Relation, RelationKind,
    RoutineKind, RoutineParam, RoutineSchema, TableNameInfo, TableSchema,
};
pub use spec::{AbstractType, ColumnDefault, ColumnSpec};
pub use traits::{BoundParameter, Driver, SchemaDialect, TypeTranslator};
pub use value::{parse_bool, ResultSet, RowRef, SqlValue};
