//! Type translation between abstract column specs and SQL Server types.
//!
//! ```rust,ignore
//! let translator = MssqlTypeTranslator::new();
//! let (native, _) = translator.to_native_type(&ColumnSpec::new("name", "string"));
//! assert_eq!(native, "varchar(255)");
//! ```

mod typemap;

pub use typemap::{mssql_literal, MssqlTypeTranslator, DEFAULT_STRING_LENGTH};
