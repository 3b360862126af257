//! Microsoft SQL Server dialect and drivers.
//!
//! - [`MssqlDialect`]: quoting, catalog SQL and DDL templates
//! - [`TdsDriver`]: pure Rust TDS connection (tiberius)
//! - [`OdbcDriver`]: ODBC connection, Microsoft driver or FreeTDS

mod dialect;
pub mod odbc;
mod tds;

pub use dialect::MssqlDialect;
pub use odbc::OdbcDriver;
pub use tds::TdsDriver;
