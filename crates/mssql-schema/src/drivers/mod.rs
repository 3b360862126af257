//! Database driver implementations.
//!
//! - [`mssql`]: SQL Server dialect plus the TDS and ODBC drivers
//! - [`common`]: FreeTDS environment handling
//!
//! Each driver implements [`Driver`](crate::core::Driver) over one
//! connection. The dialect is shared by all drivers, so picking a driver
//! never changes the SQL that is generated.

pub mod common;
pub mod mssql;

pub use common::{EnvPlan, EnvWarning, EnvironmentReport};
pub use mssql::{MssqlDialect, OdbcDriver, TdsDriver};
