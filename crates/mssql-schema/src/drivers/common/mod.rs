//! Helpers shared by the SQL Server drivers.

pub mod env;

pub use env::{EnvPlan, EnvWarning, EnvironmentReport};
