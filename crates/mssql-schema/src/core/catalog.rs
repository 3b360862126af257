//! Dialect registry for explicit dependency injection.
//!
//! The [`DialectRegistry`] maps dialect names (and their aliases) to
//! [`SchemaDialect`] implementations. It is constructed explicitly and handed
//! to whoever builds providers, rather than living in a global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SchemaError};

use super::traits::SchemaDialect;

/// Registry of schema dialects keyed by lower-cased name.
///
/// ```rust,ignore
/// let registry = DialectRegistry::with_builtins();
/// let dialect = registry.require("sqlsrv")?;
/// assert_eq!(dialect.name(), "mssql");
/// ```
#[derive(Default)]
pub struct DialectRegistry {
    dialects: HashMap<String, Arc<dyn SchemaDialect>>,
}

impl DialectRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with SQL Server registered under all its aliases.
    ///
    /// `mssql` and `sqlserver` name the dialect; `sqlsrv` and `dblib` are the
    /// driver-flavoured names callers commonly configure it by.
    pub fn with_builtins() -> Self {
        use crate::drivers::MssqlDialect;

        let mut registry = Self::new();
        let mssql: Arc<dyn SchemaDialect> = Arc::new(MssqlDialect::new());
        for alias in ["mssql", "sqlserver", "sqlsrv", "dblib"] {
            registry.register_arc(alias, mssql.clone());
        }
        registry
    }

    /// Register a dialect by name.
    pub fn register(&mut self, name: impl Into<String>, dialect: impl SchemaDialect + 'static) {
        self.register_arc(name, Arc::new(dialect));
    }

    /// Register a dialect as an Arc (for sharing between aliases).
    pub fn register_arc(&mut self, name: impl Into<String>, dialect: Arc<dyn SchemaDialect>) {
        self.dialects.insert(name.into().to_lowercase(), dialect);
    }

    /// Get a dialect by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Arc<dyn SchemaDialect>> {
        self.dialects.get(&name.to_lowercase()).cloned()
    }

    /// Get a dialect by name, returning an error if not found.
    pub fn require(&self, name: &str) -> Result<Arc<dyn SchemaDialect>> {
        self.get(name).ok_or_else(|| {
            let mut known = self.names();
            known.sort_unstable();
            SchemaError::Config(format!(
                "Unknown database dialect: '{}'. Supported: {}",
                name,
                known.join(", ")
            ))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialects.contains_key(&name.to_lowercase())
    }

    /// Get all registered names, aliases included.
    pub fn names(&self) -> Vec<&str> {
        self.dialects.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectRegistry")
            .field("dialects", &self.dialects.keys().collect::<Vec<_>>())
            .finish()
    }
}
