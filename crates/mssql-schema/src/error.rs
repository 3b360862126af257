//! Error types for the schema layer.

use std::fmt;

use thiserror::Error;

/// Kind of catalog object a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Procedure,
    Function,
    Schema,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Table => "table",
            ObjectKind::Procedure => "procedure",
            ObjectKind::Function => "function",
            ObjectKind::Schema => "schema",
        };
        f.write_str(s)
    }
}

/// Main error type for schema introspection and statement generation.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Contradictory column spec, invalid identifier or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required native driver or ODBC driver is not installed.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// The requested catalog object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ObjectKind, name: String },

    /// Statement execution failed.
    #[error("Query failed: {message}\n  SQL: {sql}")]
    Query { message: String, sql: String },

    /// Error reported by the TDS driver.
    #[error("TDS driver error: {0}")]
    Tds(#[from] tiberius::error::Error),

    /// Error reported by the ODBC driver manager or driver.
    #[error("ODBC driver error: {0}")]
    Odbc(#[from] odbc_api::Error),

    /// Connection could not be established.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// IO error (config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Create a NotFound error.
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        SchemaError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create a Query error carrying the statement text.
    pub fn query(message: impl fmt::Display, sql: impl Into<String>) -> Self {
        SchemaError::Query {
            message: message.to_string(),
            sql: sql.into(),
        }
    }

    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl fmt::Display, context: impl Into<String>) -> Self {
        SchemaError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// True for the recoverable "object absent" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound { .. })
    }

    /// True when the failure came from executing a statement.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            SchemaError::Query { .. } | SchemaError::Tds(_) | SchemaError::Odbc(_)
        )
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SchemaError::Config(_) | SchemaError::Yaml(_) => 2,
            SchemaError::MissingDependency(_) => 3,
            SchemaError::NotFound { .. } => 4,
            SchemaError::Connection { .. } => 5,
            SchemaError::Query { .. } | SchemaError::Tds(_) | SchemaError::Odbc(_) => 6,
            SchemaError::Io(_) | SchemaError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
