//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQL Server connection settings.
    pub connection: ConnectionConfig,
}

/// Low-level driver used to reach SQL Server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Platform default: `Odbc` on Windows, `FreeTds` elsewhere.
    #[default]
    Auto,
    /// Microsoft ODBC driver with native output-parameter binding.
    Odbc,
    /// FreeTDS through ODBC, no output-parameter binding.
    FreeTds,
    /// Pure Rust TDS client.
    Tds,
}

impl DriverKind {
    /// Resolve `Auto` to the platform default.
    pub fn resolve(self) -> DriverKind {
        match self {
            DriverKind::Auto if cfg!(windows) => DriverKind::Odbc,
            DriverKind::Auto => DriverKind::FreeTds,
            other => other,
        }
    }

    /// Whether this driver goes through the ODBC driver manager.
    pub fn uses_odbc(self) -> bool {
        matches!(self.resolve(), DriverKind::Odbc | DriverKind::FreeTds)
    }

    /// ODBC driver name registered for this kind when none is configured.
    pub fn default_odbc_driver(self) -> Option<&'static str> {
        match self.resolve() {
            DriverKind::Odbc => Some("ODBC Driver 18 for SQL Server"),
            DriverKind::FreeTds => Some("FreeTDS"),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(DriverKind::Auto),
            "odbc" | "sqlsrv" => Some(DriverKind::Odbc),
            "freetds" | "dblib" => Some(DriverKind::FreeTds),
            "tds" | "tiberius" => Some(DriverKind::Tds),
            _ => None,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverKind::Auto => "auto",
            DriverKind::Odbc => "odbc",
            DriverKind::FreeTds => "freetds",
            DriverKind::Tds => "tds",
        })
    }
}

/// FreeTDS debug and configuration file locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTdsConfig {
    /// Protocol dump file (`TDSDUMP`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_file: Option<String>,

    /// Configuration dump file (`TDSDUMPCONFIG`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_config_file: Option<String>,

    /// `freetds.conf` location (`FREETDSCONF`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

impl FreeTdsConfig {
    pub fn is_empty(&self) -> bool {
        self.dump_file.is_none() && self.dump_config_file.is_none() && self.config_file.is_none()
    }
}

/// SQL Server connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password. Never written back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Default schema (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub schema: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Driver selection (default: auto).
    #[serde(default)]
    pub driver: DriverKind,

    /// ODBC driver name override for the ODBC-based kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odbc_driver: Option<String>,

    /// FreeTDS file locations (POSIX FreeTDS driver only).
    #[serde(default, skip_serializing_if = "FreeTdsConfig::is_empty")]
    pub freetds: FreeTdsConfig,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("driver", &self.driver)
            .field("odbc_driver", &self.odbc_driver)
            .field("freetds", &self.freetds)
            .finish()
    }
}

impl ConnectionConfig {
    /// Minimal configuration with defaults for everything but the target.
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mssql_port(),
            database: database.into(),
            user: String::new(),
            password: String::new(),
            schema: default_dbo_schema(),
            encrypt: true,
            trust_server_cert: false,
            driver: DriverKind::Auto,
            odbc_driver: None,
            freetds: FreeTdsConfig::default(),
        }
    }

    /// ODBC driver name for the resolved driver kind.
    pub fn odbc_driver_name(&self) -> Option<String> {
        self.odbc_driver
            .clone()
            .or_else(|| self.driver.default_odbc_driver().map(str::to_string))
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_true() -> bool {
    true
}
