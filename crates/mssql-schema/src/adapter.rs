//! Connection adapter: driver selection, requirement checks and open.
//!
//! ```rust,ignore
//! let config = Config::load("connection.yaml")?;
//! let conn = adapter::open(&config.connection).await?;
//! let users = conn.provider().load_table("dbo.Users").await?;
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConnectionConfig, DriverKind, FreeTdsConfig};
use crate::core::catalog::DialectRegistry;
use crate::core::traits::{Driver, SchemaDialect};
use crate::drivers::mssql::odbc::environment;
use crate::drivers::{EnvPlan, EnvironmentReport, OdbcDriver, TdsDriver};
use crate::error::{Result, SchemaError};
use crate::procedure::ProcedureInvoker;
use crate::schema::SchemaProvider;

/// Concrete driver for a configured kind on this host.
pub fn select_driver(kind: DriverKind) -> DriverKind {
    kind.resolve()
}

/// Installed ODBC driver names.
pub fn installed_odbc_drivers() -> Result<Vec<String>> {
    let env = environment()?;
    let drivers = env.drivers().map_err(|e| {
        SchemaError::MissingDependency(format!("Failed to list ODBC drivers: {}", e))
    })?;
    Ok(drivers.into_iter().map(|d| d.description).collect())
}

/// Whether `wanted` appears in `installed`, ignoring case.
pub fn driver_is_installed(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|d| d.trim().eq_ignore_ascii_case(wanted.trim()))
}

/// Verify the native pieces a driver needs are present.
///
/// `Tds` needs nothing. ODBC kinds need a driver manager and the named ODBC
/// driver (the kind's default when `odbc_driver` is `None`).
pub fn check_requirements(kind: DriverKind, odbc_driver: Option<&str>) -> Result<()> {
    let kind = select_driver(kind);
    if !kind.uses_odbc() {
        debug!("Driver '{}' has no native requirements", kind);
        return Ok(());
    }

    let wanted = odbc_driver
        .or_else(|| kind.default_odbc_driver())
        .ok_or_else(|| SchemaError::Config(format!("no ODBC driver name for '{}'", kind)))?;
    let installed = installed_odbc_drivers()?;
    if driver_is_installed(&installed, wanted) {
        debug!("ODBC driver '{}' is installed", wanted);
        return Ok(());
    }

    Err(SchemaError::MissingDependency(format!(
        "ODBC driver '{}' required by driver '{}' is not installed. Installed drivers: {}",
        wanted,
        kind,
        if installed.is_empty() {
            "(none)".to_string()
        } else {
            installed.join(", ")
        }
    )))
}

/// Options passed explicitly to [`open_with`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// FreeTDS paths, exported only when the FreeTDS driver is used.
    pub freetds: FreeTdsConfig,
    /// Skip [`check_requirements`] before connecting.
    pub skip_requirement_check: bool,
}

impl OpenOptions {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            freetds: config.freetds.clone(),
            skip_requirement_check: false,
        }
    }
}

/// An open connection with its dialect.
pub struct Connection {
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn SchemaDialect>,
    default_schema: String,
    env_report: Option<EnvironmentReport>,
}

impl Connection {
    /// Wrap an already connected driver.
    pub fn from_parts(
        driver: Arc<dyn Driver>,
        dialect: Arc<dyn SchemaDialect>,
        default_schema: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            dialect,
            default_schema: default_schema.into(),
            env_report: None,
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn dialect(&self) -> &Arc<dyn SchemaDialect> {
        &self.dialect
    }

    pub fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    /// FreeTDS environment export outcome, when one was attempted.
    pub fn env_report(&self) -> Option<&EnvironmentReport> {
        self.env_report.as_ref()
    }

    pub fn provider(&self) -> SchemaProvider {
        SchemaProvider::new(self.driver.clone(), self.dialect.clone())
            .with_default_schema(self.default_schema.clone())
    }

    pub fn invoker(&self) -> ProcedureInvoker {
        ProcedureInvoker::new(self.driver.clone(), self.dialect.clone())
    }

    /// Round-trip `SELECT 1`.
    pub async fn health_check(&self) -> Result<()> {
        self.driver.query_scalar("SELECT 1", &[]).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.driver.close().await;
    }
}

/// Open a connection using the options carried by the configuration.
pub async fn open(config: &ConnectionConfig) -> Result<Connection> {
    open_with(config, OpenOptions::from_config(config)).await
}

/// Open a connection with explicit options.
pub async fn open_with(config: &ConnectionConfig, options: OpenOptions) -> Result<Connection> {
    let kind = select_driver(config.driver);
    let dialect = DialectRegistry::with_builtins().require("mssql")?;

    if kind.uses_odbc() && !options.skip_requirement_check {
        check_requirements(kind, config.odbc_driver.as_deref())?;
    }

    let mut env_report = None;
    if kind == DriverKind::FreeTds {
        let plan = EnvPlan::from_config(&options.freetds);
        if !plan.is_empty() {
            env_report = Some(plan.apply());
        }
    }

    let mut resolved = config.clone();
    resolved.driver = kind;
    let driver: Arc<dyn Driver> = match kind {
        DriverKind::Tds => Arc::new(TdsDriver::connect(&resolved).await?),
        _ => Arc::new(OdbcDriver::connect(&resolved).await?),
    };

    info!(
        "Opened {} connection to {}:{}/{} (default schema {})",
        kind, config.host, config.port, config.database, config.schema
    );

    Ok(Connection {
        driver,
        dialect,
        default_schema: config.schema.clone(),
        env_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tds_has_no_requirements() {
        assert!(check_requirements(DriverKind::Tds, None).is_ok());
    }

    #[test]
    fn test_select_driver_resolves_auto() {
        let kind = select_driver(DriverKind::Auto);
        assert_ne!(kind, DriverKind::Auto);
        assert!(kind.uses_odbc());
        assert_eq!(select_driver(DriverKind::Tds), DriverKind::Tds);
    }

    #[test]
    fn test_driver_is_installed_ignores_case() {
        let installed = vec!["ODBC Driver 18 for SQL Server".to_string(), "FreeTDS".to_string()];
        assert!(driver_is_installed(&installed, "freetds"));
        assert!(!driver_is_installed(&installed, "ODBC Driver 17 for SQL Server"));
    }
}
