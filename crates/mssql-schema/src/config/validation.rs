//! Configuration validation.

use super::{Config, DriverKind};
use crate::core::identifier::validate_identifier;
use crate::error::{Result, SchemaError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;

    if conn.host.is_empty() {
        return Err(SchemaError::Config("connection.host is required".into()));
    }
    if conn.database.is_empty() {
        return Err(SchemaError::Config(
            "connection.database is required".into(),
        ));
    }
    if conn.port == 0 {
        return Err(SchemaError::Config(
            "connection.port must be non-zero".into(),
        ));
    }
    validate_identifier(&conn.schema)
        .map_err(|e| SchemaError::Config(format!("connection.schema is invalid: {}", e)))?;

    if conn.driver == DriverKind::FreeTds && cfg!(windows) {
        return Err(SchemaError::Config(
            "connection.driver 'freetds' is not available on Windows; use 'odbc' or 'tds'".into(),
        ));
    }

    if !conn.freetds.is_empty() && conn.driver.resolve() != DriverKind::FreeTds {
        tracing::warn!(
            "connection.freetds is set but driver resolves to '{}'; FreeTDS paths are ignored",
            conn.driver.resolve()
        );
    }

    if let Some(name) = &conn.odbc_driver {
        if name.trim().is_empty() {
            return Err(SchemaError::Config(
                "connection.odbc_driver must not be empty".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    fn valid_config() -> Config {
        let mut connection = ConnectionConfig::new("localhost", "app");
        connection.user = "sa".to_string();
        connection.password = "password".to_string();
        Config { connection }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = valid_config();
        config.connection.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_schema() {
        let mut config = valid_config();
        config.connection.schema = "bad\0schema".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_from_yaml_defaults() {
        let yaml = r#"
connection:
  host: db.internal
  database: app
  user: svc
  password: hunter2
  driver: tds
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.connection.port, 1433);
        assert_eq!(config.connection.schema, "dbo");
        assert!(config.connection.encrypt);
        assert_eq!(config.connection.driver, DriverKind::Tds);
        assert!(config.connection.freetds.is_empty());
    }

    #[test]
    fn test_password_not_serialized() {
        let yaml = serde_yaml::to_string(&valid_config()).unwrap();
        assert!(!yaml.contains("password"));
    }

    #[test]
    fn test_connection_config_debug_redacts_password() {
        let mut config = valid_config();
        config.connection.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_odbc_connection_string() {
        let mut config = valid_config();
        config.connection.driver = DriverKind::Odbc;
        let conn = config.connection.odbc_connection_string();
        assert!(conn.starts_with("Driver={ODBC Driver 18 for SQL Server};Server=localhost,1433;"));
        assert!(conn.contains("UID=sa;PWD=password;"));
        assert!(conn.contains("Encrypt=yes;"));
        let redacted = config.connection.redacted_odbc_connection_string();
        assert!(redacted.contains("PWD=[REDACTED];"));
        assert!(!redacted.contains("password;"));
    }

    #[test]
    fn test_driver_kind_resolution() {
        assert_eq!(DriverKind::Tds.resolve(), DriverKind::Tds);
        let auto = DriverKind::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(auto, DriverKind::Odbc);
        } else {
            assert_eq!(auto, DriverKind::FreeTds);
        }
        assert_eq!(DriverKind::parse("dblib"), Some(DriverKind::FreeTds));
        assert!(!DriverKind::Tds.uses_odbc());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection:").unwrap();
        writeln!(file, "  host: db.internal").unwrap();
        writeln!(file, "  database: app").unwrap();
        writeln!(file, "  driver: tds").unwrap();
        writeln!(file, "  freetds:").unwrap();
        writeln!(file, "    config_file: /etc/freetds/freetds.conf").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.driver, DriverKind::Tds);
        assert_eq!(
            config.connection.freetds.config_file.as_deref(),
            Some("/etc/freetds/freetds.conf")
        );
    }
}
