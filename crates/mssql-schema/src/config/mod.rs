//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Escape an ODBC connection-string attribute value.
fn odbc_value(value: &str) -> String {
    if value.contains([';', '{', '}']) {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

impl ConnectionConfig {
    /// Build an ODBC connection string for the resolved driver kind.
    pub fn odbc_connection_string(&self) -> String {
        let driver = self.odbc_driver_name().unwrap_or_default();
        let mut conn = format!(
            "Driver={{{}}};Server={},{};Database={};",
            driver,
            self.host,
            self.port,
            odbc_value(&self.database)
        );
        if self.user.is_empty() {
            conn.push_str("Trusted_Connection=yes;");
        } else {
            conn.push_str(&format!(
                "UID={};PWD={};",
                odbc_value(&self.user),
                odbc_value(&self.password)
            ));
        }
        if self.driver.resolve() == DriverKind::FreeTds {
            conn.push_str("TDS_Version=7.4;ClientCharset=UTF-8;");
        } else {
            conn.push_str(&format!(
                "Encrypt={};TrustServerCertificate={};",
                yes_no(self.encrypt),
                yes_no(self.trust_server_cert)
            ));
        }
        conn
    }

    /// Connection string with the password masked, for logging.
    pub fn redacted_odbc_connection_string(&self) -> String {
        let conn = self.odbc_connection_string();
        if self.password.is_empty() {
            return conn;
        }
        conn.replace(
            &format!("PWD={};", odbc_value(&self.password)),
            "PWD=[REDACTED];",
        )
    }
}
