//! FreeTDS process environment.
//!
//! The FreeTDS client library reads its debug dump and configuration file
//! locations from environment variables. The paths come from
//! [`FreeTdsConfig`] and are exported just before the first connection is
//! opened. A failed export is reported as an [`EnvWarning`], never as an
//! error: the connection works without debug dumping.

use std::fmt;

use tracing::{debug, warn};

use crate::config::FreeTdsConfig;

/// `TDSDUMP`: protocol dump file.
pub const TDSDUMP: &str = "TDSDUMP";

/// `TDSDUMPCONFIG`: configuration dump file.
pub const TDSDUMPCONFIG: &str = "TDSDUMPCONFIG";

/// `FREETDSCONF`: location of `freetds.conf`.
pub const FREETDSCONF: &str = "FREETDSCONF";

/// A variable that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWarning {
    pub variable: &'static str,
    pub reason: String,
}

impl fmt::Display for EnvWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not set {}: {}", self.variable, self.reason)
    }
}

/// Outcome of exporting an [`EnvPlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Variables exported, in plan order.
    pub applied: Vec<&'static str>,
    pub warnings: Vec<EnvWarning>,
}

impl EnvironmentReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Environment variables to export for a FreeTDS connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPlan {
    entries: Vec<(&'static str, String)>,
}

impl EnvPlan {
    pub fn from_config(config: &FreeTdsConfig) -> Self {
        let entries = [
            (TDSDUMP, &config.dump_file),
            (TDSDUMPCONFIG, &config.dump_config_file),
            (FREETDSCONF, &config.config_file),
        ]
        .into_iter()
        .filter_map(|(var, value)| value.as_ref().map(|v| (var, v.clone())))
        .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(&'static str, String)] {
        &self.entries
    }

    /// Export every entry. Invalid values are skipped with a warning.
    pub fn apply(&self) -> EnvironmentReport {
        let mut report = EnvironmentReport::default();

        for (var, value) in &self.entries {
            if let Err(reason) = check_value(value) {
                let warning = EnvWarning {
                    variable: var,
                    reason,
                };
                warn!("FreeTDS environment: {}", warning);
                report.warnings.push(warning);
                continue;
            }
            std::env::set_var(var, value);
            debug!("FreeTDS environment: {}={}", var, value);
            report.applied.push(var);
        }

        report
    }
}

fn check_value(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("value is empty".into());
    }
    if value.contains('\0') {
        return Err("value contains a NUL byte".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_skips_unset_paths() {
        let config = FreeTdsConfig {
            dump_file: Some("/tmp/tds.log".into()),
            dump_config_file: None,
            config_file: Some("/etc/freetds.conf".into()),
        };
        let plan = EnvPlan::from_config(&config);
        assert_eq!(
            plan.entries(),
            &[
                (TDSDUMP, "/tmp/tds.log".to_string()),
                (FREETDSCONF, "/etc/freetds.conf".to_string()),
            ]
        );
        assert!(EnvPlan::from_config(&FreeTdsConfig::default()).is_empty());
    }

    #[test]
    fn test_apply_reports_invalid_values() {
        let config = FreeTdsConfig {
            dump_file: None,
            dump_config_file: Some("/tmp/bad\0path".into()),
            config_file: Some("".into()),
        };
        let report = EnvPlan::from_config(&config).apply();
        assert!(report.applied.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0].variable, TDSDUMPCONFIG);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_apply_exports_dump_file() {
        let config = FreeTdsConfig {
            dump_file: Some("/tmp/mssql-schema-tds.log".into()),
            ..Default::default()
        };
        let report = EnvPlan::from_config(&config).apply();
        assert!(report.is_clean());
        assert_eq!(report.applied, vec![TDSDUMP]);
        assert_eq!(
            std::env::var(TDSDUMP).as_deref(),
            Ok("/tmp/mssql-schema-tds.log")
        );
    }
}
