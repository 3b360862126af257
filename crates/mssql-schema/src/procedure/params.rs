//! Procedure call parameters and call results.

use serde::{Deserialize, Serialize};

use crate::core::schema::ParamDirection;
use crate::core::traits::BoundParameter;
use crate::core::value::{ResultSet, SqlValue};
use crate::error::{Result, SchemaError};

/// Output buffer used when an OUT/INOUT parameter declares no length.
pub const DEFAULT_OUTPUT_LENGTH: usize = 4000;

/// One argument of a procedure call.
///
/// After a call, OUT and INOUT parameters hold the value the procedure set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureParam {
    /// Parameter name without the leading `@`.
    pub name: String,

    #[serde(default)]
    pub param_type: ParamDirection,

    /// Native type, e.g. `int` or `nvarchar`.
    #[serde(rename = "type")]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    #[serde(default)]
    pub value: SqlValue,
}

impl ProcedureParam {
    pub fn new(name: impl Into<String>, param_type: ParamDirection, r#type: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: name.trim_start_matches('@').to_string(),
            param_type,
            r#type: r#type.into(),
            length: None,
            value: SqlValue::Null,
        }
    }

    pub fn input(name: impl Into<String>, r#type: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(name, ParamDirection::In, r#type).with_value(value)
    }

    pub fn output(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self::new(name, ParamDirection::Out, r#type)
    }

    pub fn in_out(name: impl Into<String>, r#type: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(name, ParamDirection::InOut, r#type).with_value(value)
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.value = value.into();
        self
    }

    pub fn is_output(&self) -> bool {
        self.param_type.is_output()
    }

    /// Parse `name:direction:type[=value]` or `name:type[=value]` (IN).
    ///
    /// `null` is NULL, integers become integers, anything else is text.
    pub fn parse(arg: &str) -> Result<Self> {
        let (spec, value) = match arg.split_once('=') {
            Some((spec, value)) => (spec, Some(value)),
            None => (arg, None),
        };
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        let (name, direction, r#type) = match parts.as_slice() {
            [name, r#type] => (*name, ParamDirection::In, *r#type),
            [name, direction, r#type] => {
                let direction = ParamDirection::parse(direction).ok_or_else(|| {
                    SchemaError::Config(format!(
                        "Invalid parameter direction '{}' in '{}'. Valid values: in, out, inout",
                        direction, arg
                    ))
                })?;
                (*name, direction, *r#type)
            }
            _ => {
                return Err(SchemaError::Config(format!(
                    "Invalid parameter '{}': expected name:direction:type[=value]",
                    arg
                )))
            }
        };
        if name.is_empty() || r#type.is_empty() {
            return Err(SchemaError::Config(format!(
                "Invalid parameter '{}': name and type are required",
                arg
            )));
        }

        let value = match value {
            None => SqlValue::Null,
            Some(v) if v.eq_ignore_ascii_case("null") => SqlValue::Null,
            Some(v) => v
                .parse::<i64>()
                .map(SqlValue::I64)
                .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        };
        Ok(Self::new(name, direction, r#type).with_value(value))
    }

    /// Declared type with a size clause for sized character and binary types.
    pub fn sql_type(&self) -> String {
        let base = self.r#type.trim();
        if base.contains('(') {
            return base.to_string();
        }
        match (base.to_lowercase().as_str(), self.length) {
            ("varchar" | "nvarchar" | "varbinary", None | Some(0)) => format!("{}(max)", base),
            ("char" | "nchar" | "binary" | "varchar" | "nvarchar" | "varbinary", Some(n)) => {
                format!("{}({})", base, n)
            }
            _ => base.to_string(),
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.length
            .map(|l| l as usize)
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_OUTPUT_LENGTH)
    }

    pub(crate) fn to_bound(&self) -> BoundParameter {
        BoundParameter {
            name: self.name.clone(),
            direction: self.param_type,
            sql_type: self.sql_type(),
            buffer_len: self.buffer_len(),
            value: self.value.clone(),
        }
    }
}

/// Validate a parameter name for use as `@name` in generated SQL.
pub fn validate_param_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().count() <= 127
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'));
    if valid {
        Ok(())
    } else {
        Err(SchemaError::Config(format!(
            "Invalid parameter name '{}'",
            name
        )))
    }
}

/// Result sets returned by a call.
///
/// A call producing one result set (or none) yields [`CallResult::Single`];
/// several yield [`CallResult::Multiple`] in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallResult {
    Single(ResultSet),
    Multiple(Vec<ResultSet>),
}

impl CallResult {
    pub fn from_sets(mut sets: Vec<ResultSet>) -> Self {
        match sets.len() {
            0 => CallResult::Single(ResultSet::default()),
            1 => CallResult::Single(sets.remove(0)),
            _ => CallResult::Multiple(sets),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, CallResult::Single(_))
    }

    pub fn sets(&self) -> Vec<&ResultSet> {
        match self {
            CallResult::Single(rs) => vec![rs],
            CallResult::Multiple(sets) => sets.iter().collect(),
        }
    }

    pub fn into_sets(self) -> Vec<ResultSet> {
        match self {
            CallResult::Single(rs) => vec![rs],
            CallResult::Multiple(sets) => sets,
        }
    }
}
