//! SQL Server type translation.
//!
//! Forward: abstract [`ColumnSpec`] to native type, size clause and column
//! definition. Reverse: catalog type name and raw default to abstract type
//! and typed default.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::core::spec::{AbstractType, ColumnDefault, ColumnSpec};
use crate::core::traits::TypeTranslator;
use crate::core::value::SqlValue;
use crate::error::{Result, SchemaError};

/// Width applied to variable-length string and binary types with no length.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Largest explicit width for single-byte variable types; beyond it `(max)`.
const MAX_VARCHAR_LENGTH: u32 = 8000;

/// Largest explicit width for `nvarchar`.
const MAX_NVARCHAR_LENGTH: u32 = 4000;

/// Largest fractional-seconds precision for temporal types.
const MAX_TIME_PRECISION: u32 = 7;

/// Render a value as a SQL Server literal.
pub fn mssql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => u8::from(*b).to_string(),
        SqlValue::I64(v) => v.to_string(),
        SqlValue::F64(v) => v.to_string(),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::Text(s) => format!("N'{}'", s.replace('\'', "''")),
        SqlValue::Bytes(_) => value.to_string(),
        other => format!("'{}'", other),
    }
}

/// Split `nvarchar(50)` into `("nvarchar", Some("50"))`.
fn split_type(db_type: &str) -> (String, Option<String>) {
    let lower = db_type.trim().to_lowercase();
    match lower.find('(') {
        Some(open) => {
            let base = lower[..open].trim().to_string();
            let args = lower[open + 1..].trim_end_matches(')').trim().to_string();
            (base, Some(args))
        }
        None => (lower, None),
    }
}

/// Remove redundant outer parentheses: `((1))` becomes `1`.
fn strip_outer_parens(raw: &str) -> &str {
    let mut s = raw.trim();
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// Unwrap `N'..'` / `'..'` string literals.
fn unquote_literal(s: &str) -> String {
    let s = s.strip_prefix('N').filter(|r| r.starts_with('\'')).unwrap_or(s);
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].replace("''", "'")
    } else {
        s.trim_matches('\'').to_string()
    }
}

/// SQL Server [`TypeTranslator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlTypeTranslator;

impl MssqlTypeTranslator {
    pub fn new() -> Self {
        Self
    }

    fn string_type(spec: &ColumnSpec) -> &'static str {
        match (spec.fixed_length, spec.supports_multibyte) {
            (true, true) => "nchar",
            (true, false) => "char",
            (false, true) => "nvarchar",
            (false, false) => "varchar",
        }
    }
}

impl TypeTranslator for MssqlTypeTranslator {
    fn translate_simple_type(&self, spec: &ColumnSpec) -> ColumnSpec {
        let mut out = spec.clone();
        let Some(abstract_type) = spec.abstract_type() else {
            return out;
        };

        let native = match abstract_type {
            AbstractType::Pk | AbstractType::Id => {
                out.allow_null = false;
                out.auto_increment = true;
                out.is_primary_key = true;
                "int"
            }
            AbstractType::Reference => {
                out.is_foreign_key = true;
                "int"
            }
            AbstractType::UserId | AbstractType::UserIdOnCreate | AbstractType::UserIdOnUpdate => {
                "int"
            }
            AbstractType::Datetime => "datetime2",
            AbstractType::Timestamp => "datetimeoffset",
            AbstractType::TimestampOnCreate | AbstractType::TimestampOnUpdate => {
                if out.default.is_none() {
                    out.default = Some(ColumnDefault::expression("SYSDATETIMEOFFSET()"));
                }
                "datetimeoffset"
            }
            AbstractType::Boolean => {
                if let Some(ColumnDefault::Value(v)) = &out.default {
                    if !v.is_null() {
                        let flag = v.as_bool().unwrap_or(false);
                        out.default = Some(ColumnDefault::Value(SqlValue::I64(i64::from(flag))));
                    }
                }
                "bit"
            }
            AbstractType::Integer => "int",
            AbstractType::Bigint => "bigint",
            AbstractType::Float => "real",
            AbstractType::Double => "float",
            AbstractType::Decimal => "decimal",
            AbstractType::Money => "money",
            AbstractType::Date => "date",
            AbstractType::Time => "time",
            AbstractType::Text => {
                out.type_extras = Some("(max)".to_string());
                "varchar"
            }
            AbstractType::Ntext => {
                out.type_extras = Some("(max)".to_string());
                "nvarchar"
            }
            AbstractType::Image => {
                out.type_extras = Some("(max)".to_string());
                "varbinary"
            }
            AbstractType::String => Self::string_type(spec),
            AbstractType::Binary => {
                if spec.fixed_length {
                    "binary"
                } else {
                    "varbinary"
                }
            }
        };

        out.r#type = native.to_string();
        out
    }

    fn validate_column_settings(&self, spec: &ColumnSpec) -> ColumnSpec {
        let mut out = spec.clone();
        if out.type_extras.is_some() {
            return out;
        }

        let base = out.r#type.trim().to_lowercase();
        let extras = match base.as_str() {
            "decimal" | "numeric" => {
                out.precision
                    .or(out.effective_length())
                    .map(|p| match out.effective_scale() {
                        Some(s) => format!("({},{})", p, s),
                        None => format!("({})", p),
                    })
            }
            "float" => out
                .precision
                .or(out.effective_length())
                .map(|n| format!("({})", n)),
            "char" | "nchar" | "binary" => out.effective_length().map(|n| format!("({})", n)),
            "varchar" | "varbinary" | "nvarchar" => {
                let limit = if base == "nvarchar" {
                    MAX_NVARCHAR_LENGTH
                } else {
                    MAX_VARCHAR_LENGTH
                };
                Some(match out.effective_length() {
                    Some(0) => "(max)".to_string(),
                    Some(n) if n > limit => "(max)".to_string(),
                    Some(n) => format!("({})", n),
                    None => format!("({})", DEFAULT_STRING_LENGTH),
                })
            }
            "time" | "datetime2" | "datetimeoffset" => out
                .precision
                .or(out.effective_scale())
                .filter(|n| *n <= MAX_TIME_PRECISION)
                .map(|n| format!("({})", n)),
            _ => None,
        };

        out.type_extras = extras;
        out
    }

    fn build_column_definition(&self, spec: &ColumnSpec) -> Result<String> {
        let (native, info) = self.to_native_type(spec);
        // `pk` only becomes a primary key during translation
        if info.is_unique && info.is_primary_key {
            return Err(SchemaError::Config(format!(
                "column '{}' cannot be both unique and primary key",
                spec.name
            )));
        }

        let mut definition = native;

        definition.push_str(if info.allow_null { " NULL" } else { " NOT NULL" });

        if let Some(default) = &info.default {
            definition.push_str(" DEFAULT ");
            match default {
                ColumnDefault::Expression { expression } => definition.push_str(expression),
                ColumnDefault::Value(v) => definition.push_str(&mssql_literal(v)),
            }
        }

        if info.auto_increment {
            definition.push_str(" IDENTITY");
        }

        if info.is_primary_key {
            definition.push_str(" PRIMARY KEY");
        } else if info.is_unique {
            definition.push_str(" UNIQUE");
        }

        Ok(definition)
    }

    fn to_abstract_type(&self, db_type: &str, size: Option<i64>) -> AbstractType {
        let (base, args) = split_type(db_type);
        let unbounded = match (&args, size) {
            (Some(a), _) if a == "max" => true,
            (Some(_), _) => false,
            (None, Some(n)) => n <= 0,
            (None, None) => true,
        };

        match base.as_str() {
            "bit" => AbstractType::Boolean,
            "tinyint" | "smallint" | "int" => AbstractType::Integer,
            "bigint" => AbstractType::Bigint,
            "decimal" | "numeric" => AbstractType::Decimal,
            "money" | "smallmoney" => AbstractType::Money,
            "real" => AbstractType::Float,
            "float" => AbstractType::Double,
            "char" | "nchar" => AbstractType::String,
            "varchar" | "nvarchar" if unbounded => AbstractType::Text,
            "varchar" | "nvarchar" => AbstractType::String,
            "text" | "ntext" | "xml" => AbstractType::Text,
            "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => AbstractType::Binary,
            "date" => AbstractType::Date,
            "time" => AbstractType::Time,
            "datetime" | "datetime2" | "smalldatetime" => AbstractType::Datetime,
            "datetimeoffset" => AbstractType::Timestamp,
            _ => AbstractType::String,
        }
    }

    fn extract_default(&self, r#type: AbstractType, raw: Option<&str>) -> Option<SqlValue> {
        let inner = strip_outer_parens(raw?);
        if inner.is_empty() || inner.eq_ignore_ascii_case("null") {
            return None;
        }

        match r#type {
            AbstractType::Boolean => match inner {
                "1" => Some(SqlValue::Bool(true)),
                "0" => Some(SqlValue::Bool(false)),
                _ => None,
            },
            AbstractType::Timestamp
            | AbstractType::TimestampOnCreate
            | AbstractType::TimestampOnUpdate => None,
            t => {
                let text = unquote_literal(inner);
                let typed = match t {
                    AbstractType::Integer
                    | AbstractType::Bigint
                    | AbstractType::Id
                    | AbstractType::Reference => text.parse::<i64>().ok().map(SqlValue::I64),
                    AbstractType::Float | AbstractType::Double => {
                        text.parse::<f64>().ok().map(SqlValue::F64)
                    }
                    AbstractType::Decimal | AbstractType::Money => {
                        Decimal::from_str(&text).ok().map(SqlValue::Decimal)
                    }
                    _ => None,
                };
                Some(typed.unwrap_or(SqlValue::Text(text)))
            }
        }
    }

    fn extract_fixed_length(&self, db_type: &str) -> bool {
        matches!(split_type(db_type).0.as_str(), "char" | "nchar" | "binary")
    }

    fn extract_multibyte(&self, db_type: &str) -> bool {
        matches!(split_type(db_type).0.as_str(), "nchar" | "nvarchar" | "ntext")
    }
}
