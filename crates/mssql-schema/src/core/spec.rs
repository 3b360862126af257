//! Abstract, vendor-neutral column descriptions.
//!
//! A [`ColumnSpec`] is what callers hand to the type translator and DDL
//! builders. It is a plain value: translation never mutates a spec in place,
//! it returns a new one (see [`TypeTranslator`](crate::core::TypeTranslator)).
//!
//! Keys the translator does not recognize are kept in [`ColumnSpec::extra`]
//! and passed through untouched.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// Portable logical column type.
///
/// The forward vocabulary (`pk`, `fk`, `timestamp_on_create`, ...) and the
/// reverse vocabulary produced from catalog types (`integer`, `string`,
/// `text`, ...) share this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractType {
    /// Auto-incrementing integer primary key (input vocabulary).
    Pk,
    /// Identity-marker type: integer auto-increment primary key.
    Id,
    /// Integer foreign key.
    Reference,
    UserId,
    UserIdOnCreate,
    UserIdOnUpdate,
    Boolean,
    Integer,
    Bigint,
    Float,
    Double,
    Decimal,
    Money,
    String,
    Text,
    Ntext,
    Image,
    Binary,
    Date,
    Time,
    Datetime,
    Timestamp,
    TimestampOnCreate,
    TimestampOnUpdate,
}

impl AbstractType {
    /// Parse an abstract type name. Native names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let t = match name.trim().to_lowercase().as_str() {
            "pk" => AbstractType::Pk,
            "id" => AbstractType::Id,
            "fk" | "reference" => AbstractType::Reference,
            "user_id" => AbstractType::UserId,
            "user_id_on_create" => AbstractType::UserIdOnCreate,
            "user_id_on_update" => AbstractType::UserIdOnUpdate,
            "boolean" => AbstractType::Boolean,
            "integer" => AbstractType::Integer,
            "double" => AbstractType::Double,
            "text" => AbstractType::Text,
            "ntext" => AbstractType::Ntext,
            "image" => AbstractType::Image,
            "string" => AbstractType::String,
            "binary" => AbstractType::Binary,
            "datetime" => AbstractType::Datetime,
            "timestamp" => AbstractType::Timestamp,
            "timestamp_on_create" => AbstractType::TimestampOnCreate,
            "timestamp_on_update" => AbstractType::TimestampOnUpdate,
            // Abstract names that coincide with native SQL Server names.
            "bigint" => AbstractType::Bigint,
            "float" => AbstractType::Float,
            "decimal" => AbstractType::Decimal,
            "money" => AbstractType::Money,
            "date" => AbstractType::Date,
            "time" => AbstractType::Time,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractType::Pk => "pk",
            AbstractType::Id => "id",
            AbstractType::Reference => "reference",
            AbstractType::UserId => "user_id",
            AbstractType::UserIdOnCreate => "user_id_on_create",
            AbstractType::UserIdOnUpdate => "user_id_on_update",
            AbstractType::Boolean => "boolean",
            AbstractType::Integer => "integer",
            AbstractType::Bigint => "bigint",
            AbstractType::Float => "float",
            AbstractType::Double => "double",
            AbstractType::Decimal => "decimal",
            AbstractType::Money => "money",
            AbstractType::String => "string",
            AbstractType::Text => "text",
            AbstractType::Ntext => "ntext",
            AbstractType::Image => "image",
            AbstractType::Binary => "binary",
            AbstractType::Date => "date",
            AbstractType::Time => "time",
            AbstractType::Datetime => "datetime",
            AbstractType::Timestamp => "timestamp",
            AbstractType::TimestampOnCreate => "timestamp_on_create",
            AbstractType::TimestampOnUpdate => "timestamp_on_update",
        }
    }

    /// Integer-backed types eligible for the `id`/`reference` upgrade.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            AbstractType::Integer | AbstractType::Bigint | AbstractType::Id | AbstractType::Reference
        )
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column default: either a literal value or a raw SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnDefault {
    /// Emitted verbatim, e.g. `SYSDATETIMEOFFSET()`.
    Expression { expression: String },
    /// Emitted as a quoted literal.
    Value(SqlValue),
}

impl ColumnDefault {
    pub fn expression(expr: impl Into<String>) -> Self {
        ColumnDefault::Expression {
            expression: expr.into(),
        }
    }

    pub fn value(v: impl Into<SqlValue>) -> Self {
        ColumnDefault::Value(v.into())
    }
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Abstract column description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    /// Abstract or native type name.
    #[serde(rename = "type")]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,

    /// Alternate spelling of `scale`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_length: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub supports_multibyte: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub allow_null: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_primary_key: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unique: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_index: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_foreign_key: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_fields: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_on_delete: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_on_update: Option<String>,

    /// Size clause appended to the native type, e.g. `(10,2)` or `(max)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_extras: Option<String>,

    /// Unrecognized keys, preserved in input order.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            r#type: String::new(),
            length: None,
            precision: None,
            scale: None,
            decimals: None,
            size: None,
            fixed_length: false,
            supports_multibyte: false,
            default: None,
            allow_null: true,
            auto_increment: false,
            is_primary_key: false,
            is_unique: false,
            is_index: false,
            is_foreign_key: false,
            ref_table: None,
            ref_fields: None,
            ref_on_delete: None,
            ref_on_update: None,
            type_extras: None,
            extra: IndexMap::new(),
        }
    }
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.fixed_length = true;
        self
    }

    #[must_use]
    pub fn multibyte(mut self) -> Self {
        self.supports_multibyte = true;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    #[must_use]
    pub fn references(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.ref_table = Some(table.into());
        self.ref_fields = Some(field.into());
        self
    }

    /// Abstract type, if `type` is an abstract name.
    pub fn abstract_type(&self) -> Option<AbstractType> {
        AbstractType::parse(&self.r#type)
    }

    /// Scale from `scale`, falling back to `decimals`.
    pub fn effective_scale(&self) -> Option<u32> {
        self.scale.or(self.decimals)
    }

    /// Declared width from `length`, falling back to `size`.
    pub fn effective_length(&self) -> Option<u32> {
        self.length.or(self.size)
    }
}
