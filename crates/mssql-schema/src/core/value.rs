//! SQL scalar values and result sets.
//!
//! [`SqlValue`] is the portable scalar exchanged with drivers: bound as a
//! statement parameter, read back from result rows, and used for column
//! defaults. [`ResultSet`] is one tabular output of a statement.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owned SQL scalar value.
///
/// Deserializes untagged so that YAML/JSON scalars map onto the natural
/// variant (`null`, booleans, integers, floats, strings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Decimal(Decimal),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, converting from booleans, decimals and numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Decimal(d) => d.trunc().to_string().parse().ok(),
            SqlValue::F64(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view using the permissive parser for text.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::I64(v) => Some(*v != 0),
            SqlValue::F64(f) => Some(*f != 0.0),
            SqlValue::Text(s) => parse_bool(s),
            SqlValue::Null => Some(false),
            _ => None,
        }
    }

    /// Render the value as text, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            SqlValue::Uuid(u) => write!(f, "{}", u),
            SqlValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::DateTimeOffset(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f %:z")),
            SqlValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            SqlValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Permissive boolean parser.
///
/// Accepts `1/0`, `true/false`, `yes/no`, `on/off`, `y/n` in any case; an
/// empty string is false. Anything else is `None`.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" | "" => Some(false),
        _ => None,
    }
}

/// One tabular output of a statement: ordered column names plus rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    /// Create an empty result set with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder-style row append.
    #[must_use]
    pub fn with_row(mut self, row: Vec<SqlValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Iterate rows with by-name accessors.
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    /// First row, if any.
    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|r| r.first())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.iter()
            .map(|row| {
                row.columns
                    .iter()
                    .zip(row.values)
                    .map(|(c, v)| {
                        let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (c.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    pub columns: &'a [String],
    pub values: &'a [SqlValue],
}

impl<'a> RowRef<'a> {
    /// Value by case-insensitive column name.
    pub fn get(&self, name: &str) -> Option<&'a SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Non-null text value.
    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(SqlValue::as_str)
    }

    /// Text value or empty string.
    pub fn string(&self, name: &str) -> String {
        self.get(name).and_then(SqlValue::to_text).unwrap_or_default()
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(SqlValue::as_bool).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_permissive() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(SqlValue::Text("42".into()).as_i64(), Some(42));
        assert_eq!(SqlValue::Bool(true).as_i64(), Some(1));
        assert_eq!(SqlValue::I64(0).as_bool(), Some(false));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::Bytes(vec![0xde, 0xad]).to_string(), "0xDEAD");
    }

    #[test]
    fn test_row_access_is_case_insensitive() {
        let rs = ResultSet::new(["COLUMN_NAME", "is_nullable"])
            .with_row(vec!["Id".into(), SqlValue::I64(0)]);
        let row = rs.first().unwrap();
        assert_eq!(row.str("column_name"), Some("Id"));
        assert!(!row.bool("IS_NULLABLE"));
        assert_eq!(rs.column_index("Column_Name"), Some(0));
    }

    #[test]
    fn test_untagged_deserialize() {
        let v: Vec<SqlValue> = serde_json::from_str(r#"[null, true, 7, 1.5, "x"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                SqlValue::Null,
                SqlValue::Bool(true),
                SqlValue::I64(7),
                SqlValue::F64(1.5),
                SqlValue::Text("x".into())
            ]
        );
    }
}
