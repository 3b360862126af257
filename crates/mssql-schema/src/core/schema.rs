//! Normalized catalog metadata: columns, tables, relations and routines.
//!
//! These types are built by the schema provider from catalog queries and are
//! treated as read-only by callers.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::spec::AbstractType;
use super::value::SqlValue;
use crate::error::{Result, SchemaError};

/// One introspected column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    /// Catalog name.
    pub name: String,

    /// Bracket-quoted name.
    pub raw_name: String,

    /// Native type as reported by the catalog, e.g. `nvarchar(50)`.
    pub db_type: String,

    /// Abstract logical type.
    #[serde(rename = "type")]
    pub r#type: AbstractType,

    /// Declared width for sized types. Never set together with precision/scale.
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,

    pub allow_null: bool,
    pub auto_increment: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_index: bool,
    pub is_foreign_key: bool,
    pub fixed_length: bool,
    pub supports_multibyte: bool,

    /// Referenced table (display name) when the column is a foreign key.
    pub ref_table: Option<String>,
    pub ref_fields: Option<String>,

    /// Default coerced to the abstract type.
    pub default_value: Option<SqlValue>,
}

impl ColumnSchema {
    /// Create a column with only its identity and types filled in.
    pub fn new(name: impl Into<String>, db_type: impl Into<String>, r#type: AbstractType) -> Self {
        let name = name.into();
        Self {
            raw_name: format!("[{}]", name.replace(']', "]]")),
            name,
            db_type: db_type.into(),
            r#type,
            size: None,
            precision: None,
            scale: None,
            allow_null: true,
            auto_increment: false,
            is_primary_key: false,
            is_unique: false,
            is_index: false,
            is_foreign_key: false,
            fixed_length: false,
            supports_multibyte: false,
            ref_table: None,
            ref_fields: None,
            default_value: None,
        }
    }
}

/// Primary key shape, matching the cardinality of the underlying key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    #[default]
    None,
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Build from an ordered list of key columns.
    pub fn from_columns(mut columns: Vec<String>) -> Self {
        match columns.len() {
            0 => PrimaryKey::None,
            1 => PrimaryKey::Single(columns.remove(0)),
            _ => PrimaryKey::Composite(columns),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::None => Vec::new(),
            PrimaryKey::Single(c) => vec![c.as_str()],
            PrimaryKey::Composite(cs) => cs.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimaryKey::None => 0,
            PrimaryKey::Single(_) => 1,
            PrimaryKey::Composite(cs) => cs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Target of a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyRef {
    pub constraint: String,
    pub ref_table: String,
    pub ref_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasMany,
    ManyMany,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::HasMany => "has_many",
            RelationKind::ManyMany => "many_many",
        })
    }
}

/// Junction side of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Junction {
    pub table: String,
    /// Junction column pointing at the owning table.
    pub field: String,
    /// Junction column pointing at the related table.
    pub ref_field: String,
}

/// Relation derived from foreign-key constraints.
///
/// `many_many` relations come from a co-occurring foreign key heuristic and
/// are advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub name: String,
    /// Column on this table.
    pub field: String,
    pub ref_table: String,
    pub ref_field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junction: Option<Junction>,
}

/// Introspected table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub schema_name: String,
    pub catalog_name: Option<String>,

    /// Fully qualified, quoted name.
    pub raw_name: String,

    /// Name qualified only when the schema is not the default.
    pub display_name: String,

    /// Columns in catalog order, keyed by column name.
    pub columns: IndexMap<String, ColumnSchema>,

    pub primary_key: PrimaryKey,

    /// Column name to referenced table/column.
    pub foreign_keys: IndexMap<String, ForeignKeyRef>,

    pub relations: Vec<Relation>,

    pub sequence_name: Option<String>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        schema_name: impl Into<String>,
        raw_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schema_name: schema_name.into(),
            catalog_name: None,
            raw_name: raw_name.into(),
            display_name: display_name.into(),
            columns: IndexMap::new(),
            primary_key: PrimaryKey::None,
            foreign_keys: IndexMap::new(),
            relations: Vec::new(),
            sequence_name: None,
        }
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.get(name).or_else(|| {
            self.columns
                .values()
                .find(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        if self.columns.contains_key(name) {
            return self.columns.get_mut(name);
        }
        self.columns
            .values_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn relations_of(&self, kind: RelationKind) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |r| r.kind == kind)
    }

    /// Add a relation unless one with the same name already exists.
    pub(crate) fn add_relation(&mut self, relation: Relation) {
        if !self.relations.iter().any(|r| r.name == relation.name) {
            self.relations.push(relation);
        }
    }

    /// Verify the structural invariants between keys and columns.
    pub fn check_invariants(&self) -> Result<()> {
        for column in self.foreign_keys.keys() {
            if self.column(column).is_none() {
                return Err(SchemaError::Config(format!(
                    "foreign key column '{}' is not a column of {}",
                    column, self.display_name
                )));
            }
        }
        let flagged = self.columns.values().filter(|c| c.is_primary_key).count();
        if flagged != self.primary_key.len() {
            return Err(SchemaError::Config(format!(
                "{} has {} primary key columns flagged but a key of {}",
                self.display_name,
                flagged,
                self.primary_key.len()
            )));
        }
        Ok(())
    }
}

/// One entry of a table-name listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNameInfo {
    pub schema_name: String,
    pub table_name: String,
    /// Display name with original casing.
    pub name: String,
    pub raw_name: String,
    pub is_view: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl RoutineKind {
    /// `ROUTINE_TYPE` value in `INFORMATION_SCHEMA.ROUTINES`.
    pub fn catalog_name(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "PROCEDURE",
            RoutineKind::Function => "FUNCTION",
        }
    }
}

/// Direction of a routine parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamDirection {
    /// Parse `IN`, `OUT`, `OUTPUT`, `INOUT` or `IN_OUT`, any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IN" => Some(ParamDirection::In),
            "OUT" | "OUTPUT" => Some(ParamDirection::Out),
            "INOUT" | "IN_OUT" => Some(ParamDirection::InOut),
            _ => None,
        }
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, ParamDirection::In)
    }
}

impl fmt::Display for ParamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamDirection::In => "IN",
            ParamDirection::Out => "OUT",
            ParamDirection::InOut => "INOUT",
        })
    }
}

/// Declared routine parameter from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineParam {
    pub name: String,
    pub position: i64,
    pub direction: ParamDirection,
    pub db_type: String,
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
}

/// Procedure or function metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineSchema {
    pub name: String,
    pub schema_name: String,
    pub raw_name: String,
    pub kind: RoutineKind,
    /// Declared return type for functions (`TABLE` for table-valued ones).
    pub return_type: Option<String>,
    pub params: Vec<RoutineParam>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_cardinality() {
        assert_eq!(PrimaryKey::from_columns(vec![]), PrimaryKey::None);
        assert_eq!(
            PrimaryKey::from_columns(vec!["id".into()]),
            PrimaryKey::Single("id".into())
        );
        let composite = PrimaryKey::from_columns(vec!["a".into(), "b".into()]);
        assert_eq!(composite.columns(), vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&composite).unwrap(), r#"["a","b"]"#);
        assert_eq!(serde_json::to_string(&PrimaryKey::None).unwrap(), "null");
    }

    #[test]
    fn test_param_direction_parse() {
        assert_eq!(ParamDirection::parse("in"), Some(ParamDirection::In));
        assert_eq!(ParamDirection::parse("OUTPUT"), Some(ParamDirection::Out));
        assert_eq!(ParamDirection::parse("in_out"), Some(ParamDirection::InOut));
        assert_eq!(ParamDirection::parse("sideways"), None);
    }

    #[test]
    fn test_check_invariants() {
        let mut table = TableSchema::new("orders", "dbo", "[dbo].[orders]", "orders");
        let mut id = ColumnSchema::new("id", "int", AbstractType::Id);
        id.is_primary_key = true;
        table.columns.insert("id".into(), id);
        table.primary_key = PrimaryKey::Single("id".into());
        assert!(table.check_invariants().is_ok());

        table.foreign_keys.insert(
            "customer_id".into(),
            ForeignKeyRef {
                constraint: "fk_orders_customer".into(),
                ref_table: "customers".into(),
                ref_field: "id".into(),
            },
        );
        assert!(table.check_invariants().is_err());
    }
}
