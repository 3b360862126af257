//! Name resolution and catalog column rows.

use crate::core::identifier::{quote_ident, split_name};
use crate::core::schema::ColumnSchema;
use crate::core::traits::TypeTranslator;
use crate::core::value::RowRef;
use crate::error::{Result, SchemaError};

/// A 1-, 2- or 3-part object name with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub catalog: Option<String>,
    pub schema: String,
    pub name: String,
    /// Quoted `[catalog].[schema].[name]` or `[schema].[name]`.
    pub raw_name: String,
    /// `name` for the default schema, `schema.name` otherwise.
    pub display_name: String,
}

/// Resolve `table`, `schema.table` or `catalog.schema.table`.
///
/// Missing or empty schema parts fall back to `default_schema`.
pub fn resolve_name(name: &str, default_schema: &str) -> Result<ResolvedName> {
    let parts = split_name(name);
    let (catalog, schema, object) = match parts.as_slice() {
        [object] => (None, default_schema.to_string(), object.clone()),
        [schema, object] => (None, schema.clone(), object.clone()),
        [catalog, schema, object] => (
            Some(catalog.clone()).filter(|c| !c.is_empty()),
            schema.clone(),
            object.clone(),
        ),
        _ => {
            return Err(SchemaError::Config(format!(
                "Invalid object name '{}': expected [catalog.][schema.]name",
                name
            )))
        }
    };
    if object.is_empty() {
        return Err(SchemaError::Config(format!(
            "Invalid object name '{}': name part is empty",
            name
        )));
    }
    let schema = if schema.is_empty() {
        default_schema.to_string()
    } else {
        schema
    };

    let mut raw_name = format!("{}.{}", quote_ident(&schema)?, quote_ident(&object)?);
    if let Some(catalog) = &catalog {
        raw_name = format!("{}.{}", quote_ident(catalog)?, raw_name);
    }

    Ok(ResolvedName {
        display_name: display_name(&schema, &object, default_schema),
        catalog,
        schema,
        name: object,
        raw_name,
    })
}

/// Human name that omits the default schema.
pub fn display_name(schema: &str, name: &str, default_schema: &str) -> String {
    if schema.is_empty() || schema.eq_ignore_ascii_case(default_schema) {
        name.to_string()
    } else {
        format!("{}.{}", schema, name)
    }
}

/// Declared width of the column, with `nchar`/`nvarchar` byte lengths halved.
/// `Err(())` marks `(max)`.
fn declared_size(type_name: &str, max_length: Option<i64>) -> Option<std::result::Result<u32, ()>> {
    let len = max_length?;
    match type_name {
        "char" | "varchar" | "binary" | "varbinary" => {
            Some(if len < 0 { Err(()) } else { Ok(len as u32) })
        }
        "nchar" | "nvarchar" => Some(if len < 0 { Err(()) } else { Ok((len / 2) as u32) }),
        _ => None,
    }
}

/// Convert one row of the columns query.
pub fn column_from_row(row: RowRef<'_>, translator: &dyn TypeTranslator) -> ColumnSchema {
    let name = row.string("column_name");
    let type_name = row.string("type_name").to_lowercase();
    let max_length = row.i64("max_length");
    let precision = row.i64("precision").map(|p| p.max(0) as u32);
    let scale = row.i64("scale").map(|s| s.max(0) as u32);

    let mut size = None;
    let mut col_precision = None;
    let mut col_scale = None;

    let db_type = match (type_name.as_str(), declared_size(&type_name, max_length)) {
        (_, Some(Ok(n))) => {
            size = Some(n);
            format!("{}({})", type_name, n)
        }
        (_, Some(Err(()))) => format!("{}(max)", type_name),
        ("decimal" | "numeric", None) => {
            col_precision = precision;
            col_scale = scale;
            format!(
                "{}({},{})",
                type_name,
                precision.unwrap_or(18),
                scale.unwrap_or(0)
            )
        }
        ("time" | "datetime2" | "datetimeoffset", None) => {
            // sys.columns keeps fractional-second precision in `scale`.
            col_precision = scale;
            match scale {
                Some(p) => format!("{}({})", type_name, p),
                None => type_name.clone(),
            }
        }
        _ => type_name.clone(),
    };

    let abstract_size = match declared_size(&type_name, max_length) {
        Some(Ok(n)) => Some(i64::from(n)),
        Some(Err(())) => Some(-1),
        None => None,
    };
    let r#type = translator.to_abstract_type(&db_type, abstract_size);

    let mut column = ColumnSchema::new(name, db_type.clone(), r#type);
    column.size = size;
    column.precision = col_precision;
    column.scale = col_scale;
    column.allow_null = row.bool("is_nullable");
    column.auto_increment = row.bool("is_identity");
    column.is_primary_key = row.bool("is_primary_key");
    column.is_unique = row.bool("is_unique");
    column.is_index = row.bool("is_index");
    column.fixed_length = translator.extract_fixed_length(&db_type);
    column.supports_multibyte = translator.extract_multibyte(&db_type);
    column.default_value = translator.extract_default(r#type, row.str("default_definition"));
    column
}
