//! MSSQL schema dialect (Strategy pattern).
//!
//! Provides SQL Server identifier quoting, the catalog queries used by the
//! schema provider and the DDL string templates.

use crate::core::identifier::{quote_ident, quote_qualified, quote_string_literal, split_name};
use crate::core::spec::ColumnSpec;
use crate::core::traits::{SchemaDialect, TypeTranslator};
use crate::core::value::SqlValue;
use crate::dialect::{mssql_literal, MssqlTypeTranslator};
use crate::error::{Result, SchemaError};

const COLUMNS_SQL: &str = r#"
SELECT
    c.name AS column_name,
    t.name AS type_name,
    CAST(c.max_length AS INT) AS max_length,
    CAST(c.precision AS INT) AS precision,
    CAST(c.scale AS INT) AS scale,
    CAST(c.is_nullable AS INT) AS is_nullable,
    CAST(c.is_identity AS INT) AS is_identity,
    dc.definition AS default_definition,
    CAST(CASE WHEN EXISTS (
        SELECT 1 FROM sys.index_columns ic
        JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id
        WHERE ic.object_id = c.object_id AND ic.column_id = c.column_id AND i.is_primary_key = 1
    ) THEN 1 ELSE 0 END AS INT) AS is_primary_key,
    CAST(CASE WHEN EXISTS (
        SELECT 1 FROM sys.index_columns ic
        JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id
        WHERE ic.object_id = c.object_id AND ic.column_id = c.column_id
          AND i.is_unique = 1 AND i.is_primary_key = 0
          AND (SELECT COUNT(*) FROM sys.index_columns ic2
               WHERE ic2.object_id = i.object_id AND ic2.index_id = i.index_id AND ic2.is_included_column = 0) = 1
    ) THEN 1 ELSE 0 END AS INT) AS is_unique,
    CAST(CASE WHEN EXISTS (
        SELECT 1 FROM sys.index_columns ic
        WHERE ic.object_id = c.object_id AND ic.column_id = c.column_id
    ) THEN 1 ELSE 0 END AS INT) AS is_index
FROM sys.columns c
JOIN sys.types t ON t.user_type_id = c.system_type_id AND t.user_type_id = t.system_type_id
LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id
WHERE c.object_id = OBJECT_ID(@P1)
ORDER BY c.column_id
"#;

const PRIMARY_KEY_SQL: &str = r#"
SELECT kcu.COLUMN_NAME AS column_name
FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
    ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
    AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
    AND kcu.TABLE_NAME = tc.TABLE_NAME
WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
  AND tc.TABLE_SCHEMA = @P1
  AND tc.TABLE_NAME = @P2
ORDER BY kcu.ORDINAL_POSITION
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT
    KCU1.CONSTRAINT_NAME AS constraint_name,
    KCU1.TABLE_SCHEMA AS table_schema,
    KCU1.TABLE_NAME AS table_name,
    KCU1.COLUMN_NAME AS column_name,
    KCU2.TABLE_SCHEMA AS referenced_table_schema,
    KCU2.TABLE_NAME AS referenced_table_name,
    KCU2.COLUMN_NAME AS referenced_column_name
FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS RC
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE KCU1
    ON KCU1.CONSTRAINT_CATALOG = RC.CONSTRAINT_CATALOG
    AND KCU1.CONSTRAINT_SCHEMA = RC.CONSTRAINT_SCHEMA
    AND KCU1.CONSTRAINT_NAME = RC.CONSTRAINT_NAME
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE KCU2
    ON KCU2.CONSTRAINT_CATALOG = RC.UNIQUE_CONSTRAINT_CATALOG
    AND KCU2.CONSTRAINT_SCHEMA = RC.UNIQUE_CONSTRAINT_SCHEMA
    AND KCU2.CONSTRAINT_NAME = RC.UNIQUE_CONSTRAINT_NAME
    AND KCU2.ORDINAL_POSITION = KCU1.ORDINAL_POSITION
WHERE (KCU1.TABLE_SCHEMA = @P1 AND KCU1.TABLE_NAME = @P2)
   OR (KCU2.TABLE_SCHEMA = @P1 AND KCU2.TABLE_NAME = @P2)
   OR KCU1.TABLE_SCHEMA + '.' + KCU1.TABLE_NAME IN (
        SELECT K1.TABLE_SCHEMA + '.' + K1.TABLE_NAME
        FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS R
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE K1
            ON K1.CONSTRAINT_SCHEMA = R.CONSTRAINT_SCHEMA AND K1.CONSTRAINT_NAME = R.CONSTRAINT_NAME
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE K2
            ON K2.CONSTRAINT_SCHEMA = R.UNIQUE_CONSTRAINT_SCHEMA AND K2.CONSTRAINT_NAME = R.UNIQUE_CONSTRAINT_NAME
        WHERE K2.TABLE_SCHEMA = @P1 AND K2.TABLE_NAME = @P2
   )
ORDER BY KCU1.CONSTRAINT_NAME, KCU1.ORDINAL_POSITION
"#;

const SCHEMA_NAMES_SQL: &str = r#"
SELECT name AS schema_name
FROM sys.schemas
WHERE name NOT IN ('INFORMATION_SCHEMA', 'sys', 'guest')
  AND name NOT LIKE 'db[_]%'
ORDER BY name
"#;

const ROUTINE_SQL: &str = r#"
SELECT
    ROUTINE_SCHEMA AS routine_schema,
    ROUTINE_NAME AS routine_name,
    ROUTINE_TYPE AS routine_type,
    DATA_TYPE AS data_type
FROM INFORMATION_SCHEMA.ROUTINES
WHERE ROUTINE_TYPE = @P1 AND ROUTINE_SCHEMA = @P2 AND ROUTINE_NAME = @P3
"#;

const ROUTINE_PARAMETERS_SQL: &str = r#"
SELECT
    PARAMETER_NAME AS parameter_name,
    CAST(ORDINAL_POSITION AS INT) AS ordinal_position,
    PARAMETER_MODE AS parameter_mode,
    IS_RESULT AS is_result,
    DATA_TYPE AS data_type,
    CAST(CHARACTER_MAXIMUM_LENGTH AS INT) AS character_maximum_length,
    CAST(NUMERIC_PRECISION AS INT) AS numeric_precision,
    CAST(NUMERIC_SCALE AS INT) AS numeric_scale
FROM INFORMATION_SCHEMA.PARAMETERS
WHERE SPECIFIC_SCHEMA = @P1 AND SPECIFIC_NAME = @P2
ORDER BY ORDINAL_POSITION
"#;

const REFERENTIAL_ACTIONS: [&str; 4] = ["CASCADE", "NO ACTION", "SET NULL", "SET DEFAULT"];

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect {
    translator: MssqlTypeTranslator,
}

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self {
            translator: MssqlTypeTranslator::new(),
        }
    }

    fn column_list(columns: &[String]) -> Result<String> {
        if columns.is_empty() {
            return Err(SchemaError::Config(
                "column list cannot be empty".to_string(),
            ));
        }
        let quoted = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }

    fn referential_action(action: &str) -> Result<String> {
        let normalized = action.trim().to_uppercase().replace('_', " ");
        if REFERENTIAL_ACTIONS.contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(SchemaError::Config(format!(
                "unsupported referential action '{}'",
                action
            )))
        }
    }

    /// Last part of a possibly qualified name, unquoted.
    fn simple_name(name: &str) -> Result<String> {
        split_name(name)
            .pop()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SchemaError::Config(format!("invalid object name '{}'", name)))
    }

    fn foreign_key_clause(
        ref_table: &str,
        ref_columns: &str,
        on_delete: Option<&str>,
        on_update: Option<&str>,
    ) -> Result<String> {
        let mut clause = format!("REFERENCES {} ({})", ref_table, ref_columns);
        if let Some(action) = on_delete {
            clause.push_str(&format!(" ON DELETE {}", Self::referential_action(action)?));
        }
        if let Some(action) = on_update {
            clause.push_str(&format!(" ON UPDATE {}", Self::referential_action(action)?));
        }
        Ok(clause)
    }
}

impl SchemaDialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn default_schema(&self) -> &str {
        "dbo"
    }

    fn translator(&self) -> &dyn TypeTranslator {
        &self.translator
    }

    fn quote_simple_table_name(&self, name: &str) -> Result<String> {
        quote_ident(name)
    }

    fn quote_simple_column_name(&self, name: &str) -> Result<String> {
        quote_ident(name)
    }

    fn quote_table_name(&self, name: &str) -> Result<String> {
        quote_qualified(name)
    }

    fn quote_value(&self, value: &SqlValue) -> String {
        mssql_literal(value)
    }

    fn columns_sql(&self) -> &str {
        COLUMNS_SQL
    }

    fn primary_key_sql(&self) -> &str {
        PRIMARY_KEY_SQL
    }

    fn foreign_keys_sql(&self) -> &str {
        FOREIGN_KEYS_SQL
    }

    fn table_names_sql(&self, include_views: bool, filter_schema: bool) -> String {
        let types = if include_views {
            "'BASE TABLE', 'VIEW'"
        } else {
            "'BASE TABLE'"
        };
        let filter = if filter_schema {
            "AND TABLE_SCHEMA = @P1"
        } else {
            "AND TABLE_SCHEMA NOT IN ('INFORMATION_SCHEMA', 'sys')"
        };
        format!(
            "SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name, TABLE_TYPE AS table_type \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE IN ({}) {} \
             ORDER BY TABLE_SCHEMA, TABLE_NAME",
            types, filter
        )
    }

    fn view_names_sql(&self, filter_schema: bool) -> String {
        let filter = if filter_schema {
            "AND TABLE_SCHEMA = @P1"
        } else {
            "AND TABLE_SCHEMA NOT IN ('INFORMATION_SCHEMA', 'sys')"
        };
        format!(
            "SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name, TABLE_TYPE AS table_type \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'VIEW' {} \
             ORDER BY TABLE_SCHEMA, TABLE_NAME",
            filter
        )
    }

    fn schema_names_sql(&self) -> &str {
        SCHEMA_NAMES_SQL
    }

    fn routine_names_sql(&self, filter_schema: bool) -> String {
        let filter = if filter_schema {
            " AND ROUTINE_SCHEMA = @P2"
        } else {
            ""
        };
        format!(
            "SELECT ROUTINE_SCHEMA AS routine_schema, ROUTINE_NAME AS routine_name \
             FROM INFORMATION_SCHEMA.ROUTINES \
             WHERE ROUTINE_TYPE = @P1{} \
             ORDER BY ROUTINE_SCHEMA, ROUTINE_NAME",
            filter
        )
    }

    fn routine_sql(&self) -> &str {
        ROUTINE_SQL
    }

    fn routine_parameters_sql(&self) -> &str {
        ROUTINE_PARAMETERS_SQL
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> Result<String> {
        let from = quote_qualified(table)?;
        let to = Self::simple_name(new_name)?;
        Ok(format!(
            "EXEC sp_rename {}, {}",
            quote_string_literal(&from),
            quote_string_literal(&to)
        ))
    }

    fn rename_column_sql(&self, table: &str, column: &str, new_name: &str) -> Result<String> {
        let from = format!("{}.{}", quote_qualified(table)?, quote_ident(column)?);
        let to = Self::simple_name(new_name)?;
        Ok(format!(
            "EXEC sp_rename {}, {}, 'COLUMN'",
            quote_string_literal(&from),
            quote_string_literal(&to)
        ))
    }

    fn alter_column_sql(&self, table: &str, column: &str, definition: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            quote_qualified(table)?,
            quote_ident(column)?,
            definition
        ))
    }

    fn max_value_sql(&self, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "SELECT MAX({}) FROM {}",
            quote_ident(column)?,
            quote_qualified(table)?
        ))
    }

    fn reset_sequence_sql(&self, table: &str, next: i64) -> Result<String> {
        let name = quote_qualified(table)?;
        let seed = next.checked_sub(1).ok_or_else(|| {
            SchemaError::Config(format!("cannot reseed {} below {}", table, next))
        })?;
        Ok(format!(
            "DBCC CHECKIDENT ('{}', RESEED, {})",
            name.replace('\'', "''"),
            seed
        ))
    }

    fn check_integrity_sql(&self, table: &str, enable: bool) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} {} CONSTRAINT ALL",
            quote_qualified(table)?,
            if enable { "CHECK" } else { "NOCHECK" }
        ))
    }

    fn create_table_sql(&self, table: &str, columns: &[ColumnSpec]) -> Result<String> {
        if columns.is_empty() {
            return Err(SchemaError::Config(format!(
                "table '{}' needs at least one column",
                table
            )));
        }

        let quoted_table = quote_qualified(table)?;
        let table_name = Self::simple_name(table)?;

        let translated: Vec<ColumnSpec> = columns
            .iter()
            .map(|c| self.translator.to_native_type(c).1)
            .collect();
        let pk_columns: Vec<String> = translated
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        let composite = pk_columns.len() > 1;

        let mut lines = Vec::with_capacity(columns.len() + 1);
        for (original, spec) in columns.iter().zip(&translated) {
            if spec.is_unique && spec.is_primary_key {
                return Err(SchemaError::Config(format!(
                    "column '{}' cannot be both unique and primary key",
                    original.name
                )));
            }
            let mut spec = spec.clone();
            if composite {
                spec.is_primary_key = false;
            }
            let definition = self.translator.build_column_definition(&spec)?;
            lines.push(format!("{} {}", quote_ident(&spec.name)?, definition));
        }

        if composite {
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(&format!("PK_{}", table_name))?,
                Self::column_list(&pk_columns)?
            ));
        }

        for spec in translated.iter().filter(|c| c.ref_table.is_some()) {
            let ref_table = spec.ref_table.as_deref().unwrap_or_default();
            let ref_field = spec.ref_fields.as_deref().unwrap_or("id");
            let clause = Self::foreign_key_clause(
                &quote_qualified(ref_table)?,
                &quote_ident(ref_field)?,
                spec.ref_on_delete.as_deref(),
                spec.ref_on_update.as_deref(),
            )?;
            lines.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) {}",
                quote_ident(&format!("fk_{}_{}", table_name, spec.name))?,
                quote_ident(&spec.name)?,
                clause
            ));
        }

        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            quoted_table,
            lines.join(",\n    ")
        ))
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSpec) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {} {}",
            quote_qualified(table)?,
            quote_ident(&column.name)?,
            self.translator.build_column_definition(column)?
        ))
    }

    fn drop_column_sql(&self, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_qualified(table)?,
            quote_ident(column)?
        ))
    }

    fn drop_table_sql(&self, table: &str) -> Result<String> {
        Ok(format!("DROP TABLE {}", quote_qualified(table)?))
    }

    fn truncate_table_sql(&self, table: &str) -> Result<String> {
        Ok(format!("TRUNCATE TABLE {}", quote_qualified(table)?))
    }

    fn add_primary_key_sql(&self, name: &str, table: &str, columns: &[String]) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            quote_qualified(table)?,
            quote_ident(name)?,
            Self::column_list(columns)?
        ))
    }

    fn add_foreign_key_sql(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        ref_table: &str,
        ref_columns: &[String],
        on_delete: Option<&str>,
        on_update: Option<&str>,
    ) -> Result<String> {
        if columns.len() != ref_columns.len() {
            return Err(SchemaError::Config(format!(
                "foreign key '{}' has {} columns but references {}",
                name,
                columns.len(),
                ref_columns.len()
            )));
        }
        let clause = Self::foreign_key_clause(
            &quote_qualified(ref_table)?,
            &Self::column_list(ref_columns)?,
            on_delete,
            on_update,
        )?;
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) {}",
            quote_qualified(table)?,
            quote_ident(name)?,
            Self::column_list(columns)?,
            clause
        ))
    }

    fn drop_foreign_key_sql(&self, name: &str, table: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote_qualified(table)?,
            quote_ident(name)?
        ))
    }

    fn create_index_sql(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        unique: bool,
    ) -> Result<String> {
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            quote_ident(name)?,
            quote_qualified(table)?,
            Self::column_list(columns)?
        ))
    }

    fn drop_index_sql(&self, name: &str, table: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {} ON {}",
            quote_ident(name)?,
            quote_qualified(table)?
        ))
    }
}
