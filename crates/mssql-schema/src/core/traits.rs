//! Core traits for schema introspection and statement generation.
//!
//! - [`Driver`]: uniform query/execute surface over one database connection
//! - [`SchemaDialect`]: identifier quoting, catalog SQL and DDL templates
//! - [`TypeTranslator`]: abstract/native column type mapping
//!
//! Drivers, dialects and translators are independent seams: the schema
//! provider and procedure invoker combine one of each.

use async_trait::async_trait;

use crate::config::DriverKind;
use crate::error::{Result, SchemaError};

use super::schema::ParamDirection;
use super::spec::{AbstractType, ColumnSpec};
use super::value::{ResultSet, SqlValue};

/// A parameter bound with an explicit direction and native type.
///
/// Used by drivers that support output binding. After
/// [`Driver::execute_bound`] returns, `value` holds the output value for
/// OUT/INOUT parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub direction: ParamDirection,
    /// Declared native type including size clause, e.g. `nvarchar(50)`.
    pub sql_type: String,
    /// Output buffer length in bytes.
    pub buffer_len: usize,
    pub value: SqlValue,
}

impl BoundParameter {
    pub fn input(value: SqlValue) -> Self {
        Self {
            name: String::new(),
            direction: ParamDirection::In,
            sql_type: String::new(),
            buffer_len: 0,
            value,
        }
    }
}

/// One logical connection to SQL Server.
///
/// SQL text uses `@P1..@Pn` placeholders. Every call runs its statements
/// sequentially and drains all result sets before returning; an
/// implementation serializes concurrent callers on its connection.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Which low-level driver this is.
    fn kind(&self) -> DriverKind;

    /// Whether [`execute_bound`](Driver::execute_bound) supports OUT/INOUT.
    fn supports_output_binding(&self) -> bool {
        false
    }

    /// Run a statement and collect every result set it produces.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<ResultSet>>;

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a statement with directional parameters bound to `@P1..@Pn` in order.
    async fn execute_bound(
        &self,
        sql: &str,
        _params: &mut [BoundParameter],
    ) -> Result<Vec<ResultSet>> {
        Err(SchemaError::query(
            format!("{} driver does not support output parameter binding", self.kind()),
            sql,
        ))
    }

    /// First result set, empty if the statement produced none.
    async fn query_first(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        Ok(self
            .query(sql, params)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// First column of the first row of the first result set.
    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlValue>> {
        let rs = self.query_first(sql, params).await?;
        Ok(rs.scalar().filter(|v| !v.is_null()).cloned())
    }

    /// Last generated identity value.
    ///
    /// `None` and `Some("")` both mean "no sequence": the current scope's
    /// identity is returned. A named sequence is resolved per table.
    async fn last_insert_id(&self, sequence: Option<&str>) -> Result<Option<SqlValue>> {
        match sequence.filter(|s| !s.is_empty()) {
            None => {
                self.query_scalar("SELECT CAST(SCOPE_IDENTITY() AS bigint)", &[])
                    .await
            }
            Some(name) => {
                self.query_scalar(
                    "SELECT CAST(IDENT_CURRENT(@P1) AS bigint)",
                    &[SqlValue::Text(name.to_string())],
                )
                .await
            }
        }
    }

    /// Release the connection.
    async fn close(&self) {}
}

/// Two-way mapping between abstract column specs and native types.
///
/// Translation returns new values; inputs are never modified.
pub trait TypeTranslator: Send + Sync {
    /// Rewrite an abstract `type` to its native name and set the flags the
    /// abstract type implies. Unrecognized types pass through unchanged.
    fn translate_simple_type(&self, spec: &ColumnSpec) -> ColumnSpec;

    /// Compute `type_extras` (the size clause) for the native type.
    fn validate_column_settings(&self, spec: &ColumnSpec) -> ColumnSpec;

    /// Assemble `<type><extras> NULL|NOT NULL [DEFAULT ..] [IDENTITY] [UNIQUE|PRIMARY KEY]`.
    ///
    /// Fails when a spec is both unique and primary key.
    fn build_column_definition(&self, spec: &ColumnSpec) -> Result<String>;

    /// Infer the abstract type from a native type name and declared size.
    fn to_abstract_type(&self, db_type: &str, size: Option<i64>) -> AbstractType;

    /// Coerce a raw catalog default literal for the given abstract type.
    fn extract_default(&self, r#type: AbstractType, raw: Option<&str>) -> Option<SqlValue>;

    /// Whether a native type is fixed-width (`char`, `nchar`, `binary`).
    fn extract_fixed_length(&self, db_type: &str) -> bool;

    /// Whether a native type stores Unicode text.
    fn extract_multibyte(&self, db_type: &str) -> bool;

    /// Full forward translation: native type string plus the translated spec.
    fn to_native_type(&self, spec: &ColumnSpec) -> (String, ColumnSpec) {
        let translated = self.validate_column_settings(&self.translate_simple_type(spec));
        let native = format!(
            "{}{}",
            translated.r#type,
            translated.type_extras.as_deref().unwrap_or("")
        );
        (native, translated)
    }
}

/// Per-dialect identifier quoting, catalog SQL and DDL templates.
///
/// Catalog queries take their table/schema arguments as `@P1..@Pn` binds.
pub trait SchemaDialect: Send + Sync {
    /// Dialect identifier.
    fn name(&self) -> &str;

    /// Schema assumed when a name carries none.
    fn default_schema(&self) -> &str;

    fn translator(&self) -> &dyn TypeTranslator;

    fn quote_simple_table_name(&self, name: &str) -> Result<String>;

    fn quote_simple_column_name(&self, name: &str) -> Result<String>;

    /// Quote a possibly dotted name part by part.
    fn quote_table_name(&self, name: &str) -> Result<String>;

    /// Render a value as a SQL literal.
    fn quote_value(&self, value: &SqlValue) -> String;

    // ===== Catalog queries =====

    /// One row per column: binds `@P1` = quoted qualified table name.
    fn columns_sql(&self) -> &str;

    /// Primary key columns: binds schema, table.
    fn primary_key_sql(&self) -> &str;

    /// Referential constraints touching a table (binds schema, table): those it
    /// owns, those referencing it, and all constraints of tables referencing it.
    fn foreign_keys_sql(&self) -> &str;

    /// Tables (and optionally views), optionally filtered on `@P1` = schema.
    fn table_names_sql(&self, include_views: bool, filter_schema: bool) -> String;

    fn view_names_sql(&self, filter_schema: bool) -> String;

    fn schema_names_sql(&self) -> &str;

    /// Routine names of one kind, optionally filtered on `@P2` = schema.
    fn routine_names_sql(&self, filter_schema: bool) -> String;

    /// One routine: binds kind, schema, name.
    fn routine_sql(&self) -> &str;

    /// Routine parameters: binds schema, name.
    fn routine_parameters_sql(&self) -> &str;

    // ===== DDL templates =====

    fn rename_table_sql(&self, table: &str, new_name: &str) -> Result<String>;

    fn rename_column_sql(&self, table: &str, column: &str, new_name: &str) -> Result<String>;

    fn alter_column_sql(&self, table: &str, column: &str, definition: &str) -> Result<String>;

    fn max_value_sql(&self, table: &str, column: &str) -> Result<String>;

    /// Reseed so that the next generated value is `next`.
    fn reset_sequence_sql(&self, table: &str, next: i64) -> Result<String>;

    fn check_integrity_sql(&self, table: &str, enable: bool) -> Result<String>;

    fn create_table_sql(&self, table: &str, columns: &[ColumnSpec]) -> Result<String>;

    fn add_column_sql(&self, table: &str, column: &ColumnSpec) -> Result<String>;

    fn drop_column_sql(&self, table: &str, column: &str) -> Result<String>;

    fn drop_table_sql(&self, table: &str) -> Result<String>;

    fn truncate_table_sql(&self, table: &str) -> Result<String>;

    fn add_primary_key_sql(&self, name: &str, table: &str, columns: &[String]) -> Result<String>;

    #[allow(clippy::too_many_arguments)]
    fn add_foreign_key_sql(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        ref_table: &str,
        ref_columns: &[String],
        on_delete: Option<&str>,
        on_update: Option<&str>,
    ) -> Result<String>;

    fn drop_foreign_key_sql(&self, name: &str, table: &str) -> Result<String>;

    fn create_index_sql(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        unique: bool,
    ) -> Result<String>;

    fn drop_index_sql(&self, name: &str, table: &str) -> Result<String>;
}
