//! Catalog introspection and DDL execution over one connection.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::core::identifier::{compare_table_names, qualify};
use crate::core::schema::{
    ParamDirection, RoutineKind, RoutineParam, RoutineSchema, TableNameInfo, TableSchema,
};
use crate::core::spec::ColumnSpec;
use crate::core::traits::{Driver, SchemaDialect};
use crate::core::value::{ResultSet, SqlValue};
use crate::error::{ObjectKind, Result, SchemaError};

use super::columns::{column_from_row, display_name, resolve_name, ResolvedName};
use super::integrity::IntegrityCache;
use super::relations::{apply_foreign_keys, apply_primary_key, ForeignKeyRow};

/// Schema introspection for one database connection.
///
/// Every call queries the catalog; nothing is cached between calls, so a
/// table loaded before a DDL change must be reloaded by the caller.
pub struct SchemaProvider {
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn SchemaDialect>,
    default_schema: String,
}

impl SchemaProvider {
    pub fn new(driver: Arc<dyn Driver>, dialect: Arc<dyn SchemaDialect>) -> Self {
        let default_schema = dialect.default_schema().to_string();
        Self {
            driver,
            dialect,
            default_schema,
        }
    }

    /// Use a default schema other than the dialect's.
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    pub fn dialect(&self) -> &dyn SchemaDialect {
        self.dialect.as_ref()
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn resolve_name(&self, name: &str) -> Result<ResolvedName> {
        resolve_name(name, &self.default_schema)
    }

    pub fn quote_simple_table_name(&self, name: &str) -> Result<String> {
        self.dialect.quote_simple_table_name(name)
    }

    pub fn quote_simple_column_name(&self, name: &str) -> Result<String> {
        self.dialect.quote_simple_column_name(name)
    }

    pub fn quote_table_name(&self, name: &str) -> Result<String> {
        self.dialect.quote_table_name(name)
    }

    pub fn quote_value(&self, value: &SqlValue) -> String {
        self.dialect.quote_value(value)
    }

    pub fn compare_table_names(&self, a: &str, b: &str) -> bool {
        compare_table_names(a, b)
    }

    // ===== Tables =====

    /// Load a table with its columns, keys and relations.
    ///
    /// Returns [`SchemaError::NotFound`] when the catalog has no columns for
    /// the name; query failures are returned as they are.
    pub async fn load_table(&self, name: &str) -> Result<TableSchema> {
        let resolved = self.resolve_name(name)?;
        let rs = self
            .driver
            .query_first(
                self.dialect.columns_sql(),
                &[SqlValue::Text(resolved.raw_name.clone())],
            )
            .await?;
        if rs.is_empty() {
            return Err(SchemaError::not_found(ObjectKind::Table, resolved.display_name));
        }

        let mut table = TableSchema::new(
            resolved.name.clone(),
            resolved.schema.clone(),
            resolved.raw_name.clone(),
            resolved.display_name.clone(),
        );
        table.catalog_name = resolved.catalog.clone();

        let translator = self.dialect.translator();
        for row in rs.iter() {
            let column = column_from_row(row, translator);
            if column.auto_increment && table.sequence_name.is_none() {
                table.sequence_name = Some(table.raw_name.clone());
            }
            table.columns.insert(column.name.clone(), column);
        }
        debug!(
            "Loaded {} columns for {}",
            table.columns.len(),
            table.display_name
        );

        self.find_constraints(&mut table).await?;
        Ok(table)
    }

    /// Primary key pass followed by the referential-constraint pass.
    pub async fn find_constraints(&self, table: &mut TableSchema) -> Result<()> {
        let binds = [
            SqlValue::Text(table.schema_name.clone()),
            SqlValue::Text(table.name.clone()),
        ];

        let pk = self
            .driver
            .query_first(self.dialect.primary_key_sql(), &binds)
            .await?;
        let key_columns: Vec<String> = pk.iter().map(|row| row.string("column_name")).collect();
        apply_primary_key(table, key_columns);

        let fks = self
            .driver
            .query_first(self.dialect.foreign_keys_sql(), &binds)
            .await?;
        let rows = ForeignKeyRow::from_result_set(&fks);
        apply_foreign_keys(table, &rows, &self.default_schema);

        debug!(
            "Loaded {} key columns, {} foreign keys and {} relations for {}",
            table.primary_key.len(),
            table.foreign_keys.len(),
            table.relations.len(),
            table.display_name
        );
        Ok(())
    }

    fn table_name_info(&self, rs: &ResultSet) -> Result<IndexMap<String, TableNameInfo>> {
        let mut names = IndexMap::new();
        for row in rs.iter() {
            let schema = row.string("table_schema");
            let table = row.string("table_name");
            let name = display_name(&schema, &table, &self.default_schema);
            let info = TableNameInfo {
                raw_name: qualify(&schema, &table)?,
                is_view: row.string("table_type").eq_ignore_ascii_case("VIEW"),
                schema_name: schema,
                table_name: table,
                name: name.clone(),
            };
            names.insert(name.to_lowercase(), info);
        }
        Ok(names)
    }

    fn schema_binds(schema: Option<&str>) -> Vec<SqlValue> {
        schema
            .map(|s| vec![SqlValue::Text(s.to_string())])
            .unwrap_or_default()
    }

    /// Tables (and optionally views) keyed by lower-cased display name.
    pub async fn find_table_names(
        &self,
        schema: Option<&str>,
        include_views: bool,
    ) -> Result<IndexMap<String, TableNameInfo>> {
        let sql = self.dialect.table_names_sql(include_views, schema.is_some());
        let rs = self
            .driver
            .query_first(&sql, &Self::schema_binds(schema))
            .await?;
        let names = self.table_name_info(&rs)?;
        debug!("Found {} tables", names.len());
        Ok(names)
    }

    pub async fn find_view_names(
        &self,
        schema: Option<&str>,
    ) -> Result<IndexMap<String, TableNameInfo>> {
        let sql = self.dialect.view_names_sql(schema.is_some());
        let rs = self
            .driver
            .query_first(&sql, &Self::schema_binds(schema))
            .await?;
        self.table_name_info(&rs)
    }

    pub async fn find_schema_names(&self) -> Result<Vec<String>> {
        let rs = self
            .driver
            .query_first(self.dialect.schema_names_sql(), &[])
            .await?;
        Ok(rs.iter().map(|row| row.string("schema_name")).collect())
    }

    // ===== Routines =====

    async fn find_routine_names(
        &self,
        kind: RoutineKind,
        schema: Option<&str>,
    ) -> Result<Vec<String>> {
        let sql = self.dialect.routine_names_sql(schema.is_some());
        let mut binds = vec![SqlValue::Text(kind.catalog_name().to_string())];
        binds.extend(Self::schema_binds(schema));

        let rs = self.driver.query_first(&sql, &binds).await?;
        Ok(rs
            .iter()
            .map(|row| {
                display_name(
                    &row.string("routine_schema"),
                    &row.string("routine_name"),
                    &self.default_schema,
                )
            })
            .collect())
    }

    pub async fn find_procedure_names(&self, schema: Option<&str>) -> Result<Vec<String>> {
        self.find_routine_names(RoutineKind::Procedure, schema).await
    }

    pub async fn find_function_names(&self, schema: Option<&str>) -> Result<Vec<String>> {
        self.find_routine_names(RoutineKind::Function, schema).await
    }

    /// Routine metadata with its declared parameters.
    pub async fn load_routine(&self, name: &str, kind: RoutineKind) -> Result<RoutineSchema> {
        let resolved = self.resolve_name(name)?;
        let routine = self
            .driver
            .query_first(
                self.dialect.routine_sql(),
                &[
                    SqlValue::Text(kind.catalog_name().to_string()),
                    SqlValue::Text(resolved.schema.clone()),
                    SqlValue::Text(resolved.name.clone()),
                ],
            )
            .await?;
        let Some(row) = routine.first() else {
            let object = match kind {
                RoutineKind::Procedure => ObjectKind::Procedure,
                RoutineKind::Function => ObjectKind::Function,
            };
            return Err(SchemaError::not_found(object, resolved.display_name));
        };
        let mut return_type = row.str("data_type").map(str::to_string);

        let params = self
            .driver
            .query_first(
                self.dialect.routine_parameters_sql(),
                &[
                    SqlValue::Text(resolved.schema.clone()),
                    SqlValue::Text(resolved.name.clone()),
                ],
            )
            .await?;

        let mut declared = Vec::new();
        for row in params.iter() {
            if row.string("is_result").eq_ignore_ascii_case("YES") {
                return_type = row.str("data_type").map(str::to_string);
                continue;
            }
            declared.push(RoutineParam {
                name: row.string("parameter_name").trim_start_matches('@').to_string(),
                position: row.i64("ordinal_position").unwrap_or(0),
                direction: ParamDirection::parse(&row.string("parameter_mode")).unwrap_or_default(),
                db_type: row.string("data_type"),
                length: row.i64("character_maximum_length"),
                precision: row.i64("numeric_precision"),
                scale: row.i64("numeric_scale"),
            });
        }

        Ok(RoutineSchema {
            name: resolved.name,
            schema_name: resolved.schema,
            raw_name: resolved.raw_name,
            kind,
            return_type: match kind {
                RoutineKind::Function => return_type,
                RoutineKind::Procedure => None,
            },
            params: declared,
        })
    }

    // ===== DDL =====

    async fn run_ddl(&self, sql: String) -> Result<String> {
        info!("Executing DDL: {}", sql);
        self.driver.execute(&sql, &[]).await?;
        Ok(sql)
    }

    pub async fn rename_table(&self, table: &str, new_name: &str) -> Result<String> {
        self.run_ddl(self.dialect.rename_table_sql(table, new_name)?)
            .await
    }

    pub async fn rename_column(&self, table: &str, column: &str, new_name: &str) -> Result<String> {
        self.run_ddl(self.dialect.rename_column_sql(table, column, new_name)?)
            .await
    }

    /// `ALTER COLUMN` to the column's native type and nullability.
    ///
    /// SQL Server cannot change defaults or keys in `ALTER COLUMN`; only the
    /// type and NULL/NOT NULL are applied.
    pub fn alter_column_sql(&self, table: &str, column: &str, spec: &ColumnSpec) -> Result<String> {
        let (native, translated) = self.dialect.translator().to_native_type(spec);
        let definition = format!(
            "{} {}",
            native,
            if translated.allow_null { "NULL" } else { "NOT NULL" }
        );
        self.dialect.alter_column_sql(table, column, &definition)
    }

    pub async fn alter_column(&self, table: &str, column: &str, spec: &ColumnSpec) -> Result<String> {
        self.run_ddl(self.alter_column_sql(table, column, spec)?).await
    }

    pub async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<String> {
        self.run_ddl(self.dialect.create_table_sql(table, columns)?)
            .await
    }

    pub async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<String> {
        self.run_ddl(self.dialect.add_column_sql(table, column)?).await
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> Result<String> {
        self.run_ddl(self.dialect.drop_column_sql(table, column)?).await
    }

    pub async fn drop_table(&self, table: &str) -> Result<String> {
        self.run_ddl(self.dialect.drop_table_sql(table)?).await
    }

    pub async fn truncate_table(&self, table: &str) -> Result<String> {
        self.run_ddl(self.dialect.truncate_table_sql(table)?).await
    }

    pub async fn add_primary_key(&self, name: &str, table: &str, columns: &[String]) -> Result<String> {
        self.run_ddl(self.dialect.add_primary_key_sql(name, table, columns)?)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_foreign_key(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        ref_table: &str,
        ref_columns: &[String],
        on_delete: Option<&str>,
        on_update: Option<&str>,
    ) -> Result<String> {
        let sql = self.dialect.add_foreign_key_sql(
            name,
            table,
            columns,
            ref_table,
            ref_columns,
            on_delete,
            on_update,
        )?;
        self.run_ddl(sql).await
    }

    pub async fn drop_foreign_key(&self, name: &str, table: &str) -> Result<String> {
        self.run_ddl(self.dialect.drop_foreign_key_sql(name, table)?)
            .await
    }

    pub async fn create_index(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
        unique: bool,
    ) -> Result<String> {
        self.run_ddl(self.dialect.create_index_sql(name, table, columns, unique)?)
            .await
    }

    pub async fn drop_index(&self, name: &str, table: &str) -> Result<String> {
        self.run_ddl(self.dialect.drop_index_sql(name, table)?).await
    }

    /// Reseed a table's identity so the next generated value is `value`, or
    /// `MAX(identity) + 1` when no value is given.
    ///
    /// Returns the next value, or `None` when the table has no identity column.
    pub async fn reset_sequence(&self, table: &str, value: Option<i64>) -> Result<Option<i64>> {
        let schema = self.load_table(table).await?;
        let Some(identity) = schema.columns.values().find(|c| c.auto_increment) else {
            debug!("{} has no identity column, not reseeding", schema.display_name);
            return Ok(None);
        };

        let next = match value {
            Some(v) => v,
            None => {
                let sql = self.dialect.max_value_sql(&schema.raw_name, &identity.name)?;
                let max = match self.driver.query_scalar(&sql, &[]).await? {
                    None => 0,
                    Some(v) => v.as_i64().ok_or_else(|| {
                        SchemaError::query(
                            format!("MAX({}) is not an integer: {}", identity.name, v),
                            sql.clone(),
                        )
                    })?,
                };
                max.checked_add(1).ok_or_else(|| {
                    SchemaError::query(
                        format!("identity {} is exhausted", identity.name),
                        sql.clone(),
                    )
                })?
            }
        };

        self.run_ddl(self.dialect.reset_sequence_sql(&schema.raw_name, next)?)
            .await?;
        Ok(Some(next))
    }

    /// Enable or disable constraint checking on every base table of a schema.
    /// `None` covers every schema in the database, not just the default one.
    /// Returns the number of tables.
    pub async fn check_integrity(
        &self,
        enable: bool,
        schema: Option<&str>,
        cache: &mut IntegrityCache,
    ) -> Result<usize> {
        if cache.get(schema).is_none() {
            let names = self.find_table_names(schema, false).await?;
            let tables = names
                .values()
                .filter(|t| !t.is_view)
                .map(|t| t.raw_name.clone())
                .collect();
            cache.insert(schema, tables);
        }
        let tables = cache.get(schema).unwrap_or_default();

        for table in tables {
            let sql = self.dialect.check_integrity_sql(table, enable)?;
            self.driver.execute(&sql, &[]).await?;
        }
        info!(
            "{} constraint checking on {} tables",
            if enable { "Enabled" } else { "Disabled" },
            tables.len()
        );
        Ok(tables.len())
    }
}
