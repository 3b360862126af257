//! Scripted in-memory driver for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mssql_schema::{
    BoundParameter, Driver, DriverKind, MssqlDialect, ResultSet, SchemaDialect, SqlValue,
};

struct Response {
    sql_contains: String,
    param: Option<String>,
    sets: Vec<ResultSet>,
}

/// Driver returning canned result sets for statements matching a substring.
///
/// Statements with no matching response return no result sets.
#[derive(Default)]
pub struct ScriptedDriver {
    responses: Vec<Response>,
    bound_outputs: Vec<(String, SqlValue)>,
    output_binding: bool,
    calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_binding(mut self) -> Self {
        self.output_binding = true;
        self
    }

    /// Respond to statements containing `sql_contains`.
    pub fn on(mut self, sql_contains: &str, sets: Vec<ResultSet>) -> Self {
        self.responses.push(Response {
            sql_contains: sql_contains.to_string(),
            param: None,
            sets,
        });
        self
    }

    /// Respond only when one of the bound parameters equals `param`.
    pub fn on_param(mut self, sql_contains: &str, param: &str, sets: Vec<ResultSet>) -> Self {
        self.responses.push(Response {
            sql_contains: sql_contains.to_string(),
            param: Some(param.to_string()),
            sets,
        });
        self
    }

    /// Value written to an OUT/INOUT parameter by `execute_bound`.
    pub fn bound_output(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.bound_outputs.push((name.to_string(), value.into()));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Statements issued whose text contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> Vec<(String, Vec<SqlValue>)> {
        self.calls()
            .into_iter()
            .filter(|(sql, _)| sql.contains(needle))
            .collect()
    }

    fn record(&self, sql: &str, params: Vec<SqlValue>) {
        self.calls.lock().unwrap().push((sql.to_string(), params));
    }

    fn respond(&self, sql: &str, params: &[SqlValue]) -> Vec<ResultSet> {
        self.responses
            .iter()
            .find(|r| {
                sql.contains(&r.sql_contains)
                    && r
                        .param
                        .as_deref()
                        .map_or(true, |p| params.iter().any(|v| v.as_str() == Some(p)))
            })
            .map(|r| r.sets.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn kind(&self) -> DriverKind {
        if self.output_binding {
            DriverKind::Odbc
        } else {
            DriverKind::Tds
        }
    }

    fn supports_output_binding(&self) -> bool {
        self.output_binding
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> mssql_schema::Result<Vec<ResultSet>> {
        self.record(sql, params.to_vec());
        Ok(self.respond(sql, params))
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> mssql_schema::Result<u64> {
        self.record(sql, params.to_vec());
        Ok(0)
    }

    async fn execute_bound(
        &self,
        sql: &str,
        params: &mut [BoundParameter],
    ) -> mssql_schema::Result<Vec<ResultSet>> {
        if !self.output_binding {
            return Err(mssql_schema::SchemaError::query("no output binding", sql));
        }
        self.record(sql, params.iter().map(|p| p.value.clone()).collect());
        for param in params.iter_mut().filter(|p| p.direction.is_output()) {
            if let Some((_, value)) = self.bound_outputs.iter().find(|(n, _)| *n == param.name) {
                param.value = value.clone();
            }
        }
        Ok(self.respond(sql, &[]))
    }
}

pub fn dialect() -> Arc<dyn SchemaDialect> {
    Arc::new(MssqlDialect::new())
}

pub const COLUMN_FIELDS: [&str; 11] = [
    "column_name",
    "type_name",
    "max_length",
    "precision",
    "scale",
    "is_nullable",
    "is_identity",
    "default_definition",
    "is_primary_key",
    "is_unique",
    "is_index",
];

/// One row of the columns query.
pub struct Col {
    pub name: &'static str,
    pub type_name: &'static str,
    pub max_length: i64,
    pub nullable: bool,
    pub identity: bool,
    pub primary_key: bool,
    pub default: Option<&'static str>,
}

impl Col {
    pub fn new(name: &'static str, type_name: &'static str, max_length: i64) -> Self {
        Self {
            name,
            type_name,
            max_length,
            nullable: true,
            identity: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn identity_key(name: &'static str) -> Self {
        Self {
            nullable: false,
            identity: true,
            primary_key: true,
            ..Self::new(name, "int", 4)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, definition: &'static str) -> Self {
        self.default = Some(definition);
        self
    }

    fn row(&self) -> Vec<SqlValue> {
        vec![
            self.name.into(),
            self.type_name.into(),
            self.max_length.into(),
            0i64.into(),
            0i64.into(),
            i64::from(self.nullable).into(),
            i64::from(self.identity).into(),
            self.default.into(),
            i64::from(self.primary_key).into(),
            0i64.into(),
            i64::from(self.primary_key).into(),
        ]
    }
}

pub fn columns(cols: &[Col]) -> ResultSet {
    cols.iter()
        .fold(ResultSet::new(COLUMN_FIELDS), |rs, c| rs.with_row(c.row()))
}

pub fn primary_key(cols: &[&str]) -> ResultSet {
    cols.iter().fold(ResultSet::new(["column_name"]), |rs, c| {
        rs.with_row(vec![(*c).into()])
    })
}

/// `(constraint, table, column, ref_table, ref_column)`, all in `dbo`.
pub fn foreign_keys(rows: &[(&str, &str, &str, &str, &str)]) -> ResultSet {
    rows.iter().fold(
        ResultSet::new([
            "constraint_name",
            "table_schema",
            "table_name",
            "column_name",
            "referenced_table_schema",
            "referenced_table_name",
            "referenced_column_name",
        ]),
        |rs, (constraint, table, column, ref_table, ref_column)| {
            rs.with_row(vec![
                (*constraint).into(),
                "dbo".into(),
                (*table).into(),
                (*column).into(),
                "dbo".into(),
                (*ref_table).into(),
                (*ref_column).into(),
            ])
        },
    )
}

pub fn single(column: &str, value: impl Into<SqlValue>) -> ResultSet {
    ResultSet::new([column]).with_row(vec![value.into()])
}

pub const COLUMNS_SQL: &str = "FROM sys.columns c";
pub const PRIMARY_KEY_SQL: &str = "CONSTRAINT_TYPE = 'PRIMARY KEY'";
pub const FOREIGN_KEYS_SQL: &str = "REFERENTIAL_CONSTRAINTS RC";

/// `users(id, name)` and `posts(id, user_id, title)` with `posts.user_id -> users.id`.
pub fn blog_driver() -> ScriptedDriver {
    let fks = foreign_keys(&[("fk_posts_users", "posts", "user_id", "users", "id")]);
    ScriptedDriver::new()
        .on_param(
            COLUMNS_SQL,
            "[dbo].[users]",
            vec![columns(&[
                Col::identity_key("id"),
                Col::new("name", "nvarchar", 200).not_null(),
                Col::new("active", "bit", 1).default("((1))"),
            ])],
        )
        .on_param(
            COLUMNS_SQL,
            "[dbo].[posts]",
            vec![columns(&[
                Col::identity_key("id"),
                Col::new("user_id", "int", 4).not_null(),
                Col::new("title", "varchar", -1),
            ])],
        )
        .on_param(PRIMARY_KEY_SQL, "users", vec![primary_key(&["id"])])
        .on_param(PRIMARY_KEY_SQL, "posts", vec![primary_key(&["id"])])
        .on(FOREIGN_KEYS_SQL, vec![fks])
}
