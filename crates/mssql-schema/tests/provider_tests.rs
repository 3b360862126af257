//! SchemaProvider integration tests against a scripted driver.

mod common;

use std::sync::Arc;

use common::*;
use mssql_schema::{
    AbstractType, ColumnSpec, Driver, IntegrityCache, PrimaryKey, RelationKind, ResultSet, RoutineKind,
    SchemaProvider, SqlValue,
};
use pretty_assertions::assert_eq;

fn provider(driver: &Arc<ScriptedDriver>) -> SchemaProvider {
    SchemaProvider::new(driver.clone(), dialect())
}

#[tokio::test]
async fn test_load_table_columns_and_key() {
    let driver = blog_driver().into_arc();
    let users = provider(&driver).load_table("users").await.unwrap();

    assert_eq!(users.raw_name, "[dbo].[users]");
    assert_eq!(users.display_name, "users");
    assert_eq!(
        users.columns.keys().collect::<Vec<_>>(),
        vec!["id", "name", "active"]
    );
    assert_eq!(users.primary_key, PrimaryKey::Single("id".into()));
    assert_eq!(users.sequence_name.as_deref(), Some("[dbo].[users]"));

    let id = users.column("ID").unwrap();
    assert_eq!(id.r#type, AbstractType::Id);
    assert!(id.auto_increment);

    let name = users.column("name").unwrap();
    assert_eq!(name.db_type, "nvarchar(100)");
    assert_eq!(name.size, Some(100));
    assert!(!name.allow_null);

    let active = users.column("active").unwrap();
    assert_eq!(active.r#type, AbstractType::Boolean);
    assert_eq!(active.default_value, Some(SqlValue::Bool(true)));

    users.check_invariants().unwrap();

    let (_, binds) = &driver.calls_matching(COLUMNS_SQL)[0];
    assert_eq!(binds, &vec![SqlValue::Text("[dbo].[users]".into())]);
    let (_, binds) = &driver.calls_matching(PRIMARY_KEY_SQL)[0];
    assert_eq!(binds, &vec![SqlValue::from("dbo"), SqlValue::from("users")]);
}

#[tokio::test]
async fn test_belongs_to_and_has_many_share_columns() {
    let driver = blog_driver().into_arc();
    let provider = provider(&driver);

    let posts = provider.load_table("dbo.posts").await.unwrap();
    let belongs: Vec<_> = posts.relations_of(RelationKind::BelongsTo).collect();
    assert_eq!(belongs.len(), 1);
    assert_eq!(belongs[0].ref_table, "users");
    assert_eq!(belongs[0].field, "user_id");
    assert_eq!(belongs[0].ref_field, "id");

    let user_id = posts.column("user_id").unwrap();
    assert!(user_id.is_foreign_key);
    assert_eq!(user_id.r#type, AbstractType::Reference);
    assert_eq!(posts.foreign_keys["user_id"].ref_table, "users");
    assert_eq!(posts.column("title").unwrap().r#type, AbstractType::Text);

    let users = provider.load_table("users").await.unwrap();
    let has_many: Vec<_> = users.relations_of(RelationKind::HasMany).collect();
    assert_eq!(has_many.len(), 1);
    assert_eq!(has_many[0].ref_table, "posts");
    assert_eq!(has_many[0].field, belongs[0].ref_field);
    assert_eq!(has_many[0].ref_field, belongs[0].field);
}

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let driver = blog_driver().into_arc();
    let err = provider(&driver).load_table("sales.missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("sales.missing"));
}

fn table_rows() -> ResultSet {
    ResultSet::new(["table_schema", "table_name", "table_type"])
        .with_row(vec!["dbo".into(), "Users".into(), "BASE TABLE".into()])
        .with_row(vec!["sales".into(), "Orders".into(), "BASE TABLE".into()])
        .with_row(vec!["dbo".into(), "ActiveUsers".into(), "VIEW".into()])
}

#[tokio::test]
async fn test_find_table_names_keys_and_qualification() {
    let driver = ScriptedDriver::new()
        .on("INFORMATION_SCHEMA.TABLES", vec![table_rows()])
        .into_arc();
    let names = provider(&driver).find_table_names(None, true).await.unwrap();

    assert_eq!(
        names.keys().collect::<Vec<_>>(),
        vec!["users", "sales.orders", "activeusers"]
    );
    assert_eq!(names["users"].name, "Users");
    assert_eq!(names["sales.orders"].name, "sales.Orders");
    assert_eq!(names["sales.orders"].raw_name, "[sales].[Orders]");
    assert!(names["activeusers"].is_view);

    let (sql, binds) = &driver.calls()[0];
    assert!(sql.contains("'VIEW'"));
    assert!(binds.is_empty());
}

#[tokio::test]
async fn test_find_table_names_binds_schema_filter() {
    let driver = ScriptedDriver::new().into_arc();
    provider(&driver)
        .find_table_names(Some("sales"), false)
        .await
        .unwrap();
    let (sql, binds) = &driver.calls()[0];
    assert!(sql.contains("TABLE_SCHEMA = @P1"));
    assert!(!sql.contains("'VIEW'"));
    assert_eq!(binds, &vec![SqlValue::from("sales")]);
}

#[tokio::test]
async fn test_schema_and_routine_listings() {
    let schemas = ResultSet::new(["schema_name"])
        .with_row(vec!["dbo".into()])
        .with_row(vec!["sales".into()]);
    let routines = ResultSet::new(["routine_schema", "routine_name"])
        .with_row(vec!["dbo".into(), "get_totals".into()])
        .with_row(vec!["sales".into(), "close_month".into()]);
    let driver = ScriptedDriver::new()
        .on("FROM sys.schemas", vec![schemas])
        .on("ROUTINE_TYPE = @P1", vec![routines])
        .into_arc();
    let provider = provider(&driver);

    assert_eq!(provider.find_schema_names().await.unwrap(), vec!["dbo", "sales"]);
    assert_eq!(
        provider.find_procedure_names(None).await.unwrap(),
        vec!["get_totals", "sales.close_month"]
    );
    let (_, binds) = driver.calls_matching("ROUTINE_TYPE = @P1").pop().unwrap();
    assert_eq!(binds, vec![SqlValue::from("PROCEDURE")]);

    provider.find_function_names(Some("sales")).await.unwrap();
    let (_, binds) = driver.calls_matching("ROUTINE_TYPE = @P1").pop().unwrap();
    assert_eq!(binds, vec![SqlValue::from("FUNCTION"), SqlValue::from("sales")]);
}

#[tokio::test]
async fn test_load_routine_with_return_type() {
    let routine = ResultSet::new(["routine_schema", "routine_name", "routine_type", "data_type"])
        .with_row(vec!["dbo".into(), "fn_total".into(), "FUNCTION".into(), "money".into()]);
    let params = ResultSet::new([
        "parameter_name",
        "ordinal_position",
        "parameter_mode",
        "is_result",
        "data_type",
        "character_maximum_length",
        "numeric_precision",
        "numeric_scale",
    ])
    .with_row(vec![
        "".into(),
        0i64.into(),
        "OUT".into(),
        "YES".into(),
        "money".into(),
        SqlValue::Null,
        19i64.into(),
        4i64.into(),
    ])
    .with_row(vec![
        "@customer_id".into(),
        1i64.into(),
        "IN".into(),
        "NO".into(),
        "int".into(),
        SqlValue::Null,
        10i64.into(),
        0i64.into(),
    ]);
    let driver = ScriptedDriver::new()
        .on("FROM INFORMATION_SCHEMA.ROUTINES", vec![routine])
        .on("FROM INFORMATION_SCHEMA.PARAMETERS", vec![params])
        .into_arc();

    let f = provider(&driver)
        .load_routine("fn_total", RoutineKind::Function)
        .await
        .unwrap();
    assert_eq!(f.raw_name, "[dbo].[fn_total]");
    assert_eq!(f.return_type.as_deref(), Some("money"));
    assert_eq!(f.params.len(), 1);
    assert_eq!(f.params[0].name, "customer_id");
    assert_eq!(f.params[0].position, 1);
}

#[tokio::test]
async fn test_load_routine_not_found() {
    let driver = ScriptedDriver::new().into_arc();
    let err = provider(&driver)
        .load_routine("nope", RoutineKind::Procedure)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_reset_sequence_from_max_key() {
    let driver = blog_driver()
        .on("SELECT MAX([id]) FROM [dbo].[users]", vec![single("max", 41i64)])
        .into_arc();
    let next = provider(&driver).reset_sequence("users", None).await.unwrap();
    assert_eq!(next, Some(42));
    assert_eq!(
        driver.calls_matching("DBCC CHECKIDENT")[0].0,
        "DBCC CHECKIDENT ('[dbo].[users]', RESEED, 41)"
    );
}

#[tokio::test]
async fn test_reset_sequence_explicit_value() {
    let driver = blog_driver().into_arc();
    let next = provider(&driver).reset_sequence("users", Some(100)).await.unwrap();
    assert_eq!(next, Some(100));
    assert!(driver.calls_matching("SELECT MAX").is_empty());
    assert!(driver.calls_matching("DBCC CHECKIDENT")[0].0.ends_with("RESEED, 99)"));
}

#[tokio::test]
async fn test_reset_sequence_without_identity_is_noop() {
    let driver = ScriptedDriver::new()
        .on(
            COLUMNS_SQL,
            vec![columns(&[Col::new("code", "char", 3).not_null()])],
        )
        .into_arc();
    let next = provider(&driver).reset_sequence("codes", None).await.unwrap();
    assert_eq!(next, None);
    assert!(driver.calls_matching("DBCC").is_empty());
}

/// `codes(code varchar PRIMARY KEY, id int IDENTITY)`.
fn coded_driver(max: SqlValue) -> Arc<ScriptedDriver> {
    ScriptedDriver::new()
        .on(
            COLUMNS_SQL,
            vec![columns(&[
                Col {
                    primary_key: true,
                    ..Col::new("code", "varchar", 10).not_null()
                },
                Col {
                    identity: true,
                    ..Col::new("id", "int", 4).not_null()
                },
            ])],
        )
        .on(PRIMARY_KEY_SQL, vec![primary_key(&["code"])])
        .on("SELECT MAX(", vec![single("max", max)])
        .into_arc()
}

#[tokio::test]
async fn test_reset_sequence_uses_identity_not_key() {
    let driver = coded_driver(SqlValue::I64(17));
    let next = provider(&driver).reset_sequence("codes", None).await.unwrap();

    assert_eq!(next, Some(18));
    assert_eq!(
        driver.calls_matching("SELECT MAX(")[0].0,
        "SELECT MAX([id]) FROM [dbo].[codes]"
    );
    assert_eq!(
        driver.calls_matching("DBCC CHECKIDENT")[0].0,
        "DBCC CHECKIDENT ('[dbo].[codes]', RESEED, 17)"
    );
}

#[tokio::test]
async fn test_reset_sequence_rejects_non_integer_max() {
    let driver = coded_driver("ZZZ".into());
    let err = provider(&driver).reset_sequence("codes", None).await.unwrap_err();

    assert!(err.to_string().contains("not an integer"));
    assert!(driver.calls_matching("DBCC").is_empty());
}

#[tokio::test]
async fn test_reset_sequence_of_empty_table_starts_at_one() {
    let driver = coded_driver(SqlValue::Null);
    let next = provider(&driver).reset_sequence("codes", None).await.unwrap();
    assert_eq!(next, Some(1));
    assert!(driver.calls_matching("DBCC CHECKIDENT")[0].0.ends_with("RESEED, 0)"));
}

#[tokio::test]
async fn test_reset_sequence_overflow_is_an_error() {
    let driver = coded_driver(SqlValue::I64(i64::MAX));
    let err = provider(&driver).reset_sequence("codes", None).await.unwrap_err();
    assert!(err.to_string().contains("exhausted"));

    let err = provider(&driver)
        .reset_sequence("codes", Some(i64::MIN))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot reseed"));
    assert!(driver.calls_matching("DBCC").is_empty());
}

#[tokio::test]
async fn test_last_insert_id_without_sequence_uses_scope_identity() {
    let driver = ScriptedDriver::new()
        .on("SCOPE_IDENTITY()", vec![single("id", 5i64)])
        .into_arc();

    assert_eq!(driver.last_insert_id(None).await.unwrap(), Some(SqlValue::I64(5)));
    assert_eq!(driver.last_insert_id(Some("")).await.unwrap(), Some(SqlValue::I64(5)));

    let calls = driver.calls();
    assert_eq!(calls.len(), 2);
    for (sql, binds) in &calls {
        assert_eq!(sql, "SELECT CAST(SCOPE_IDENTITY() AS bigint)");
        assert!(binds.is_empty());
    }
}

#[tokio::test]
async fn test_last_insert_id_with_sequence_uses_ident_current() {
    let driver = ScriptedDriver::new()
        .on("SCOPE_IDENTITY()", vec![single("id", 5i64)])
        .on("IDENT_CURRENT(@P1)", vec![single("id", 12i64)])
        .into_arc();

    let id = driver.last_insert_id(Some("[dbo].[users]")).await.unwrap();
    assert_eq!(id, Some(SqlValue::I64(12)));
    assert_eq!(
        driver.calls(),
        vec![(
            "SELECT CAST(IDENT_CURRENT(@P1) AS bigint)".to_string(),
            vec![SqlValue::Text("[dbo].[users]".into())]
        )]
    );
}

#[tokio::test]
async fn test_check_integrity_caches_table_list() {
    let driver = ScriptedDriver::new()
        .on("INFORMATION_SCHEMA.TABLES", vec![table_rows()])
        .into_arc();
    let provider = provider(&driver);
    let mut cache = IntegrityCache::new();

    let n = provider.check_integrity(false, None, &mut cache).await.unwrap();
    assert_eq!(n, 2);
    provider.check_integrity(true, None, &mut cache).await.unwrap();

    assert_eq!(driver.calls_matching("INFORMATION_SCHEMA.TABLES").len(), 1);
    let toggles: Vec<String> = driver
        .calls_matching("CONSTRAINT ALL")
        .into_iter()
        .map(|(sql, _)| sql)
        .collect();
    assert_eq!(
        toggles,
        vec![
            "ALTER TABLE [dbo].[Users] NOCHECK CONSTRAINT ALL",
            "ALTER TABLE [sales].[Orders] NOCHECK CONSTRAINT ALL",
            "ALTER TABLE [dbo].[Users] CHECK CONSTRAINT ALL",
            "ALTER TABLE [sales].[Orders] CHECK CONSTRAINT ALL",
        ]
    );
}

#[tokio::test]
async fn test_check_integrity_none_spans_all_schemas() {
    let dbo_only = ResultSet::new(["table_schema", "table_name", "table_type"])
        .with_row(vec!["dbo".into(), "Users".into(), "BASE TABLE".into()]);
    let driver = ScriptedDriver::new()
        .on_param("INFORMATION_SCHEMA.TABLES", "dbo", vec![dbo_only])
        .on("INFORMATION_SCHEMA.TABLES", vec![table_rows()])
        .into_arc();
    let provider = provider(&driver);
    let mut cache = IntegrityCache::new();

    assert_eq!(provider.check_integrity(false, Some("dbo"), &mut cache).await.unwrap(), 1);
    assert_eq!(provider.check_integrity(false, None, &mut cache).await.unwrap(), 2);

    let lookups = driver.calls_matching("INFORMATION_SCHEMA.TABLES");
    assert_eq!(lookups[0].1, vec![SqlValue::from("dbo")]);
    assert!(lookups[1].1.is_empty());
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_ddl_is_executed() {
    let driver = ScriptedDriver::new().into_arc();
    let provider = provider(&driver);

    let sql = provider
        .create_table(
            "dbo.tags",
            &[ColumnSpec::new("id", "pk"), ColumnSpec::new("label", "string").not_null()],
        )
        .await
        .unwrap();
    assert!(sql.starts_with("CREATE TABLE [dbo].[tags]"));

    provider.rename_table("dbo.tags", "labels").await.unwrap();
    provider
        .alter_column("dbo.labels", "label", &ColumnSpec::new("label", "string").with_length(80))
        .await
        .unwrap();

    let executed: Vec<String> = driver.calls().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed[1], "EXEC sp_rename N'[dbo].[tags]', N'labels'");
    assert_eq!(
        executed[2],
        "ALTER TABLE [dbo].[labels] ALTER COLUMN [label] varchar(80) NULL"
    );
}

#[test]
fn test_compare_table_names() {
    assert!(mssql_schema::compare_table_names("[dbo].[Foo]", "dbo.foo"));
    assert!(!mssql_schema::compare_table_names("[Foo]", "[Bar]"));
}
