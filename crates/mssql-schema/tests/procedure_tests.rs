//! ProcedureInvoker tests for both call strategies.

mod common;

use common::*;
use mssql_schema::{
    CallResult, FunctionReturn, ProcedureInvoker, ProcedureParam, ResultSet, SqlValue,
};
use pretty_assertions::assert_eq;

fn invoker(driver: &std::sync::Arc<ScriptedDriver>) -> ProcedureInvoker {
    ProcedureInvoker::new(driver.clone(), dialect())
}

fn orders() -> ResultSet {
    ResultSet::new(["order_id", "amount"])
        .with_row(vec![1i64.into(), "9.50".into()])
        .with_row(vec![2i64.into(), "12.00".into()])
}

#[tokio::test]
async fn test_declared_call_recovers_out_params() {
    let driver = ScriptedDriver::new()
        .on(
            "EXEC [dbo].[get_totals]",
            vec![single("total", "21.50"), single("count", 2i64)],
        )
        .into_arc();
    let invoker = invoker(&driver);
    assert!(!invoker.uses_native_binding());

    let mut params = vec![
        ProcedureParam::input("customer_id", "int", 7i64),
        ProcedureParam::output("total", "money"),
        ProcedureParam::output("count", "int"),
    ];
    let result = invoker.call("dbo.get_totals", &mut params).await.unwrap();

    assert_eq!(result, CallResult::Single(ResultSet::default()));
    assert_eq!(params[1].value, SqlValue::from("21.50"));
    assert_eq!(params[2].value, SqlValue::I64(2));

    let (sql, binds) = &driver.calls()[0];
    assert!(sql.starts_with("SET NOCOUNT ON;"));
    assert!(sql.contains("EXEC [dbo].[get_totals] @P1, @total = @out_1 OUTPUT"));
    assert_eq!(binds, &vec![SqlValue::I64(7)]);
}

#[tokio::test]
async fn test_declared_call_skips_inout_echo() {
    let driver = ScriptedDriver::new()
        .on(
            "EXEC [dbo].[bump]",
            vec![single("counter", 5i64), orders(), single("counter", 6i64)],
        )
        .into_arc();

    let mut params = vec![ProcedureParam::in_out("counter", "int", 5i64)];
    let result = invoker(&driver).call("dbo.bump", &mut params).await.unwrap();

    assert_eq!(result, CallResult::Single(orders()));
    assert_eq!(params[0].value, SqlValue::I64(6));
}

#[tokio::test]
async fn test_declared_call_prefers_trailing_output_set() {
    let driver = ScriptedDriver::new()
        .on(
            "EXEC [dbo].[get_totals]",
            vec![single("total", 99i64), single("total", 7i64)],
        )
        .into_arc();

    let mut params = vec![ProcedureParam::output("total", "int")];
    let result = invoker(&driver).call("dbo.get_totals", &mut params).await.unwrap();

    assert_eq!(params[0].value, SqlValue::I64(7));
    assert_eq!(result, CallResult::Single(single("total", 99i64)));
}

#[tokio::test]
async fn test_multiple_result_sets() {
    let summary = single("rows", 2i64);
    let driver = ScriptedDriver::new()
        .on("EXEC [dbo].[report]", vec![orders(), summary.clone()])
        .into_arc();

    let result = invoker(&driver).call("dbo.report", &mut []).await.unwrap();
    assert!(!result.is_single());
    assert_eq!(result.into_sets(), vec![orders(), summary]);
    assert_eq!(driver.calls()[0].0, "SET NOCOUNT ON;\nEXEC [dbo].[report];");
}

#[tokio::test]
async fn test_output_set_missing_leaves_value() {
    let driver = ScriptedDriver::new()
        .on("EXEC [dbo].[get_totals]", vec![orders()])
        .into_arc();

    let mut params = vec![ProcedureParam::output("total", "money")];
    let result = invoker(&driver).call("dbo.get_totals", &mut params).await.unwrap();

    assert_eq!(result, CallResult::Single(orders()));
    assert!(params[0].value.is_null());
}

#[tokio::test]
async fn test_native_call_binds_outputs() {
    let driver = ScriptedDriver::new()
        .with_output_binding()
        .bound_output("total", "21.50")
        .on("EXEC [dbo].[get_totals]", vec![orders()])
        .into_arc();
    let invoker = invoker(&driver);
    assert!(invoker.uses_native_binding());

    let mut params = vec![
        ProcedureParam::input("customer_id", "int", 7i64),
        ProcedureParam::output("total", "money"),
    ];
    let result = invoker.call("dbo.get_totals", &mut params).await.unwrap();

    assert_eq!(result, CallResult::Single(orders()));
    assert_eq!(params[1].value, SqlValue::from("21.50"));
    assert_eq!(
        driver.calls()[0].0,
        "EXEC [dbo].[get_totals] @P1, @total = @P2 OUTPUT"
    );
}

#[tokio::test]
async fn test_scalar_and_table_functions() {
    let driver = ScriptedDriver::new()
        .on("AS [value]", vec![single("value", 42i64)])
        .on("SELECT * FROM", vec![orders()])
        .into_arc();
    let invoker = invoker(&driver);
    let args = vec![ProcedureParam::input("a", "int", 40i64), ProcedureParam::input("b", "int", 2i64)];

    let scalar = invoker
        .call_function("dbo.add", &args, FunctionReturn::Scalar)
        .await
        .unwrap();
    assert_eq!(scalar, CallResult::Single(single("value", 42i64)));

    let table = invoker
        .call_function("dbo.orders_for", &args[..1], FunctionReturn::Table)
        .await
        .unwrap();
    assert_eq!(table, CallResult::Single(orders()));

    let calls = driver.calls();
    assert_eq!(calls[0].0, "SELECT [dbo].[add](@P1, @P2) AS [value]");
    assert_eq!(calls[0].1, vec![SqlValue::I64(40), SqlValue::I64(2)]);
    assert_eq!(calls[1].0, "SELECT * FROM [dbo].[orders_for](@P1)");
}

#[tokio::test]
async fn test_function_rejects_output_params() {
    let driver = ScriptedDriver::new().into_arc();
    let err = invoker(&driver)
        .call_function(
            "dbo.add",
            &[ProcedureParam::output("sum", "int")],
            FunctionReturn::Scalar,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("sum"));
    assert!(driver.calls().is_empty());
}
