//! ODBC driver for SQL Server.
//!
//! Serves both ODBC-based driver kinds:
//!
//! - `Odbc`: Microsoft ODBC Driver for SQL Server, supports binding
//!   OUT/INOUT parameters.
//! - `FreeTds`: FreeTDS ODBC driver, no output binding.
//!
//! SQL is written with `@P1..@Pn` markers and rewritten to positional `?`
//! before execution. ODBC calls are blocking and run under the connection
//! mutex; no ODBC handle is held across an await point.
//!
//! Natively bound calls bind IN values as plain inputs and give each
//! OUT/INOUT parameter a buffer typed from its declared SQL type.

use std::sync::{LazyLock, OnceLock};

use async_trait::async_trait;
use odbc_api::buffers::Indicator;
use odbc_api::handles::Statement;
use odbc_api::parameter::{CElement, InputParameter, VarCharBox};
use odbc_api::sys::ParamType;
use odbc_api::{
    Bit, Connection, ConnectionOptions, Cursor, DataType, Environment, IntoParameter, Nullable,
    ParameterCollection,
};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{ConnectionConfig, DriverKind};
use crate::core::schema::ParamDirection;
use crate::core::spec::AbstractType;
use crate::core::traits::{BoundParameter, Driver, TypeTranslator};
use crate::core::value::{ResultSet, SqlValue};
use crate::dialect::MssqlTypeTranslator;
use crate::error::{Result, SchemaError};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@P(\d+)\b").unwrap_or_else(|_| unreachable!("placeholder pattern is valid"))
});

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Process-wide ODBC environment.
pub fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        SchemaError::MissingDependency(format!(
            "Failed to create ODBC environment: {}. Make sure an ODBC driver manager is installed.",
            e
        ))
    })?;
    // A concurrent initializer may win; its environment is equivalent.
    let _ = ENVIRONMENT.set(env);
    ENVIRONMENT
        .get()
        .ok_or_else(|| SchemaError::MissingDependency("ODBC environment unavailable".into()))
}

/// Rewrite `@Pn` markers to `?`, returning the 1-based parameter index of
/// each marker in order of appearance.
pub fn rewrite_placeholders(sql: &str) -> (String, Vec<usize>) {
    let mut order = Vec::new();
    let rewritten = PLACEHOLDER.replace_all(sql, |caps: &regex::Captures<'_>| {
        if let Ok(n) = caps[1].parse::<usize>() {
            order.push(n);
        }
        "?"
    });
    (rewritten.into_owned(), order)
}

/// Arrange values in marker order, duplicating repeated markers.
pub fn order_params<T: Clone>(sql: &str, order: &[usize], params: &[T]) -> Result<Vec<T>> {
    order
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|i| params.get(i))
                .cloned()
                .ok_or_else(|| {
                    SchemaError::query(
                        format!("placeholder @P{} has no bound value ({} given)", n, params.len()),
                        sql,
                    )
                })
        })
        .collect()
}

fn to_input(value: &SqlValue) -> Box<dyn InputParameter> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None.into_parameter()),
        SqlValue::Bool(b) => Box::new(Bit::from_bool(*b)),
        SqlValue::I64(v) => Box::new(*v),
        SqlValue::F64(v) => Box::new(*v),
        SqlValue::Bytes(b) => Box::new(b.clone().into_parameter()),
        other => Box::new(other.to_string().into_parameter()),
    }
}

/// Type a text value returned by the driver.
fn typed_from_text(text: String, r#type: AbstractType) -> SqlValue {
    match r#type {
        AbstractType::Integer | AbstractType::Bigint | AbstractType::Id | AbstractType::Reference => {
            text.trim().parse().map(SqlValue::I64).unwrap_or(SqlValue::Text(text))
        }
        AbstractType::Float | AbstractType::Double => {
            text.trim().parse().map(SqlValue::F64).unwrap_or(SqlValue::Text(text))
        }
        AbstractType::Decimal | AbstractType::Money => Decimal::from_str(text.trim())
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Text(text)),
        AbstractType::Boolean => match text.trim() {
            "1" => SqlValue::Bool(true),
            "0" => SqlValue::Bool(false),
            _ => SqlValue::Text(text),
        },
        _ => SqlValue::Text(text),
    }
}

#[derive(Debug, Clone, Copy)]
enum CellKind {
    Integer,
    Float,
    Decimal,
    Bit,
    Binary,
    Text,
}

impl From<DataType> for CellKind {
    fn from(dt: DataType) -> Self {
        match dt {
            DataType::Integer | DataType::SmallInt | DataType::BigInt | DataType::TinyInt => {
                CellKind::Integer
            }
            DataType::Real | DataType::Float { .. } | DataType::Double => CellKind::Float,
            DataType::Decimal { .. } | DataType::Numeric { .. } => CellKind::Decimal,
            DataType::Bit => CellKind::Bit,
            DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
                CellKind::Binary
            }
            _ => CellKind::Text,
        }
    }
}

impl CellKind {
    fn abstract_type(self) -> AbstractType {
        match self {
            CellKind::Integer => AbstractType::Bigint,
            CellKind::Float => AbstractType::Double,
            CellKind::Decimal => AbstractType::Decimal,
            CellKind::Bit => AbstractType::Boolean,
            CellKind::Binary => AbstractType::Binary,
            CellKind::Text => AbstractType::Text,
        }
    }
}

fn odbc_err(e: odbc_api::Error, sql: &str) -> SchemaError {
    SchemaError::query(e, sql)
}

/// Drain every result set of an executed statement.
fn collect_result_sets<C: Cursor>(cursor: Option<C>, sql: &str) -> Result<Vec<ResultSet>> {
    let mut sets = Vec::new();
    let mut next = cursor;

    while let Some(mut cursor) = next {
        let num_cols = cursor.num_result_cols().map_err(|e| odbc_err(e, sql))?.max(0) as u16;
        if num_cols > 0 {
            let mut columns = Vec::with_capacity(num_cols as usize);
            let mut kinds = Vec::with_capacity(num_cols as usize);
            for col in 1..=num_cols {
                columns.push(cursor.col_name(col).map_err(|e| odbc_err(e, sql))?);
                kinds.push(CellKind::from(
                    cursor.col_data_type(col).map_err(|e| odbc_err(e, sql))?,
                ));
            }

            let mut rs = ResultSet::new(columns);
            let mut buf = Vec::new();
            while let Some(mut row) = cursor.next_row().map_err(|e| odbc_err(e, sql))? {
                let mut values = Vec::with_capacity(kinds.len());
                for (idx, kind) in kinds.iter().enumerate() {
                    let col = (idx + 1) as u16;
                    buf.clear();
                    let present = match kind {
                        CellKind::Binary => row.get_binary(col, &mut buf),
                        _ => row.get_text(col, &mut buf),
                    }
                    .map_err(|e| odbc_err(e, sql))?;

                    let value = if !present {
                        SqlValue::Null
                    } else if let CellKind::Binary = kind {
                        SqlValue::Bytes(buf.clone())
                    } else {
                        let text = String::from_utf8_lossy(&buf).into_owned();
                        typed_from_text(text, kind.abstract_type())
                    };
                    values.push(value);
                }
                rs.push_row(values);
            }
            sets.push(rs);
        }
        next = cursor.more_results().map_err(|e| odbc_err(e, sql))?;
    }

    Ok(sets)
}

/// Typed buffer for one OUT/INOUT parameter.
enum OutputBuffer {
    Integer(Nullable<i64>),
    Float(Nullable<f64>),
    Bit(Nullable<Bit>),
    Text(VarCharBox),
}

// odbc-api buffers do not implement `Debug`; tests need it for `unwrap_err`.
#[cfg(test)]
impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputBuffer::Integer(_) => "OutputBuffer::Integer",
            OutputBuffer::Float(_) => "OutputBuffer::Float",
            OutputBuffer::Bit(_) => "OutputBuffer::Bit",
            OutputBuffer::Text(_) => "OutputBuffer::Text",
        })
    }
}

impl OutputBuffer {
    /// Buffer for `param`, seeded with its value.
    fn for_param(param: &BoundParameter, r#type: AbstractType) -> Result<Self> {
        let value = &param.value;
        let seed_err = || {
            SchemaError::Config(format!(
                "value of parameter '{}' does not fit {}",
                param.name, param.sql_type
            ))
        };
        Ok(match r#type {
            AbstractType::Integer | AbstractType::Bigint | AbstractType::Id | AbstractType::Reference => {
                OutputBuffer::Integer(match value {
                    SqlValue::Null => Nullable::null(),
                    v => Nullable::new(v.as_i64().ok_or_else(seed_err)?),
                })
            }
            AbstractType::Float | AbstractType::Double => OutputBuffer::Float(match value {
                SqlValue::Null => Nullable::null(),
                SqlValue::F64(f) => Nullable::new(*f),
                v => Nullable::new(v.as_i64().ok_or_else(seed_err)? as f64),
            }),
            AbstractType::Boolean => OutputBuffer::Bit(match value {
                SqlValue::Null => Nullable::null(),
                v => Nullable::new(Bit::from_bool(v.as_bool().ok_or_else(seed_err)?)),
            }),
            _ => {
                let text = value.to_text();
                let len = text.as_ref().map_or(0, String::len);
                if len > param.buffer_len {
                    return Err(SchemaError::Config(format!(
                        "value of parameter '{}' exceeds {} bytes",
                        param.name, param.buffer_len
                    )));
                }
                // One extra byte for the terminating nul the driver writes
                let mut buffer = vec![0u8; param.buffer_len.max(1) + 1];
                let indicator = match text {
                    None => Indicator::Null,
                    Some(text) => {
                        buffer[..len].copy_from_slice(text.as_bytes());
                        Indicator::Length(len)
                    }
                };
                OutputBuffer::Text(VarCharBox::from_buffer(buffer.into_boxed_slice(), indicator))
            }
        })
    }

    fn into_value(self, r#type: AbstractType) -> SqlValue {
        match self {
            OutputBuffer::Integer(v) => v.into_opt().map_or(SqlValue::Null, SqlValue::I64),
            OutputBuffer::Float(v) => v.into_opt().map_or(SqlValue::Null, SqlValue::F64),
            OutputBuffer::Bit(v) => v
                .into_opt()
                .map_or(SqlValue::Null, |b| SqlValue::Bool(b.0 != 0)),
            OutputBuffer::Text(v) => match v.as_bytes() {
                None => SqlValue::Null,
                Some(bytes) => {
                    typed_from_text(String::from_utf8_lossy(bytes).into_owned(), r#type)
                }
            },
        }
    }
}

/// One `?` marker of a natively bound call.
enum Slot {
    Input(Box<dyn InputParameter>),
    Output {
        param_type: ParamType,
        buffer: OutputBuffer,
    },
}

/// Heterogeneous parameter list bound in marker order.
struct BoundSlots(Vec<Slot>);

// Every bound pointer targets a buffer owned by `self`, and the collection
// outlives the statement execution borrowing it mutably.
unsafe impl ParameterCollection for BoundSlots {
    fn parameter_set_size(&self) -> usize {
        1
    }

    unsafe fn bind_parameters_to(
        &mut self,
        stmt: &mut impl Statement,
    ) -> std::result::Result<(), odbc_api::Error> {
        for (idx, slot) in self.0.iter_mut().enumerate() {
            let number = idx as u16 + 1;
            let bound = match slot {
                Slot::Input(value) => {
                    value.assert_completness();
                    unsafe { stmt.bind_input_parameter(number, &**value) }
                }
                Slot::Output { param_type, buffer } => unsafe {
                    match buffer {
                        OutputBuffer::Integer(v) => stmt.bind_parameter(number, *param_type, v),
                        OutputBuffer::Float(v) => stmt.bind_parameter(number, *param_type, v),
                        OutputBuffer::Bit(v) => stmt.bind_parameter(number, *param_type, v),
                        OutputBuffer::Text(v) => stmt.bind_parameter(number, *param_type, v),
                    }
                },
            };
            bound.into_result(stmt)?;
        }
        Ok(())
    }
}

/// SQL Server driver over ODBC.
pub struct OdbcDriver {
    conn: Mutex<Connection<'static>>,
    kind: DriverKind,
}

impl OdbcDriver {
    /// Connect with the resolved ODBC-based driver kind.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let kind = config.driver.resolve();
        if !kind.uses_odbc() {
            return Err(SchemaError::Config(format!(
                "driver '{}' is not an ODBC driver",
                kind
            )));
        }

        let env = environment()?;
        let connection_string = config.odbc_connection_string();
        debug!(
            "ODBC connection string: {}",
            config.redacted_odbc_connection_string()
        );

        let conn = env
            .connect_with_connection_string(&connection_string, ConnectionOptions::default())
            .map_err(|e| {
                SchemaError::connection(
                    format!("Failed to connect to MSSQL via ODBC ({}): {}", kind, e),
                    format!("connecting to {}:{}", config.host, config.port),
                )
            })?;

        // Verify connection with a simple query
        conn.execute("SELECT 1", ())
            .map_err(|e| odbc_err(e, "SELECT 1"))?;

        info!(
            "Connected to MSSQL via ODBC ({}): {}:{}/{}",
            kind, config.host, config.port, config.database
        );

        Ok(Self {
            conn: Mutex::new(conn),
            kind,
        })
    }

    fn run(conn: &Connection<'static>, sql: &str, params: &[SqlValue]) -> Result<Vec<ResultSet>> {
        let (rewritten, order) = rewrite_placeholders(sql);
        let ordered = order_params(sql, &order, params)?;
        let inputs: Vec<Box<dyn InputParameter>> = ordered.iter().map(to_input).collect();
        let cursor = conn
            .execute(&rewritten, inputs.as_slice())
            .map_err(|e| odbc_err(e, sql))?;
        collect_result_sets(cursor, sql)
    }
}

#[async_trait]
impl Driver for OdbcDriver {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn supports_output_binding(&self) -> bool {
        self.kind == DriverKind::Odbc
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<ResultSet>> {
        debug!("ODBC query: {}", sql.trim());
        let conn = self.conn.lock().await;
        let sets = Self::run(&conn, sql, params)?;
        debug!("ODBC query returned {} result set(s)", sets.len());
        Ok(sets)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        debug!("ODBC execute: {}", sql.trim());
        let conn = self.conn.lock().await;
        // Parameter boxes are not Send; build them after the last await
        let (rewritten, order) = rewrite_placeholders(sql);
        let ordered = order_params(sql, &order, params)?;
        let inputs: Vec<Box<dyn InputParameter>> = ordered.iter().map(to_input).collect();

        let mut stmt = conn.preallocate().map_err(|e| odbc_err(e, sql))?;
        let cursor = stmt
            .execute(&rewritten, inputs.as_slice())
            .map_err(|e| odbc_err(e, sql))?;
        collect_result_sets(cursor, sql)?;
        let count = stmt.row_count().map_err(|e| odbc_err(e, sql))?;
        Ok(count.unwrap_or(0) as u64)
    }

    async fn execute_bound(
        &self,
        sql: &str,
        params: &mut [BoundParameter],
    ) -> Result<Vec<ResultSet>> {
        if !self.supports_output_binding() {
            return Err(SchemaError::query(
                format!("{} driver does not support output parameter binding", self.kind),
                sql,
            ));
        }

        debug!("ODBC bound execute: {}", sql.trim());
        let conn = self.conn.lock().await;
        let (rewritten, order) = rewrite_placeholders(sql);
        let indices: Vec<usize> = (0..params.len()).collect();
        let slot_params = order_params(sql, &order, &indices)?;
        if slot_params.len() > usize::from(u16::MAX) {
            return Err(SchemaError::query(
                format!("{} parameters exceed the ODBC limit", slot_params.len()),
                sql,
            ));
        }

        let translator = MssqlTypeTranslator::new();
        let types: Vec<AbstractType> = params
            .iter()
            .map(|p| translator.to_abstract_type(&p.sql_type, None))
            .collect();

        let mut slots = Vec::with_capacity(slot_params.len());
        for &i in &slot_params {
            let param = &params[i];
            let slot = match param.direction {
                ParamDirection::In => Slot::Input(to_input(&param.value)),
                ParamDirection::Out => Slot::Output {
                    param_type: ParamType::Output,
                    buffer: OutputBuffer::for_param(param, types[i])?,
                },
                ParamDirection::InOut => Slot::Output {
                    param_type: ParamType::InputOutput,
                    buffer: OutputBuffer::for_param(param, types[i])?,
                },
            };
            slots.push(slot);
        }
        let mut slots = BoundSlots(slots);

        let sets = {
            let cursor = conn
                .execute(&rewritten, &mut slots)
                .map_err(|e| odbc_err(e, sql))?;
            collect_result_sets(cursor, sql)?
        };

        for (slot, &i) in slots.0.into_iter().zip(&slot_params) {
            if let Slot::Output { buffer, .. } = slot {
                params[i].value = buffer.into_value(types[i]);
            }
        }

        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_placeholders() {
        let (sql, order) = rewrite_placeholders(
            "SELECT * FROM t WHERE a = @P2 AND b = @P1 OR c = @P2 AND d = @P10",
        );
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ? OR c = ? AND d = ?");
        assert_eq!(order, vec![2, 1, 2, 10]);
    }

    #[test]
    fn test_rewrite_ignores_named_variables() {
        let (sql, order) = rewrite_placeholders("EXEC p @Param1 = @P1, @Pid = 3");
        assert_eq!(sql, "EXEC p @Param1 = ?, @Pid = 3");
        assert_eq!(order, vec![1]);
    }

    #[test]
    fn test_order_params_duplicates_values() {
        let ordered = order_params("q", &[2, 1, 2], &["a", "b"]).unwrap();
        assert_eq!(ordered, vec!["b", "a", "b"]);
        assert!(order_params("q", &[3], &["a"]).is_err());
        assert!(order_params("q", &[0], &["a"]).is_err());
    }

    fn bound(direction: ParamDirection, sql_type: &str, value: SqlValue) -> BoundParameter {
        BoundParameter {
            name: "p".into(),
            direction,
            sql_type: sql_type.into(),
            buffer_len: 8,
            value,
        }
    }

    #[test]
    fn test_output_buffer_follows_declared_type() {
        let int = bound(ParamDirection::InOut, "int", SqlValue::I64(5));
        let buffer = OutputBuffer::for_param(&int, AbstractType::Integer).unwrap();
        assert!(matches!(buffer, OutputBuffer::Integer(_)));
        assert_eq!(buffer.into_value(AbstractType::Integer), SqlValue::I64(5));

        let flag = bound(ParamDirection::Out, "bit", SqlValue::Null);
        let buffer = OutputBuffer::for_param(&flag, AbstractType::Boolean).unwrap();
        assert_eq!(buffer.into_value(AbstractType::Boolean), SqlValue::Null);

        let money = bound(ParamDirection::InOut, "money", "1.50".into());
        let buffer = OutputBuffer::for_param(&money, AbstractType::Money).unwrap();
        assert!(matches!(buffer, OutputBuffer::Text(_)));
        assert_eq!(
            buffer.into_value(AbstractType::Money),
            SqlValue::Decimal(Decimal::new(150, 2))
        );
    }

    #[test]
    fn test_output_buffer_rejects_oversized_seed() {
        let name = bound(ParamDirection::InOut, "varchar(8)", "far too long".into());
        let err = OutputBuffer::for_param(&name, AbstractType::String).unwrap_err();
        assert!(err.to_string().contains("exceeds 8 bytes"));

        let count = bound(ParamDirection::InOut, "int", "many".into());
        assert!(OutputBuffer::for_param(&count, AbstractType::Integer).is_err());
    }

    #[test]
    fn test_typed_from_text() {
        assert_eq!(
            typed_from_text("42".into(), AbstractType::Integer),
            SqlValue::I64(42)
        );
        assert_eq!(
            typed_from_text("1".into(), AbstractType::Boolean),
            SqlValue::Bool(true)
        );
        assert_eq!(
            typed_from_text("n/a".into(), AbstractType::Integer),
            SqlValue::Text("n/a".into())
        );
        assert_eq!(
            typed_from_text("1.50".into(), AbstractType::Decimal),
            SqlValue::Decimal(Decimal::new(150, 2))
        );
    }
}
