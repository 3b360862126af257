//! Pure Rust TDS driver built on tiberius.
//!
//! Has no output-parameter binding, so procedure calls go through the
//! declare-and-select strategy.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{
    AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query, QueryItem,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, DriverKind};
use crate::core::traits::Driver;
use crate::core::value::{ResultSet, SqlValue};
use crate::error::{Result, SchemaError};

/// Maximum TDS packet size (32767 bytes, ~32KB).
#[allow(dead_code)]
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

type TdsClient = Client<Compat<TcpStream>>;

fn build_config(conn: &ConnectionConfig) -> Config {
    let mut config = Config::new();
    config.host(&conn.host);
    config.port(conn.port);
    config.database(&conn.database);
    config.authentication(AuthMethod::sql_server(&conn.user, &conn.password));

    if conn.encrypt {
        if conn.trust_server_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    // NOTE(build): tiberius 0.12 exposes no packet-size setter on `Config`;
    // the requested size cannot be applied. See BUILD_FLAGS.json.
    // config.packet_size(TDS_MAX_PACKET_SIZE);
    config
}

fn io_error(e: std::io::Error, context: &str) -> tiberius::error::Error {
    tiberius::error::Error::Io {
        kind: e.kind(),
        message: format!("{}: {}", context, e),
    }
}

async fn connect_client(config: Config) -> std::result::Result<TdsClient, tiberius::error::Error> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| io_error(e, "TCP connect"))?;
    tcp.set_nodelay(true).ok();

    // Enable TCP keepalives
    let std_tcp = tcp.into_std().map_err(|e| io_error(e, "socket conversion"))?;
    let socket = socket2::Socket::from(std_tcp);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true).ok();
    let tcp = TcpStream::from_std(std_tcp).map_err(|e| io_error(e, "Failed to convert socket"))?;

    Client::connect(config, tcp.compat_write()).await
}

fn bind_value<'a>(query: &mut Query<'a>, value: &SqlValue) {
    match value {
        SqlValue::Null => query.bind(Option::<&str>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Decimal(d) => query.bind(tiberius::numeric::Numeric::new_with_scale(
            d.mantissa(),
            d.scale() as u8,
        )),
        SqlValue::Bytes(b) => query.bind(b.clone()),
        SqlValue::Uuid(u) => query.bind(*u),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
    }
}

fn temporal<T>(data: &ColumnData<'static>, wrap: fn(T) -> SqlValue) -> SqlValue
where
    T: for<'a> FromSql<'a>,
{
    match T::from_sql(data) {
        Ok(Some(v)) => wrap(v),
        _ => SqlValue::Null,
    }
}

/// Convert one TDS cell to a portable value.
fn convert_column(data: ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I64(i64::from(v))).into(),
        ColumnData::I16(v) => v.map(|v| SqlValue::I64(i64::from(v))).into(),
        ColumnData::I32(v) => v.map(|v| SqlValue::I64(i64::from(v))).into(),
        ColumnData::I64(v) => v.map(SqlValue::I64).into(),
        ColumnData::F32(v) => v.map(|v| SqlValue::F64(f64::from(v))).into(),
        ColumnData::F64(v) => v.map(SqlValue::F64).into(),
        ColumnData::Bit(v) => v.map(SqlValue::Bool).into(),
        ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())).into(),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid).into(),
        ColumnData::Binary(v) => v.map(|b| SqlValue::Bytes(b.into_owned())).into(),
        ColumnData::Numeric(v) => v
            .map(|n| SqlValue::Decimal(Decimal::from_i128_with_scale(n.value(), u32::from(n.scale()))))
            .into(),
        ColumnData::Xml(v) => v
            .map(|x| SqlValue::Text(x.into_owned().into_string()))
            .into(),
        data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => temporal::<NaiveDateTime>(&data, SqlValue::DateTime),
        data @ ColumnData::Date(_) => temporal::<NaiveDate>(&data, SqlValue::Date),
        data @ ColumnData::Time(_) => temporal::<NaiveTime>(&data, SqlValue::Time),
        data @ ColumnData::DateTimeOffset(_) => {
            temporal::<DateTime<FixedOffset>>(&data, SqlValue::DateTimeOffset)
        }
    }
}

/// SQL Server driver speaking TDS directly.
pub struct TdsDriver {
    client: Mutex<TdsClient>,
}

impl TdsDriver {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self> {
        let config = build_config(conn);
        let mut client = connect_client(config).await.map_err(|e| {
            SchemaError::connection(e, format!("connecting to {}:{}", conn.host, conn.port))
        })?;
        client.simple_query("SELECT 1").await?.into_row().await?;

        info!(
            "Connected to MSSQL via TDS: {}:{}/{}",
            conn.host, conn.port, conn.database
        );

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    fn build_query<'a>(sql: &'a str, params: &[SqlValue]) -> Query<'a> {
        let mut query = Query::new(sql);
        for value in params {
            bind_value(&mut query, value);
        }
        query
    }
}

#[async_trait]
impl Driver for TdsDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Tds
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<ResultSet>> {
        debug!("TDS query: {}", sql.trim());
        let mut client = self.client.lock().await;
        let query = Self::build_query(sql, params);

        let mut stream = query
            .query(&mut *client)
            .await
            .map_err(|e| SchemaError::query(e, sql))?;

        let mut sets: Vec<ResultSet> = Vec::new();
        while let Some(item) = stream
            .try_next()
            .await
            .map_err(|e| SchemaError::query(e, sql))?
        {
            match item {
                QueryItem::Metadata(meta) => {
                    sets.push(ResultSet::new(meta.columns().iter().map(|c| c.name())));
                }
                QueryItem::Row(row) => {
                    let values: Vec<SqlValue> = row.into_iter().map(convert_column).collect();
                    match sets.last_mut() {
                        Some(current) => current.push_row(values),
                        None => {
                            let mut rs = ResultSet::default();
                            rs.push_row(values);
                            sets.push(rs);
                        }
                    }
                }
            }
        }

        debug!("TDS query returned {} result set(s)", sets.len());
        Ok(sets)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        debug!("TDS execute: {}", sql.trim());
        let mut client = self.client.lock().await;
        let query = Self::build_query(sql, params);
        let result = query
            .execute(&mut *client)
            .await
            .map_err(|e| SchemaError::query(e, sql))?;
        Ok(result.rows_affected().iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_convert_scalars() {
        assert_eq!(convert_column(ColumnData::I32(Some(7))), SqlValue::I64(7));
        assert_eq!(convert_column(ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(convert_column(ColumnData::Bit(Some(true))), SqlValue::Bool(true));
        assert_eq!(
            convert_column(ColumnData::String(Some(Cow::Borrowed("dbo")))),
            SqlValue::Text("dbo".into())
        );
        assert_eq!(
            convert_column(ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            SqlValue::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_build_config_uses_port() {
        let mut conn = ConnectionConfig::new("db.internal", "app");
        conn.port = 14330;
        let config = build_config(&conn);
        assert_eq!(config.get_addr(), "db.internal:14330");
    }
}
