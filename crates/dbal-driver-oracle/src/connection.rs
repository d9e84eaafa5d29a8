//! Oracle connection implementation

use async_trait::async_trait;
use dbal_core::{
    ColumnMeta, Connection, DbalError, QueryResult, Result, Row, StatementResult, Value,
};
use oracle::sql_type::{OracleType, ToSql};
use parking_lot::Mutex;
use std::sync::Arc;

/// Oracle connection wrapper.
///
/// The `oracle` client is blocking, so every call runs on tokio's blocking
/// pool while holding the connection lock. `None` marks a closed connection.
pub struct OracleConnection {
    conn: Arc<Mutex<Option<oracle::Connection>>>,
    connect_string: String,
}

impl OracleConnection {
    /// Open a connection. This blocks until the server answers; async
    /// callers go through `OracleDriver::connect`.
    pub fn open(username: &str, password: &str, connect_string: &str) -> Result<Self> {
        tracing::info!(connect_string = %connect_string, username = %username, "opening Oracle connection");

        let mut conn = oracle::Connection::connect(username, password, connect_string)
            .map_err(|e| {
                DbalError::Connection(format!(
                    "Failed to connect to Oracle at '{}' as '{}': {}",
                    connect_string, username, e
                ))
            })?;
        conn.set_autocommit(true);

        tracing::info!(connect_string = %connect_string, "Oracle connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            connect_string: connect_string.to_string(),
        })
    }

    /// The Easy Connect string or TNS alias this connection was opened with
    pub fn connect_string(&self) -> &str {
        &self.connect_string
    }

    /// Run `f` against the open connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&oracle::Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| DbalError::Connection("connection is closed".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| DbalError::Driver(format!("Oracle worker task failed: {}", e)))?
    }
}

#[async_trait]
impl Connection for OracleConnection {
    fn driver_name(&self) -> &str {
        "oracle"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("oracle")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let sql = sql.to_string();
        let params = params.to_vec();

        let affected_rows = self
            .with_conn(move |conn| {
                let bound = bind_values(&params);
                let refs: Vec<&dyn ToSql> = bound.iter().map(|b| b.as_ref()).collect();

                let stmt = conn
                    .execute(&sql, &refs)
                    .map_err(|e| DbalError::Execution(format!("Failed to execute statement: {}", e)))?;
                // DDL and PL/SQL blocks report no row count
                Ok(stmt.row_count().unwrap_or(0))
            })
            .await?;

        tracing::debug!(affected_rows = affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let sql = sql.to_string();
        let params = params.to_vec();

        let (columns, rows) = self
            .with_conn(move |conn| {
                let bound = bind_values(&params);
                let refs: Vec<&dyn ToSql> = bound.iter().map(|b| b.as_ref()).collect();

                let result_set = conn
                    .query(&sql, &refs)
                    .map_err(|e| DbalError::Execution(format!("Failed to execute query: {}", e)))?;

                let columns: Vec<ColumnMeta> = result_set
                    .column_info()
                    .iter()
                    .enumerate()
                    .map(|(ordinal, col)| ColumnMeta {
                        name: col.name().to_string(),
                        data_type: col.oracle_type().to_string(),
                        nullable: col.nullable(),
                        ordinal,
                    })
                    .collect();
                let types: Vec<OracleType> = result_set
                    .column_info()
                    .iter()
                    .map(|col| col.oracle_type().clone())
                    .collect();
                let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

                let mut rows = Vec::new();
                for row_result in result_set {
                    let row = row_result
                        .map_err(|e| DbalError::Execution(format!("Failed to fetch row: {}", e)))?;
                    let mut values = Vec::with_capacity(types.len());
                    for (idx, oracle_type) in types.iter().enumerate() {
                        values.push(oracle_to_value(&row, idx, oracle_type)?);
                    }
                    rows.push(Row::new(names.clone(), values));
                }

                Ok((columns, rows))
            })
            .await?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || match conn.lock().take() {
            Some(conn) => conn
                .close()
                .map(|_| true)
                .map_err(|e| DbalError::Connection(format!("Failed to close connection: {}", e))),
            None => Ok(false),
        })
        .await
        .map_err(|e| DbalError::Driver(format!("Oracle worker task failed: {}", e)))??;

        if closed {
            tracing::info!(connect_string = %self.connect_string, "Oracle connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// Convert parameters into owned values the client can bind positionally
fn bind_values(params: &[Value]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql> {
            match value {
                Value::Null => Box::new(None::<String>),
                Value::Bool(v) => Box::new(i64::from(*v)),
                Value::Int64(v) => Box::new(*v),
                Value::Float64(v) => Box::new(*v),
                Value::Decimal(v) | Value::String(v) => Box::new(v.clone()),
                Value::Bytes(v) => Box::new(v.clone()),
                Value::DateTime(v) => Box::new(*v),
            }
        })
        .collect()
}

fn fetch_error(idx: usize, e: oracle::Error) -> DbalError {
    DbalError::Execution(format!("Failed to read column {}: {}", idx, e))
}

/// Read one column of a fetched row as a `Value`
fn oracle_to_value(row: &oracle::Row, idx: usize, oracle_type: &OracleType) -> Result<Value> {
    let value = match oracle_type {
        OracleType::Number(_, _) | OracleType::Float(_) | OracleType::Int64 => {
            // Unconstrained NUMBER (e.g. COUNT(*)) can hold either an integer
            // or a decimal, so read the text form and decide afterwards.
            match row.get::<usize, Option<String>>(idx).map_err(|e| fetch_error(idx, e))? {
                Some(text) => match text.parse::<i64>() {
                    Ok(v) => Value::Int64(v),
                    Err(_) => Value::Decimal(text),
                },
                None => Value::Null,
            }
        }
        OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<usize, Option<f64>>(idx)
            .map_err(|e| fetch_error(idx, e))?
            .map_or(Value::Null, Value::Float64),
        OracleType::Boolean => row
            .get::<usize, Option<bool>>(idx)
            .map_err(|e| fetch_error(idx, e))?
            .map_or(Value::Null, Value::Bool),
        OracleType::Date | OracleType::Timestamp(_) => row
            .get::<usize, Option<chrono::NaiveDateTime>>(idx)
            .map_err(|e| fetch_error(idx, e))?
            .map_or(Value::Null, Value::DateTime),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => row
            .get::<usize, Option<Vec<u8>>>(idx)
            .map_err(|e| fetch_error(idx, e))?
            .map_or(Value::Null, Value::Bytes),
        _ => row
            .get::<usize, Option<String>>(idx)
            .map_err(|e| fetch_error(idx, e))?
            .map_or(Value::Null, Value::String),
    };
    Ok(value)
}
