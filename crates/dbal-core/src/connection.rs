//! Connection trait

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// An open database connection.
///
/// Calls are issued one at a time by a single caller; every method resolves
/// only after the server has finished with the statement.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "oracle")
    fn driver_name(&self) -> &str;

    /// Execute a statement that returns no rows: DDL, DML or an anonymous
    /// PL/SQL block
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Get the dialect identifier for this connection
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }

    /// Close the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
