//! In-memory `Connection` that records executed statements.
//!
//! Used by unit tests that exercise fixture loading and context lifecycle
//! without a live Oracle server.

use async_trait::async_trait;
use dbal_core::{Connection, DbalError, QueryResult, Result, StatementResult, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct RecordingConnection {
    executed: Mutex<Vec<String>>,
    fail_on: Option<String>,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any statement containing `fragment` with an execution error
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// Statements executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver_name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        if self.is_closed() {
            return Err(DbalError::Connection("connection is closed".into()));
        }
        if let Some(fragment) = &self.fail_on
            && sql.contains(fragment.as_str())
        {
            return Err(DbalError::Execution(format!("rejected: {}", sql)));
        }

        self.executed.lock().push(sql.to_string());
        Ok(StatementResult::default())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(DbalError::Connection("connection is closed".into()));
        }
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
