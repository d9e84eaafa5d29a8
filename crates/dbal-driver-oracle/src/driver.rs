//! Oracle driver implementation

use async_trait::async_trait;
use dbal_core::{Connection, ConnectionConfig, DatabaseDriver, DbalError, Result};
use std::sync::Arc;

use crate::{DEFAULT_PORT, OracleConnection};

/// Oracle database driver
pub struct OracleDriver;

impl OracleDriver {
    /// Create a new Oracle driver instance
    pub fn new() -> Self {
        tracing::debug!("Oracle driver initialized");
        Self
    }
}

impl Default for OracleDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for OracleDriver {
    fn name(&self) -> &'static str {
        "oci"
    }

    #[tracing::instrument(skip(self, config), fields(host = %config.host, port = config.port))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let username = config.get_string("username").ok_or_else(|| {
            DbalError::Configuration("Oracle requires a 'username' parameter".into())
        })?;
        let password = config.get_string("password").unwrap_or_default();
        let connect_string = self.build_connection_string(config);

        if connect_string.is_empty() {
            return Err(DbalError::Configuration(
                "Oracle requires a host and service, or a TNS alias".into(),
            ));
        }

        let conn = tokio::task::spawn_blocking(move || {
            OracleConnection::open(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| DbalError::Driver(format!("Oracle worker task failed: {}", e)))?
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to Oracle"))?;

        Ok(Arc::new(conn))
    }

    #[tracing::instrument(skip(self, config))]
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        tracing::debug!("testing Oracle connection");
        let conn = self.connect(config).await?;
        conn.query("SELECT 1 FROM DUAL", &[]).await?;
        conn.close().await
    }

    fn parse_connection_string(&self, conn_str: &str) -> Result<ConnectionConfig> {
        crate::parse_dsn(conn_str)
    }

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        if config.host.is_empty() {
            // TNS alias or a raw connect descriptor
            return config
                .params
                .get("connect_string")
                .cloned()
                .or_else(|| config.database.clone())
                .unwrap_or_default();
        }

        let port = if config.port == 0 {
            DEFAULT_PORT
        } else {
            config.port
        };
        format!(
            "//{}:{}/{}",
            config.host,
            port,
            config.database.as_deref().unwrap_or_default()
        )
    }
}
