//! Per-test context: configuration, connection and fixture lifecycle.
//!
//! Every test builds its own [`TestContext`] and tears it down at the end;
//! nothing about the connection is shared between tests. Setup:
//!
//! 1. initializes logging (once per process),
//! 2. resolves the server: the configured DSN, or an Oracle container when
//!    none is configured,
//! 3. opens the connection, retrying while the server warms up,
//! 4. loads the configured fixture unless the options say otherwise.
//!
//! A server that cannot be reached surfaces as `DbalError::Connection`
//! somewhere in the error chain; tests use [`is_connection_error`] (or
//! [`setup_or_skip`]) to skip instead of failing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbal_driver_tests::fixtures::{setup_or_skip, ConnectOptions};
//!
//! #[tokio::test]
//! async fn test_customer_count() -> anyhow::Result<()> {
//!     let Some(ctx) = setup_or_skip(ConnectOptions::default()).await else {
//!         return Ok(());
//!     };
//!     let result = ctx.connection().query("SELECT COUNT(*) FROM \"customer\"", &[]).await?;
//!     ctx.teardown().await
//! }
//! ```

use anyhow::{Context, Result};
use dbal_core::{Connection, ConnectionConfig, DatabaseDriver, DbalError};
use dbal_driver_oracle::OracleDriver;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::aliases::AliasMap;
use crate::fixture_loader::load_fixture_file;
use crate::test_config::TestConfig;
use crate::test_containers::{oracle_container, use_manual_containers};

/// Fixture-backed contexts share one schema; each holds this lock until teardown
static SCHEMA_LOCK: Lazy<Arc<Mutex<()>>> = Lazy::new(|| Arc::new(Mutex::new(())));

/// What [`TestContext`] does during setup
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Load the fixture after connecting
    pub load_fixture: bool,
    /// Fixture to load instead of the configured one
    pub fixture: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            load_fixture: true,
            fixture: None,
        }
    }
}

impl ConnectOptions {
    /// Connect without touching the schema
    pub fn without_fixture() -> Self {
        Self {
            load_fixture: false,
            fixture: None,
        }
    }

    /// Load `path` (which may start with an alias) instead of the configured fixture
    pub fn with_fixture(mut self, path: impl Into<String>) -> Self {
        self.load_fixture = true;
        self.fixture = Some(path.into());
        self
    }
}

/// Everything one test needs, created by setup and consumed by teardown
pub struct TestContext {
    config: TestConfig,
    aliases: AliasMap,
    conn: Arc<dyn Connection>,
    _schema: Option<OwnedMutexGuard<()>>,
}

impl TestContext {
    /// Set up from the discovered configuration file and environment
    pub async fn from_env(options: ConnectOptions) -> Result<Self> {
        let config = TestConfig::discover().context("failed to load test configuration")?;
        Self::setup(config, options).await
    }

    /// Connect using `config` and prepare the schema according to `options`
    pub async fn setup(config: TestConfig, options: ConnectOptions) -> Result<Self> {
        initialize_logging();

        let conn_config = resolve_connection_config(&config).await?;
        let (max_attempts, base_delay_secs) = if use_manual_containers() {
            (3, 1)
        } else {
            (5, 2)
        };
        let conn = connect_with_retry(&conn_config, max_attempts, base_delay_secs).await?;

        Self::with_connection(config, conn, options).await
    }

    /// Build a context around an already open connection
    pub async fn with_connection(
        config: TestConfig,
        conn: Arc<dyn Connection>,
        options: ConnectOptions,
    ) -> Result<Self> {
        let aliases = config
            .alias_map()
            .context("invalid alias in test configuration")?;
        let schema = if options.load_fixture {
            Some(Arc::clone(&SCHEMA_LOCK).lock_owned().await)
        } else {
            None
        };
        let ctx = Self {
            config,
            aliases,
            conn,
            _schema: schema,
        };

        if options.load_fixture {
            let fixture = match options.fixture {
                Some(fixture) => fixture,
                None => ctx.config.oracle().fixture()?.to_string(),
            };
            ctx.load_fixture(&fixture).await?;
        }

        Ok(ctx)
    }

    /// Resolve `fixture` through the alias map and run it
    pub async fn load_fixture(&self, fixture: &str) -> Result<()> {
        let path = self.aliases.resolve(fixture)?;
        tracing::info!(fixture = %fixture, path = %path.display(), "loading test fixture");

        load_fixture_file(self.conn.as_ref(), &path)
            .await
            .with_context(|| format!("failed to load fixture {}", path.display()))
    }

    /// The open connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Configuration the context was built from
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Aliases used to resolve fixture paths
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Close the connection and release the schema
    pub async fn teardown(self) -> Result<()> {
        tracing::debug!(driver = %self.conn.driver_name(), "tearing down test context");
        self.conn
            .close()
            .await
            .context("failed to close test connection")
    }
}

/// Set up a context, or log and return `None` when Oracle is unreachable.
///
/// Any other setup failure (bad configuration, broken fixture) panics so the
/// test fails loudly.
pub async fn setup_or_skip(options: ConnectOptions) -> Option<TestContext> {
    match TestContext::from_env(options).await {
        Ok(ctx) => Some(ctx),
        Err(e) if is_connection_error(&e) => {
            eprintln!(
                "Oracle is not reachable, skipping. Start Docker or set DBAL_TEST_ORACLE_DSN.\nError: {:#}",
                e
            );
            None
        }
        Err(e) => panic!("test setup failed: {:#}", e),
    }
}

/// Whether `err` means the database could not be reached
pub fn is_connection_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<DbalError>()
            .is_some_and(DbalError::is_connection)
    })
}

/// Connection settings from the configured DSN, or from a test container
pub(crate) async fn resolve_connection_config(config: &TestConfig) -> Result<ConnectionConfig> {
    let oracle = config.oracle();

    if oracle.has_dsn() {
        return Ok(oracle.connection_config()?);
    }

    if use_manual_containers() {
        return Err(DbalError::Configuration(
            "DBAL_TEST_MANUAL_CONTAINERS is set but no oracle.dsn is configured".into(),
        )
        .into());
    }

    let info = oracle_container().await.map_err(|e| {
        DbalError::Connection(format!(
            "failed to start Oracle container - is Docker running? {:#}",
            e
        ))
    })?;

    Ok(
        ConnectionConfig::new_oracle(&info.host, info.port, &info.service, &info.username)
            .with_password(info.password),
    )
}

/// Connect, retrying connection failures with a linearly growing delay.
/// Configuration errors are returned immediately.
async fn connect_with_retry(
    config: &ConnectionConfig,
    max_attempts: u32,
    base_delay_secs: u64,
) -> Result<Arc<dyn Connection>> {
    let driver = OracleDriver::new();
    let mut attempt = 1;

    loop {
        match driver.connect(config).await {
            Ok(conn) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "database ready after retry");
                }
                return Ok(conn);
            }
            Err(e) if e.is_connection() && attempt < max_attempts => {
                let delay = std::time::Duration::from_secs(base_delay_secs * attempt as u64);
                tracing::warn!(
                    driver = driver.name(),
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "database not ready, retrying..."
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!(
                    "failed to connect through the {} driver after {} attempt(s)",
                    driver.name(),
                    attempt
                )));
            }
        }
    }
}

/// Initialize logging for tests if not already initialized
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(
                "dbal_core=debug,dbal_driver_oracle=debug,dbal_driver_tests=debug",
            )
        });
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
