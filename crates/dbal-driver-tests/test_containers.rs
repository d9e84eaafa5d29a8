//! Docker container management for integration tests.
//!
//! When no DSN is configured, tests run against an Oracle Database Free
//! container started with testcontainers-rs. The container is started lazily
//! by the first test that needs it and reused by every later test in the
//! process. Schema and data are not baked into the image; each test context
//! loads the fixture itself.
//!
//! Set `DBAL_TEST_MANUAL_CONTAINERS=1` to disable containers and use the DSN
//! from the test configuration instead.

use once_cell::sync::Lazy;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::oracle::free::Oracle;
use tokio::sync::Mutex;

/// Port the Oracle listener uses inside the container
const ORACLE_PORT: u16 = 1521;

/// Pluggable database created by the gvenzl/oracle-free image
const ORACLE_SERVICE: &str = "FREEPDB1";

/// Application user created by the testcontainers Oracle module
const ORACLE_USER: &str = "test";
const ORACLE_PASSWORD: &str = "test";

/// Information about a running test container
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Host address (typically 127.0.0.1)
    pub host: String,
    /// Port number (randomly assigned by testcontainers)
    pub port: u16,
    /// Service name to connect to
    pub service: String,
    /// Application user
    pub username: String,
    /// Application user password
    pub password: String,
}

struct OracleContainer {
    #[allow(dead_code)]
    inner: ContainerAsync<Oracle>,
    info: ContainerInfo,
}

/// Global Oracle container instance. The async mutex is held while the
/// container starts so concurrent tests wait for a single startup.
static ORACLE_CONTAINER: Lazy<Mutex<Option<OracleContainer>>> = Lazy::new(|| Mutex::new(None));

/// Whether tests should use manually managed servers instead of testcontainers
///
/// Set DBAL_TEST_MANUAL_CONTAINERS=1 to use the DSN from the test configuration.
pub fn use_manual_containers() -> bool {
    std::env::var("DBAL_TEST_MANUAL_CONTAINERS")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(false)
}

/// Get or create the Oracle test container
///
/// The first call pulls and starts `gvenzl/oracle-free` and waits for the
/// database to report readiness, which can take a minute or more. Later calls
/// return the cached connection details.
pub async fn oracle_container() -> anyhow::Result<ContainerInfo> {
    let mut guard = ORACLE_CONTAINER.lock().await;

    if let Some(ref container) = *guard {
        return Ok(container.info.clone());
    }

    tracing::info!("starting Oracle test container");

    let container = Oracle::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start oracle container: {}", e))?;

    let host_port = container
        .get_host_port_ipv4(ORACLE_PORT)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get oracle port: {}", e))?;

    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port: host_port,
        service: ORACLE_SERVICE.to_string(),
        username: ORACLE_USER.to_string(),
        password: ORACLE_PASSWORD.to_string(),
    };

    tracing::info!(port = host_port, service = ORACLE_SERVICE, "Oracle test container started");

    *guard = Some(OracleContainer {
        inner: container,
        info: info.clone(),
    });

    Ok(info)
}
