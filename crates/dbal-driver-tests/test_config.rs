//! Test configuration: where the Oracle server is and which fixture to load.
//!
//! Configuration comes from a TOML file, then environment overrides:
//!
//! ```toml
//! [aliases]
//! "@sql" = "@root/crates/dbal-driver-tests/data"
//!
//! [oracle]
//! dsn = "oci:dbname=//localhost:1521/XE;charset=AL32UTF8"
//! username = "system"
//! password = "oracle"
//! fixture = "@fixtures/oci.sql"
//! ```
//!
//! | Variable | Overrides |
//! |---|---|
//! | `DBAL_TEST_CONFIG` | path of the TOML file |
//! | `DBAL_TEST_ORACLE_DSN` | `oracle.dsn` |
//! | `DBAL_TEST_ORACLE_USERNAME` | `oracle.username` |
//! | `DBAL_TEST_ORACLE_PASSWORD` | `oracle.password` |
//! | `DBAL_TEST_ORACLE_FIXTURE` | `oracle.fixture` |

use dbal_core::{ConnectionConfig, DbalError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aliases::AliasMap;

/// Path of the TOML configuration file
pub const CONFIG_PATH_VAR: &str = "DBAL_TEST_CONFIG";
/// Overrides `oracle.dsn`
pub const DSN_VAR: &str = "DBAL_TEST_ORACLE_DSN";
/// Overrides `oracle.username`
pub const USERNAME_VAR: &str = "DBAL_TEST_ORACLE_USERNAME";
/// Overrides `oracle.password`
pub const PASSWORD_VAR: &str = "DBAL_TEST_ORACLE_PASSWORD";
/// Overrides `oracle.fixture`
pub const FIXTURE_VAR: &str = "DBAL_TEST_ORACLE_FIXTURE";

/// Harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Oracle connection and fixture settings
    #[serde(default)]
    pub oracle: Option<OracleSection>,
    /// Extra path aliases, on top of `@root` and `@fixtures`
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// `[oracle]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleSection {
    /// `oci:dbname=...` data-source name
    pub dsn: Option<String>,
    /// Schema user to connect as
    pub username: Option<String>,
    /// Password, may be empty for external authentication
    pub password: Option<String>,
    /// Fixture file, possibly starting with an alias
    pub fixture: Option<String>,
}

impl TestConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| DbalError::Configuration(format!("invalid test configuration: {}", e)))
    }

    /// Read configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded test configuration");
        Self::from_toml_str(&text)
    }

    /// Default config file: `$DBAL_TEST_CONFIG`, else `data/config.toml` in
    /// this crate
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("data/config.toml"))
    }

    /// Load the default config file if it exists, then apply environment
    /// overrides. A missing file yields an empty configuration.
    pub fn discover() -> Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no test configuration file, using defaults");
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unset and empty values are ignored
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let oracle = self.oracle.get_or_insert_with(OracleSection::default);

        for (var, slot) in [
            (DSN_VAR, &mut oracle.dsn),
            (USERNAME_VAR, &mut oracle.username),
            (PASSWORD_VAR, &mut oracle.password),
            (FIXTURE_VAR, &mut oracle.fixture),
        ] {
            if let Some(value) = lookup(var) {
                tracing::debug!(variable = var, "configuration overridden from environment");
                *slot = Some(value);
            }
        }
        self
    }

    /// The `[oracle]` table, empty when absent
    pub fn oracle(&self) -> OracleSection {
        self.oracle.clone().unwrap_or_default()
    }

    /// Default aliases extended with the configured ones
    pub fn alias_map(&self) -> Result<AliasMap> {
        let mut aliases = AliasMap::with_defaults();
        for (alias, target) in &self.aliases {
            aliases.set(alias, target)?;
        }
        Ok(aliases)
    }
}

impl OracleSection {
    /// Whether a server is configured explicitly
    pub fn has_dsn(&self) -> bool {
        self.dsn.as_deref().is_some_and(|dsn| !dsn.trim().is_empty())
    }

    /// The configured fixture path, unresolved
    pub fn fixture(&self) -> Result<&str> {
        required(&self.fixture, "oracle.fixture")
    }

    /// Connection configuration built from `dsn`, `username` and `password`
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let dsn = required(&self.dsn, "oracle.dsn")?;
        let username = required(&self.username, "oracle.username")?;

        let mut config = dbal_driver_oracle::parse_dsn(dsn)?;
        config.username = Some(username.to_string());
        config.password = self.password.clone();
        Ok(config)
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DbalError::Configuration(format!("missing required setting '{}'", key)))
}
