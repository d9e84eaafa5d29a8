//! Parsing of `oci:` data-source names
//!
//! The accepted form is `oci:dbname=<connect>[;key=value...]`, where
//! `<connect>` is either an Easy Connect target (`//host:port/service`,
//! `host:port/service`, `host/service`) or a TNS alias. Every key other than
//! `dbname` is kept verbatim in `ConnectionConfig::params`.

use dbal_core::{ConnectionConfig, DbalError, Result};

/// Default Oracle listener port
pub const DEFAULT_PORT: u16 = 1521;

const DSN_PREFIX: &str = "oci:";

/// Parse an `oci:` DSN into a connection configuration
pub fn parse_dsn(dsn: &str) -> Result<ConnectionConfig> {
    let body = dsn.trim().strip_prefix(DSN_PREFIX).ok_or_else(|| {
        DbalError::Configuration(format!(
            "DSN must start with '{}', got '{}'",
            DSN_PREFIX, dsn
        ))
    })?;

    let mut config = ConnectionConfig::new("oracle", "Oracle");
    let mut dbname = None;

    for pair in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            DbalError::Configuration(format!("DSN segment '{}' is not a key=value pair", pair))
        })?;
        let key = key.trim();
        let value = value.trim();

        if key.eq_ignore_ascii_case("dbname") {
            dbname = Some(value.to_string());
        } else {
            config.params.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    let dbname = dbname
        .filter(|d| !d.is_empty())
        .ok_or_else(|| DbalError::Configuration(format!("DSN '{}' has no dbname", dsn)))?;

    apply_connect_target(&mut config, &dbname)?;
    config.params.insert("connect_string".into(), dbname);
    Ok(config)
}

/// Fill host, port and service from an Easy Connect target; a bare word is
/// treated as a TNS alias and only recorded as the database name.
fn apply_connect_target(config: &mut ConnectionConfig, target: &str) -> Result<()> {
    let stripped = target.strip_prefix("//").unwrap_or(target);

    let Some((host_port, service)) = stripped.split_once('/') else {
        config.database = Some(target.to_string());
        return Ok(());
    };

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DbalError::Configuration(format!("invalid port '{}' in DSN", port))
            })?;
            (host, port)
        }
        None => (host_port, DEFAULT_PORT),
    };

    if host.is_empty() || service.is_empty() {
        return Err(DbalError::Configuration(format!(
            "connect target '{}' must name both a host and a service",
            target
        )));
    }

    config.host = host.to_string();
    config.port = port;
    config.database = Some(service.to_string());
    Ok(())
}
