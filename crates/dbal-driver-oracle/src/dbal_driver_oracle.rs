//! Oracle database driver implementation

mod connection;
mod driver;
mod dsn;

pub use connection::OracleConnection;
pub use driver::OracleDriver;
pub use dsn::{DEFAULT_PORT, parse_dsn};
