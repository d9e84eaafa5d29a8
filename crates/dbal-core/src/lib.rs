//! DBAL Core - Core abstractions shared by the Oracle driver and its test harness
//!
//! This crate defines:
//!
//! - `DatabaseDriver` - Trait for opening connections from a `ConnectionConfig`
//! - `Connection` - Trait for an open database connection
//! - `DbalError` - Error taxonomy (configuration, connection, execution)
//! - Common types like `Value`, `Row`, `QueryResult`

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
