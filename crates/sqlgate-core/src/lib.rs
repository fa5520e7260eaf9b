//! Core types and traits for the sqlgate SQL gateway.
//!
//! This crate holds the driver-facing vocabulary shared by the gateway and
//! its database drivers:
//!
//! - `Value` for parameters and result cells
//! - `Row` with shared column metadata
//! - `Error` taxonomy reported by drivers
//! - `Driver` / `DriverConnection` traits and the `Cursor` execution handle
//! - `Outcome` and `Cx` re-exported from asupersync

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod driver;
pub mod error;
pub mod row;
pub mod value;

pub use driver::{ConnectParams, Cursor, Driver, DriverConnection, StatementResult};
pub use error::Error;
pub use row::{ColumnInfo, Row};
pub use value::Value;
