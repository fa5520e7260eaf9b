//! Amazon Redshift driver for sqlgate.
//!
//! Redshift speaks the PostgreSQL frontend/backend protocol, which this crate
//! implements directly on asupersync's TCP primitives. It provides:
//!
//! - Message framing and parsing
//! - Authentication (cleartext, MD5, SCRAM-SHA-256)
//! - The extended query protocol with text-format parameters and results
//! - DB-API transaction semantics (implicit `BEGIN`, explicit commit/rollback)
//! - Translation of `%s` placeholders to `$n`
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlgate_core::{ConnectParams, Driver};
//! use sqlgate_redshift::RedshiftDriver;
//!
//! let driver = RedshiftDriver::new();
//! let params = ConnectParams::new("cluster.example.com", "dev", "awsuser", password);
//! let conn = driver.connect(&cx, &params).await;
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod placeholder;
pub mod protocol;
pub mod types;

pub use config::RedshiftConfig;
pub use connection::{ConnectionState, RedshiftConnection, RedshiftDriver};
pub use protocol::TransactionStatus;
