//! Gateway error taxonomy.
//!
//! Every operation fails with one of these; the tool layer turns them into
//! `status: "error"` responses tagged with [`ErrorKind`].

use std::fmt;

use serde::Serialize;
use sqlgate_core::Error;

use crate::config::ConnectField;

/// Message returned when no session exists and none could be established.
pub const NOT_CONNECTED_MESSAGE: &str =
    "Not connected to database. Use connect_db or set environment variables.";

/// Why a gateway operation failed.
#[derive(Debug)]
pub enum GatewayError {
    /// Required connection parameters could not be resolved
    MissingParameters(Vec<ConnectField>),
    /// The permission gate refused the statement
    Forbidden(String),
    /// No live session and auto-connect did not produce one
    NotConnected,
    /// The driver (or configuration feeding it) failed
    Driver(Error),
    /// A tool was called with unusable arguments
    InvalidArguments(String),
}

/// Serializable discriminator of [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingParameters,
    Forbidden,
    NotConnected,
    DriverError,
    InvalidArguments,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MissingParameters(_) => ErrorKind::MissingParameters,
            GatewayError::Forbidden(_) => ErrorKind::Forbidden,
            GatewayError::NotConnected => ErrorKind::NotConnected,
            GatewayError::Driver(_) => ErrorKind::DriverError,
            GatewayError::InvalidArguments(_) => ErrorKind::InvalidArguments,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::MissingParameters(fields) => {
                f.write_str("Missing required parameters: ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                Ok(())
            }
            GatewayError::Forbidden(reason) => f.write_str(reason),
            GatewayError::NotConnected => f.write_str(NOT_CONNECTED_MESSAGE),
            // Server messages pass through as the server wrote them.
            GatewayError::Driver(Error::Query(q)) => f.write_str(&q.message),
            GatewayError::Driver(e) => write!(f, "{e}"),
            GatewayError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for GatewayError {
    fn from(err: Error) -> Self {
        GatewayError::Driver(err)
    }
}
