//! Driver traits consumed by the gateway.
//!
//! This module defines the contract a database client library must satisfy:
//!
//! - [`Driver`] - opens connections from [`ConnectParams`]
//! - [`DriverConnection`] - runs statements and resolves transactions
//! - [`Cursor`] - the execution handle derived from a connection, holding the
//!   rows, description and rowcount of the last statement
//!
//! All operations take a `Cx` context and report through asupersync's
//! `Outcome`, so cancellation flows through the same channel as errors.

use std::fmt;
use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// Parameters needed to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectParams {
    /// Redshift's default cluster port.
    pub const DEFAULT_PORT: u16 = 5439;

    /// Create connection parameters on the default port.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a driver reports about one executed statement.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    /// Column names, or `None` when the statement produced no row description
    pub columns: Option<Vec<String>>,
    /// Fetched rows in server order
    pub rows: Vec<Row>,
    /// Rows affected or returned, when the server reports a count
    pub rows_affected: Option<u64>,
}

/// A database client library capable of opening connections.
pub trait Driver: Send + Sync {
    /// The connection type produced by this driver.
    type Conn: DriverConnection;

    /// Open a new connection. Fails with the driver's error on any problem.
    fn connect(
        &self,
        cx: &Cx,
        params: &ConnectParams,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}

/// A live connection.
///
/// Connections follow DB-API transaction semantics: statements run inside an
/// implicit transaction that stays open until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) is called.
pub trait DriverConnection: Send {
    /// Derive an execution handle for this connection.
    fn cursor(&self) -> Cursor {
        Cursor::new()
    }

    /// Run one statement, binding `params` positionally, and return its full result.
    fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send;

    /// Commit the current transaction.
    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the current transaction.
    ///
    /// Must be attempted even when `cx` is already cancelled.
    fn rollback(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Close the connection gracefully.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// Execution handle derived from a connection.
///
/// Mirrors a DB-API cursor: `execute` runs a statement through the
/// connection and buffers its result, after which `fetch_all`,
/// `description` and `rowcount` describe it.
#[derive(Debug, Default)]
pub struct Cursor {
    description: Option<Vec<String>>,
    rows: Vec<Row>,
    rowcount: Option<u64>,
}

impl Cursor {
    /// Create an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a statement on `conn`, replacing any previously buffered result.
    ///
    /// On failure the cursor is left empty.
    pub async fn execute<C: DriverConnection>(
        &mut self,
        cx: &Cx,
        conn: &mut C,
        sql: &str,
        params: &[Value],
    ) -> Outcome<(), Error> {
        self.reset();
        match conn.execute(cx, sql, params).await {
            Outcome::Ok(result) => {
                self.description = result.columns;
                self.rows = result.rows;
                self.rowcount = result.rows_affected;
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Take every buffered row. Statements without a result set yield none.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    /// Column names of the last statement, if it produced a row description.
    pub fn description(&self) -> Option<&[String]> {
        self.description.as_deref()
    }

    /// Row count reported for the last statement, `-1` when unknown.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1)
    }

    fn reset(&mut self) {
        self.description = None;
        self.rows.clear();
        self.rowcount = None;
    }
}
