//! In-memory driver for gateway tests.
//!
//! Models one table, `items(id, name)`, with DB-API transaction semantics:
//! inserts are staged on the connection until `commit`, and `rollback`
//! discards them. Catalog queries are answered from scripted rows. Every
//! driver call is recorded, and failures can be injected per operation.
//!
//! Cancellation follows the Redshift driver: `execute` and `commit` refuse a
//! cancelled context, while `rollback` and `close` always run.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use asupersync::types::CancelKind;
use sqlgate::{Cx, MapConfig, Outcome};
use sqlgate_core::{ConnectParams, Driver, DriverConnection, Error, Row, StatementResult, Value};

pub const ITEMS_COLUMNS: [&str; 2] = ["id", "name"];

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect { host: String, port: u16 },
    Execute { sql: String, params: Vec<Value> },
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub committed: Vec<Vec<Value>>,
    pub staged: Vec<Vec<Value>>,
    pub schemas: Vec<String>,
    pub tables: Vec<(String, String)>,
    /// Rows answered for `information_schema.columns`
    pub catalog_columns: Vec<Vec<Value>>,
    pub fail_connect: Option<String>,
    pub fail_execute: Option<String>,
    pub fail_commit: Option<String>,
    pub fail_rollback: Option<String>,
    pub fail_close: Option<String>,
    /// Cancel the caller's context when `commit` is reached
    pub cancel_on_commit: bool,
}

impl MockState {
    pub fn connects(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Connect { .. }))
            .count()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Driver for MockDriver {
    type Conn = MockConnection;

    fn connect(
        &self,
        _cx: &Cx,
        params: &ConnectParams,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        let outcome = {
            let mut state = self.state();
            state.calls.push(Call::Connect {
                host: params.host.clone(),
                port: params.port,
            });
            match state.fail_connect.clone() {
                Some(message) => Outcome::Err(Error::Custom(message)),
                None => Outcome::Ok(MockConnection {
                    state: Arc::clone(&self.state),
                }),
            }
        };
        std::future::ready(outcome)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<StatementResult, Error> {
        let mut state = self.state();
        state.calls.push(Call::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(message) = state.fail_execute.take() {
            return Err(Error::Custom(message));
        }

        let names = |cols: &[&str]| cols.iter().map(|c| (*c).to_string()).collect::<Vec<_>>();
        let lowered = sql.to_lowercase();

        if lowered.contains("information_schema.schemata") {
            let rows = state
                .schemas
                .iter()
                .map(|s| Row::new(names(&["schema_name"]), vec![Value::Text(s.clone())]))
                .collect();
            return Ok(rows_result(names(&["schema_name"]), rows));
        }
        if lowered.contains("information_schema.tables") {
            let schema = params.first().and_then(Value::as_str).unwrap_or_default();
            let rows = state
                .tables
                .iter()
                .filter(|(s, _)| s == schema)
                .map(|(_, t)| Row::new(names(&["table_name"]), vec![Value::Text(t.clone())]))
                .collect();
            return Ok(rows_result(names(&["table_name"]), rows));
        }
        if lowered.contains("information_schema.columns") {
            let columns = names(&[
                "column_name",
                "data_type",
                "character_maximum_length",
                "numeric_precision",
                "numeric_scale",
                "is_nullable",
                "column_default",
            ]);
            let rows = state
                .catalog_columns
                .iter()
                .map(|values| Row::new(columns.clone(), values.clone()))
                .collect();
            return Ok(rows_result(columns, rows));
        }
        if lowered.starts_with("insert into items") {
            state.staged.push(params.to_vec());
            return Ok(StatementResult {
                rows_affected: Some(1),
                ..Default::default()
            });
        }
        if lowered.starts_with("select * from items") {
            let rows = state
                .committed
                .iter()
                .chain(state.staged.iter())
                .map(|values| Row::new(names(&ITEMS_COLUMNS), values.clone()))
                .collect();
            return Ok(rows_result(names(&ITEMS_COLUMNS), rows));
        }
        if lowered.starts_with("select 1 as a, 2 as b, 3 as a") {
            let columns = names(&["a", "b", "a"]);
            let row = Row::new(
                columns.clone(),
                vec![Value::Int(1), Value::Int(2), Value::Int(3)],
            );
            return Ok(rows_result(columns, vec![row]));
        }
        // Anything else runs without a result set or a row count.
        Ok(StatementResult::default())
    }
}

fn rows_result(columns: Vec<String>, rows: Vec<Row>) -> StatementResult {
    let count = rows.len() as u64;
    StatementResult {
        columns: Some(columns),
        rows,
        rows_affected: Some(count),
    }
}

fn settle(result: Result<(), String>) -> Outcome<(), Error> {
    match result {
        Ok(()) => Outcome::Ok(()),
        Err(message) => Outcome::Err(Error::Custom(message)),
    }
}

impl DriverConnection for MockConnection {
    fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send {
        let outcome = match cx.cancel_reason() {
            Some(reason) => Outcome::Cancelled(reason),
            None => match self.run(sql, params) {
                Ok(result) => Outcome::Ok(result),
                Err(e) => Outcome::Err(e),
            },
        };
        std::future::ready(outcome)
    }

    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let outcome = {
            let mut state = self.state();
            state.calls.push(Call::Commit);
            if state.cancel_on_commit {
                cx.cancel_with(CancelKind::User, Some("caller went away"));
            }
            if let Some(reason) = cx.cancel_reason() {
                Outcome::Cancelled(reason)
            } else {
                match state.fail_commit.take() {
                    Some(message) => settle(Err(message)),
                    None => {
                        let staged = std::mem::take(&mut state.staged);
                        state.committed.extend(staged);
                        Outcome::Ok(())
                    }
                }
            }
        };
        std::future::ready(outcome)
    }

    fn rollback(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = {
            let mut state = self.state();
            state.calls.push(Call::Rollback);
            state.staged.clear();
            state.fail_rollback.take().map_or(Ok(()), Err)
        };
        std::future::ready(settle(result))
    }

    fn close(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = {
            let mut state = self.state();
            state.calls.push(Call::Close);
            state.fail_close.take().map_or(Ok(()), Err)
        };
        std::future::ready(settle(result))
    }
}

/// Configuration carrying every required connection variable.
pub fn full_config() -> MapConfig {
    MapConfig::new()
        .with("REDSHIFT_HOST", "cluster.example.com")
        .with("REDSHIFT_DATABASE", "dev")
        .with("REDSHIFT_USER", "awsuser")
        .with("REDSHIFT_PASSWORD", "hunter2")
}
