//! Tool surface: the gateway operations a transport exposes by name.
//!
//! Every operation recovers its errors into a [`Response`], so callers
//! always receive a `status` object and never an `Err`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use sqlgate_core::{Cx, Driver, Value};

use crate::config::{ConfigSource, ConnectArgs};
use crate::error::GatewayError;
use crate::executor;
use crate::introspect::{self, DEFAULT_SCHEMA};
use crate::mode::Mode;
use crate::response::Response;
use crate::session::{SessionInfo, SessionManager};

/// Tool names with a one-line description, in registration order.
pub const TOOLS: &[(&str, &str)] = &[
    ("connect_db", "Connect to a Redshift database, falling back to REDSHIFT_* variables"),
    ("query", "Run a read statement and return its rows"),
    ("execute", "Run a write statement and commit it"),
    ("list_schemas", "List user schemas"),
    ("list_tables", "List base tables in a schema (default: public)"),
    ("describe_table", "Describe the columns of a table"),
    ("disconnect", "Close the database connection"),
];

#[derive(Debug, Deserialize)]
struct StatementArgs {
    sql: String,
    #[serde(default)]
    params: Option<Vec<Json>>,
}

#[derive(Debug, Deserialize)]
struct ListTablesArgs {
    #[serde(default = "default_schema")]
    schema: String,
}

#[derive(Debug, Deserialize)]
struct DescribeTableArgs {
    table: String,
    #[serde(default = "default_schema")]
    schema: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

/// The gateway: a session manager plus the operations built on it.
pub struct Gateway<D: Driver, S> {
    sessions: SessionManager<D, S>,
}

impl<D: Driver, S: ConfigSource> Gateway<D, S> {
    pub fn new(driver: D, config: S) -> Self {
        Self {
            sessions: SessionManager::new(driver, config),
        }
    }

    pub fn sessions(&self) -> &SessionManager<D, S> {
        &self.sessions
    }

    /// Permission mode currently in force.
    pub fn mode(&self) -> Mode {
        Mode::from_config(self.sessions.config())
    }

    pub async fn is_connected(&self, cx: &Cx) -> bool {
        self.sessions.is_connected(cx).await
    }

    pub async fn session_info(&self, cx: &Cx) -> Option<SessionInfo> {
        self.sessions.session_info(cx).await
    }

    /// Connect from configuration, if configured. Meant for process start.
    pub async fn auto_connect(&self, cx: &Cx) -> Option<SessionInfo> {
        match self.sessions.auto_connect(cx).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "Auto-connection unavailable");
                None
            }
        }
    }

    pub async fn connect_db(&self, cx: &Cx, args: &ConnectArgs) -> Response {
        match self.sessions.connect(cx, args).await {
            Ok(info) => Response::connected(&info),
            Err(e) => Response::error(&e),
        }
    }

    pub async fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Response {
        executor::query(&self.sessions, cx, sql, params).await.into()
    }

    pub async fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Response {
        executor::execute(&self.sessions, cx, sql, params).await.into()
    }

    pub async fn list_schemas(&self, cx: &Cx) -> Response {
        introspect::list_schemas(&self.sessions, cx).await.into()
    }

    pub async fn list_tables(&self, cx: &Cx, schema: &str) -> Response {
        introspect::list_tables(&self.sessions, cx, schema).await.into()
    }

    pub async fn describe_table(&self, cx: &Cx, table: &str, schema: &str) -> Response {
        introspect::describe_table(&self.sessions, cx, table, schema)
            .await
            .into()
    }

    pub async fn disconnect(&self, cx: &Cx) -> Response {
        match self.sessions.disconnect(cx).await {
            Ok(()) => Response::disconnected(),
            Err(e) => Response::error(&e),
        }
    }

    /// Dispatch a tool by name with JSON arguments.
    ///
    /// `null` arguments are treated as an empty object.
    #[tracing::instrument(level = "debug", skip(self, cx, args))]
    pub async fn call(&self, cx: &Cx, tool: &str, args: Json) -> Response {
        match tool {
            "connect_db" => match parse_args::<ConnectArgs>(args) {
                Ok(args) => self.connect_db(cx, &args).await,
                Err(e) => Response::error(&e),
            },
            "query" => match parse_args::<StatementArgs>(args) {
                Ok(args) => self.query(cx, &args.sql, &bind_params(args.params)).await,
                Err(e) => Response::error(&e),
            },
            "execute" => match parse_args::<StatementArgs>(args) {
                Ok(args) => self.execute(cx, &args.sql, &bind_params(args.params)).await,
                Err(e) => Response::error(&e),
            },
            "list_schemas" => self.list_schemas(cx).await,
            "list_tables" => match parse_args::<ListTablesArgs>(args) {
                Ok(args) => self.list_tables(cx, &args.schema).await,
                Err(e) => Response::error(&e),
            },
            "describe_table" => match parse_args::<DescribeTableArgs>(args) {
                Ok(args) => self.describe_table(cx, &args.table, &args.schema).await,
                Err(e) => Response::error(&e),
            },
            "disconnect" => self.disconnect(cx).await,
            other => Response::error(&GatewayError::InvalidArguments(format!(
                "unknown tool '{other}'"
            ))),
        }
    }
}

fn parse_args<T: DeserializeOwned>(args: Json) -> Result<T, GatewayError> {
    let args = if args.is_null() {
        Json::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| GatewayError::InvalidArguments(e.to_string()))
}

fn bind_params(params: Option<Vec<Json>>) -> Vec<Value> {
    params
        .unwrap_or_default()
        .iter()
        .map(Value::from_json)
        .collect()
}
