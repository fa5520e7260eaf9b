//! sqlgate - mediated, permission-gated SQL access to Amazon Redshift.
//!
//! The gateway keeps one managed database session, checks every statement
//! against the configured permission [`Mode`], and returns structured
//! [`Response`] objects for a tool-calling transport:
//!
//! - `connect_db` / `disconnect` manage the session
//! - `query` runs reads, `execute` runs writes and commits them
//! - `list_schemas`, `list_tables`, `describe_table` introspect the catalog
//!
//! # Example
//!
//! ```ignore
//! use sqlgate::prelude::*;
//!
//! let gateway = sqlgate::redshift_gateway();
//! gateway.auto_connect(&cx).await;
//!
//! let response = gateway
//!     .call(&cx, "query", serde_json::json!({"sql": "SELECT 1 AS one"}))
//!     .await;
//! println!("{}", response.to_json());
//! ```
//!
//! The mode comes from `DB_MCP_MODE` (`readonly` by default), connection
//! parameters from the `REDSHIFT_*` variables when not passed explicitly.

pub mod config;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod mode;
pub mod permission;
pub mod response;
pub mod session;
pub mod tools;

pub use config::{ConfigSource, ConnectArgs, ConnectField, EnvConfig, MapConfig};
pub use error::{ErrorKind, GatewayError};
pub use executor::{ExecuteReply, QueryReply};
pub use introspect::{ColumnDescription, ColumnSize, SchemasReply, TableDescription, TablesReply};
pub use mode::Mode;
pub use permission::{Verdict, classify};
pub use response::{Response, Status};
pub use session::{SessionInfo, SessionManager};
pub use tools::{Gateway, TOOLS};

pub use sqlgate_core::{Cx, Error, Outcome, Value};
pub use sqlgate_redshift::{RedshiftConfig, RedshiftDriver};

/// A gateway over the Redshift driver, configured from the process environment.
pub type RedshiftGateway = Gateway<RedshiftDriver, EnvConfig>;

/// Build a [`RedshiftGateway`] with default driver settings.
pub fn redshift_gateway() -> RedshiftGateway {
    Gateway::new(RedshiftDriver::new(), EnvConfig)
}

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        ConfigSource, ConnectArgs, Cx, EnvConfig, Gateway, GatewayError, MapConfig, Mode,
        RedshiftGateway, Response, Status, Value,
    };
}
