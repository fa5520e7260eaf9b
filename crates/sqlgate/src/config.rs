//! Configuration sources and connection-parameter resolution.
//!
//! Connection parameters come from a priority-ordered list of
//! [`ParamSource`]s, normally the caller's explicit arguments followed by
//! configuration. The first non-empty value wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use sqlgate_core::error::ConfigError;
use sqlgate_core::{ConnectParams, Error};

use crate::error::GatewayError;

/// Read-only named string values (process environment, a map, ...).
pub trait ConfigSource: Send + Sync {
    /// Value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for Arc<T> {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// In-memory configuration. Values can be changed while shared.
#[derive(Debug, Default)]
pub struct MapConfig {
    vars: RwLock<HashMap<String, String>>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

impl ConfigSource for MapConfig {
    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// A connection parameter and where it can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectField {
    Host,
    Database,
    User,
    Password,
    Port,
}

impl ConnectField {
    /// Fields that must resolve before a connection is attempted, in reporting order.
    pub const REQUIRED: [ConnectField; 4] = [
        ConnectField::Host,
        ConnectField::Database,
        ConnectField::User,
        ConnectField::Password,
    ];

    /// Name of the explicit argument.
    pub const fn arg_name(self) -> &'static str {
        match self {
            ConnectField::Host => "host",
            ConnectField::Database => "database",
            ConnectField::User => "user",
            ConnectField::Password => "password",
            ConnectField::Port => "port",
        }
    }

    /// Name of the configuration variable.
    pub const fn env_var(self) -> &'static str {
        match self {
            ConnectField::Host => "REDSHIFT_HOST",
            ConnectField::Database => "REDSHIFT_DATABASE",
            ConnectField::User => "REDSHIFT_USER",
            ConnectField::Password => "REDSHIFT_PASSWORD",
            ConnectField::Port => "REDSHIFT_PORT",
        }
    }
}

impl fmt::Display for ConnectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (or {} env var)", self.arg_name(), self.env_var())
    }
}

/// Explicit connection arguments supplied by a caller. Any may be omitted.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectArgs {
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
}

impl fmt::Debug for ConnectArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectArgs")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .finish()
    }
}

/// Something that may supply connection parameters.
pub trait ParamSource {
    fn lookup(&self, field: ConnectField) -> Option<String>;
}

impl ParamSource for ConnectArgs {
    fn lookup(&self, field: ConnectField) -> Option<String> {
        match field {
            ConnectField::Host => self.host.clone(),
            ConnectField::Database => self.database.clone(),
            ConnectField::User => self.user.clone(),
            ConnectField::Password => self.password.clone(),
            // Port 0 counts as not given, like an empty string.
            ConnectField::Port => self.port.filter(|&p| p != 0).map(|p| p.to_string()),
        }
    }
}

/// Adapts a [`ConfigSource`] to supply parameters from the `REDSHIFT_*` variables.
pub struct FromConfig<'a, S: ?Sized>(pub &'a S);

impl<S: ConfigSource + ?Sized> ParamSource for FromConfig<'_, S> {
    fn lookup(&self, field: ConnectField) -> Option<String> {
        self.0.var(field.env_var())
    }
}

/// First non-empty value for `field` across `sources`, in priority order.
pub fn resolve(field: ConnectField, sources: &[&dyn ParamSource]) -> Option<String> {
    sources
        .iter()
        .filter_map(|source| source.lookup(field))
        .find(|value| !value.is_empty())
}

/// Resolve full connection parameters.
///
/// Reports every unresolved required field at once. The port defaults to
/// 5439; an unparsable port is a configuration error.
pub fn resolve_params(sources: &[&dyn ParamSource]) -> Result<ConnectParams, GatewayError> {
    let mut values = Vec::with_capacity(ConnectField::REQUIRED.len());
    let mut missing = Vec::new();
    for field in ConnectField::REQUIRED {
        match resolve(field, sources) {
            Some(value) => values.push(value),
            None => missing.push(field),
        }
    }
    if !missing.is_empty() {
        return Err(GatewayError::MissingParameters(missing));
    }

    let port = match resolve(ConnectField::Port, sources) {
        None => ConnectParams::DEFAULT_PORT,
        Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
            GatewayError::Driver(Error::Config(ConfigError {
                message: format!("invalid port {raw:?}: {e}"),
                source: Some(Box::new(e)),
            }))
        })?,
    };

    let [host, database, user, password]: [String; 4] = values
        .try_into()
        .map_err(|_| GatewayError::MissingParameters(ConnectField::REQUIRED.to_vec()))?;
    Ok(ConnectParams::new(host, database, user, password).port(port))
}

/// Whether `config` alone carries every required connection parameter.
pub fn has_connection_config<S: ConfigSource + ?Sized>(config: &S) -> bool {
    let from_config = FromConfig(config);
    ConnectField::REQUIRED
        .iter()
        .all(|&field| resolve(field, &[&from_config]).is_some())
}
