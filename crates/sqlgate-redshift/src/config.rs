//! Redshift connection configuration.

use std::collections::HashMap;
use std::time::Duration;

use sqlgate_core::ConnectParams;

/// Redshift connection configuration.
#[derive(Clone)]
pub struct RedshiftConfig {
    /// Cluster endpoint hostname or IP address
    pub host: String,
    /// Port number (default: 5439)
    pub port: u16,
    /// Username for authentication
    pub user: String,
    /// Password for authentication (optional for trust auth)
    pub password: Option<String>,
    /// Database name to connect to
    pub database: String,
    /// Application name (visible in stv_sessions / pg_stat_activity)
    pub application_name: Option<String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Additional startup parameters
    pub options: HashMap<String, String>,
    /// Commit after every statement instead of opening implicit transactions
    pub autocommit: bool,
}

impl Default for RedshiftConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: ConnectParams::DEFAULT_PORT,
            user: String::new(),
            password: None,
            database: String::new(),
            application_name: Some("sqlgate".to_string()),
            connect_timeout: Duration::from_secs(30),
            options: HashMap::new(),
            autocommit: false,
        }
    }
}

impl std::fmt::Debug for RedshiftConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedshiftConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("autocommit", &self.autocommit)
            .finish_non_exhaustive()
    }
}

impl RedshiftConfig {
    /// Create a new configuration with the given connection string components.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set an additional startup parameter.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Enable or disable autocommit.
    pub fn autocommit(mut self, on: bool) -> Self {
        self.autocommit = on;
        self
    }

    /// Build the startup parameters to send to the server.
    pub fn startup_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("user".to_string(), self.user.clone()),
            ("database".to_string(), self.database.clone()),
            ("client_encoding".to_string(), "UTF8".to_string()),
        ];

        if let Some(app_name) = &self.application_name {
            params.push(("application_name".to_string(), app_name.clone()));
        }

        for (k, v) in &self.options {
            params.push((k.clone(), v.clone()));
        }

        params
    }

    /// Get the `host:port` address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
