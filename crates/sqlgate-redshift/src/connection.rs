//! Async Redshift connection.
//!
//! Implements the core `DriverConnection` trait over asupersync's TCP stream:
//! - connect + authentication (cleartext, MD5, SCRAM-SHA-256)
//! - extended query protocol with text-format parameters and results
//! - DB-API transactions: unless autocommit is on, the first statement run
//!   while the server is idle opens a transaction with `BEGIN`, which stays
//!   open until `commit` or `rollback`

// Allow `impl Future` return types in trait methods - intentional for async trait compat
#![allow(clippy::manual_async_fn)]
// The Error type is intentionally large to carry full context
#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::{Cx, Outcome};

use sqlgate_core::error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind};
use sqlgate_core::{
    ColumnInfo, ConnectParams, Driver, DriverConnection, Error, Row, StatementResult, Value,
};

use crate::auth::{SCRAM_SHA_256, ScramClient, md5_password};
use crate::config::RedshiftConfig;
use crate::placeholder;
use crate::protocol::{
    BackendMessage, DescribeKind, ErrorFields, FieldDescription, FrontendMessage, MessageReader,
    MessageWriter, PROTOCOL_VERSION, TransactionStatus,
};
use crate::types::{TEXT_FORMAT, decode_text, encode_text};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    /// Ready for a statement, with the server's last reported transaction status
    Ready(TransactionStatus),
    /// Broken by an I/O or protocol failure
    Error,
    Closed,
}

/// An open connection to a Redshift cluster.
pub struct RedshiftConnection {
    stream: TcpStream,
    state: ConnectionState,
    process_id: i32,
    parameters: HashMap<String, String>,
    config: RedshiftConfig,
    reader: MessageReader,
    writer: MessageWriter,
    read_buf: Vec<u8>,
}

impl std::fmt::Debug for RedshiftConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedshiftConnection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl RedshiftConnection {
    /// Establish a new connection and authenticate.
    pub async fn connect(cx: &Cx, config: RedshiftConfig) -> Outcome<Self, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        match Self::establish(config).await {
            Ok(conn) => Outcome::Ok(conn),
            Err(e) => Outcome::Err(e),
        }
    }

    async fn establish(config: RedshiftConfig) -> Result<Self, Error> {
        let stream = open_stream(&config).await?;
        stream.set_nodelay(true).ok();

        let mut conn = Self {
            stream,
            state: ConnectionState::Connecting,
            process_id: 0,
            parameters: HashMap::new(),
            config,
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            read_buf: vec![0u8; 8192],
        };

        conn.send(&[FrontendMessage::Startup {
            version: PROTOCOL_VERSION,
            params: conn.config.startup_params(),
        }])
        .await?;
        conn.state = ConnectionState::Authenticating;
        conn.authenticate().await?;
        conn.read_startup_messages().await?;

        tracing::info!(
            host = %conn.config.host,
            port = conn.config.port,
            database = %conn.config.database,
            process_id = conn.process_id,
            server_version = conn.server_version().unwrap_or("unknown"),
            "Connected to Redshift"
        );
        Ok(conn)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transaction status from the last ReadyForQuery, if the connection is usable.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        match self.state {
            ConnectionState::Ready(status) => Some(status),
            _ => None,
        }
    }

    /// Backend process id reported at startup.
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// A server parameter reported via ParameterStatus (e.g. `server_version`).
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn server_version(&self) -> Option<&str> {
        self.parameter("server_version")
    }

    // ==================== Statements ====================

    async fn run_statement(&mut self, sql: &str, params: &[Value]) -> Result<StatementResult, Error> {
        self.ensure_usable()?;

        if !self.config.autocommit && self.transaction_status() == Some(TransactionStatus::Idle) {
            tracing::trace!("opening implicit transaction");
            self.simple_query("BEGIN").await?;
        }

        let text = if params.is_empty() {
            sql.to_string()
        } else {
            placeholder::translate(sql, params.len())?
        };

        let mut param_types = Vec::with_capacity(params.len());
        let mut param_values = Vec::with_capacity(params.len());
        for value in params {
            let (bytes, oid) = encode_text(value);
            param_types.push(oid);
            param_values.push(bytes);
        }
        let param_formats = if params.is_empty() {
            Vec::new()
        } else {
            vec![TEXT_FORMAT]
        };

        tracing::trace!(sql = %text, params = params.len(), "executing statement");
        self.send(&[
            FrontendMessage::Parse {
                name: String::new(),
                query: text,
                param_types,
            },
            FrontendMessage::Bind {
                portal: String::new(),
                statement: String::new(),
                param_formats,
                params: param_values,
                result_formats: Vec::new(),
            },
            FrontendMessage::Describe {
                kind: DescribeKind::Portal,
                name: String::new(),
            },
            FrontendMessage::Execute {
                portal: String::new(),
                max_rows: 0,
            },
            FrontendMessage::Sync,
        ])
        .await?;

        let response = self.read_response().await.map_err(|e| with_sql(e, sql))?;
        let rows_affected = parse_rows_affected(response.command_tag.as_deref());
        tracing::debug!(
            rows = response.rows.len(),
            tag = response.command_tag.as_deref().unwrap_or(""),
            "statement complete"
        );

        Ok(StatementResult {
            columns: response.columns.map(|c| c.names().to_vec()),
            rows: response.rows,
            rows_affected,
        })
    }

    /// Run a parameterless statement through the simple query protocol.
    async fn simple_query(&mut self, sql: &str) -> Result<Response, Error> {
        self.send(&[FrontendMessage::Query(sql.to_string())]).await?;
        self.read_response().await.map_err(|e| with_sql(e, sql))
    }

    async fn finish_transaction(&mut self, statement: &'static str) -> Result<(), Error> {
        self.ensure_usable()?;
        if self.transaction_status() == Some(TransactionStatus::Idle) {
            return Ok(());
        }
        let response = self.simple_query(statement).await?;
        tracing::debug!(statement, "transaction finished");

        // COMMIT of an aborted transaction is answered with a ROLLBACK tag.
        if statement == "COMMIT" && response.command_tag.as_deref() == Some("ROLLBACK") {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: Some(statement.to_string()),
                sqlstate: None,
                message: "transaction was aborted and has been rolled back".to_string(),
                detail: None,
                hint: None,
                position: None,
            }));
        }
        Ok(())
    }

    async fn terminate(&mut self) -> Result<(), Error> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        // Best-effort: the socket is closed when the connection drops either way.
        let sent = self.send(&[FrontendMessage::Terminate]).await;
        self.state = ConnectionState::Closed;
        tracing::debug!(process_id = self.process_id, "connection closed");
        match sent {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_error() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn ensure_usable(&self) -> Result<(), Error> {
        match self.state {
            ConnectionState::Ready(_) => Ok(()),
            ConnectionState::Closed => Err(disconnected("connection is closed")),
            other => Err(disconnected(format!("connection is not usable ({other:?})"))),
        }
    }

    async fn read_response(&mut self) -> Result<Response, Error> {
        let mut collector = ResponseCollector::default();
        loop {
            let msg = self.receive().await?;
            match msg {
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                other => {
                    if let Some(status) = collector.handle(other)? {
                        self.state = ConnectionState::Ready(status);
                        return collector.finish();
                    }
                }
            }
        }
    }

    // ==================== Startup ====================

    fn require_password(&self) -> Result<&str, Error> {
        self.config
            .password
            .as_deref()
            .ok_or_else(|| crate::auth::auth_error("server requested a password but none was provided"))
    }

    async fn authenticate(&mut self) -> Result<(), Error> {
        loop {
            match self.receive().await? {
                BackendMessage::AuthenticationOk => return Ok(()),
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = self.require_password()?.to_string();
                    self.send(&[FrontendMessage::PasswordMessage(password)]).await?;
                }
                BackendMessage::AuthenticationMD5Password(salt) => {
                    let hash = md5_password(&self.config.user, self.require_password()?, salt);
                    self.send(&[FrontendMessage::PasswordMessage(hash)]).await?;
                }
                BackendMessage::AuthenticationSASL(mechanisms) => {
                    if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                        return Err(crate::auth::auth_error(format!(
                            "unsupported SASL mechanisms: {mechanisms:?}"
                        )));
                    }
                    self.scram_auth().await?;
                }
                BackendMessage::ErrorResponse(fields) => {
                    self.state = ConnectionState::Error;
                    return Err(error_from_fields(&fields));
                }
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected message during authentication: {other:?}"
                    )));
                }
            }
        }
    }

    async fn scram_auth(&mut self) -> Result<(), Error> {
        let mut client = ScramClient::new(&self.config.user, self.require_password()?);

        self.send(&[FrontendMessage::SASLInitialResponse {
            mechanism: SCRAM_SHA_256.to_string(),
            data: client.client_first(),
        }])
        .await?;

        let server_first = match self.receive().await? {
            BackendMessage::AuthenticationSASLContinue(data) => data,
            BackendMessage::ErrorResponse(fields) => return Err(error_from_fields(&fields)),
            other => {
                return Err(Error::protocol(format!(
                    "expected SASL continue, got: {other:?}"
                )));
            }
        };
        let client_final = client.process_server_first(&server_first)?;
        self.send(&[FrontendMessage::SASLResponse(client_final)]).await?;

        match self.receive().await? {
            BackendMessage::AuthenticationSASLFinal(data) => client.verify_server_final(&data),
            BackendMessage::ErrorResponse(fields) => Err(error_from_fields(&fields)),
            other => Err(Error::protocol(format!(
                "expected SASL final, got: {other:?}"
            ))),
        }
        // AuthenticationOk follows and is consumed by `authenticate`.
    }

    async fn read_startup_messages(&mut self) -> Result<(), Error> {
        loop {
            match self.receive().await? {
                BackendMessage::BackendKeyData { process_id, .. } => {
                    self.process_id = process_id;
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.state = ConnectionState::Ready(status);
                    return Ok(());
                }
                BackendMessage::ErrorResponse(fields) => {
                    self.state = ConnectionState::Error;
                    return Err(error_from_fields(&fields));
                }
                BackendMessage::NoticeResponse(notice) => log_notice(&notice),
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected startup message: {other:?}"
                    )));
                }
            }
        }
    }

    // ==================== I/O ====================

    async fn send(&mut self, messages: &[FrontendMessage]) -> Result<(), Error> {
        let mut batch = Vec::new();
        for msg in messages {
            batch.extend_from_slice(self.writer.write(msg));
        }

        if let Err(e) = write_all(&mut self.stream, &batch).await {
            self.state = ConnectionState::Error;
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: format!("Failed to write to server: {e}"),
                source: Some(Box::new(e)),
            }));
        }
        if let Err(e) = flush(&mut self.stream).await {
            self.state = ConnectionState::Error;
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: format!("Failed to flush stream: {e}"),
                source: Some(Box::new(e)),
            }));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<BackendMessage, Error> {
        loop {
            match self.reader.next_message() {
                Ok(Some(msg)) => return Ok(msg),
                Ok(None) => {}
                Err(e) => {
                    self.state = ConnectionState::Error;
                    return Err(e);
                }
            }

            let n = match read_some(&mut self.stream, &mut self.read_buf).await {
                Ok(n) => n,
                Err(e) => {
                    self.state = ConnectionState::Error;
                    return Err(match e.kind() {
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                            Error::Timeout
                        }
                        _ => Error::Connection(ConnectionError {
                            kind: ConnectionErrorKind::Disconnected,
                            message: format!("Failed to read from server: {e}"),
                            source: Some(Box::new(e)),
                        }),
                    });
                }
            };

            if n == 0 {
                self.state = ConnectionState::Closed;
                return Err(disconnected("Connection closed by server"));
            }
            self.reader.feed(&self.read_buf[..n]);
        }
    }
}

impl DriverConnection for RedshiftConnection {
    fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<StatementResult, Error>> + Send {
        async move {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            into_outcome(self.run_statement(sql, params).await)
        }
    }

    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            into_outcome(self.finish_transaction("COMMIT").await)
        }
    }

    /// Rollback is cleanup and runs even when `cx` has been cancelled.
    fn rollback(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { into_outcome(self.finish_transaction("ROLLBACK").await) }
    }

    fn close(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move { into_outcome(self.terminate().await) }
    }
}

/// Opens [`RedshiftConnection`]s from gateway connection parameters.
///
/// Settings not carried by `ConnectParams` (timeout, application name,
/// autocommit, extra startup options) come from the template configuration.
#[derive(Debug, Clone, Default)]
pub struct RedshiftDriver {
    template: RedshiftConfig,
}

impl RedshiftDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `template` for every setting other than host, port, database,
    /// user and password.
    pub fn with_config(template: RedshiftConfig) -> Self {
        Self { template }
    }

    fn config_for(&self, params: &ConnectParams) -> RedshiftConfig {
        RedshiftConfig {
            host: params.host.clone(),
            port: params.port,
            user: params.user.clone(),
            password: Some(params.password.clone()),
            database: params.database.clone(),
            ..self.template.clone()
        }
    }
}

impl Driver for RedshiftDriver {
    type Conn = RedshiftConnection;

    fn connect(
        &self,
        cx: &Cx,
        params: &ConnectParams,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        let config = self.config_for(params);
        async move { RedshiftConnection::connect(cx, config).await }
    }
}

// ==================== Response handling ====================

/// Everything the server sent for one statement, up to ReadyForQuery.
#[derive(Debug, Default)]
struct Response {
    columns: Option<Arc<ColumnInfo>>,
    rows: Vec<Row>,
    command_tag: Option<String>,
}

/// Folds backend messages into a [`Response`].
///
/// After an ErrorResponse the server discards the rest of the statement and
/// still sends ReadyForQuery; the error is held until then so the stream
/// stays in sync.
#[derive(Debug, Default)]
struct ResponseCollector {
    fields: Vec<FieldDescription>,
    response: Response,
    error: Option<Error>,
}

impl ResponseCollector {
    /// Consume one message; returns the transaction status once the server is ready.
    fn handle(&mut self, msg: BackendMessage) -> Result<Option<TransactionStatus>, Error> {
        match msg {
            BackendMessage::ReadyForQuery(status) => return Ok(Some(status)),
            BackendMessage::RowDescription(fields) => {
                let names = fields.iter().map(|f| f.name.clone()).collect();
                self.response.columns = Some(Arc::new(ColumnInfo::new(names)));
                self.fields = fields;
            }
            BackendMessage::DataRow(raw) => {
                if self.error.is_none() {
                    if let Err(e) = self.push_row(raw) {
                        self.error = Some(e);
                    }
                }
            }
            BackendMessage::CommandComplete(tag) => self.response.command_tag = Some(tag),
            BackendMessage::ErrorResponse(fields) => {
                // Keep the first error; later ones are consequences of it.
                if self.error.is_none() {
                    self.error = Some(error_from_fields(&fields));
                }
            }
            BackendMessage::NoticeResponse(notice) => log_notice(&notice),
            BackendMessage::ParseComplete
            | BackendMessage::BindComplete
            | BackendMessage::CloseComplete
            | BackendMessage::NoData
            | BackendMessage::ParameterDescription(_)
            | BackendMessage::PortalSuspended
            | BackendMessage::EmptyQueryResponse
            | BackendMessage::ParameterStatus { .. }
            | BackendMessage::NotificationResponse { .. } => {}
            other => {
                return Err(Error::protocol(format!(
                    "unexpected message in query response: {other:?}"
                )));
            }
        }
        Ok(None)
    }

    fn push_row(&mut self, raw: Vec<Option<Vec<u8>>>) -> Result<(), Error> {
        let Some(columns) = &self.response.columns else {
            return Err(Error::protocol("DataRow received before RowDescription"));
        };
        if raw.len() != self.fields.len() {
            return Err(Error::protocol(format!(
                "DataRow has {} fields, RowDescription has {}",
                raw.len(),
                self.fields.len()
            )));
        }

        let mut values = Vec::with_capacity(raw.len());
        for (field, cell) in self.fields.iter().zip(raw) {
            if field.format != TEXT_FORMAT {
                return Err(Error::protocol(format!(
                    "column '{}' arrived in unsupported format {}",
                    field.name, field.format
                )));
            }
            let value = decode_text(field.type_oid, cell.as_deref()).map_err(|e| match e {
                Error::Type(mut te) => {
                    te.column = Some(field.name.clone());
                    Error::Type(te)
                }
                other => other,
            })?;
            values.push(value);
        }
        self.response.rows.push(Row::with_columns(Arc::clone(columns), values));
        Ok(())
    }

    fn finish(self) -> Result<Response, Error> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.response),
        }
    }
}

// ==================== Helpers ====================

async fn open_stream(config: &RedshiftConfig) -> Result<TcpStream, Error> {
    let addr = config.socket_addr();
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|e| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::DnsResolution,
                message: format!("Failed to resolve {addr}: {e}"),
                source: Some(Box::new(e)),
            })
        })?
        .collect();

    let mut last_error = None;
    for socket_addr in candidates {
        match TcpStream::connect_timeout(socket_addr, config.connect_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%socket_addr, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let Some(e) = last_error else {
        return Err(Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::DnsResolution,
            message: format!("{addr} did not resolve to any address"),
            source: None,
        }));
    };
    let kind = if e.kind() == std::io::ErrorKind::ConnectionRefused {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Connect
    };
    Err(Error::Connection(ConnectionError {
        kind,
        message: format!("Failed to connect to {addr}: {e}"),
        source: Some(Box::new(e)),
    }))
}

async fn read_some(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut read_buf = ReadBuf::new(buf);
    std::future::poll_fn(|cx| std::pin::Pin::new(&mut *stream).poll_read(cx, &mut read_buf))
        .await?;
    Ok(read_buf.filled().len())
}

async fn write_all(stream: &mut TcpStream, buf: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        let n = std::future::poll_fn(|cx| {
            std::pin::Pin::new(&mut *stream).poll_write(cx, &buf[written..])
        })
        .await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed",
            ));
        }
        written += n;
    }
    Ok(())
}

async fn flush(stream: &mut TcpStream) -> std::io::Result<()> {
    std::future::poll_fn(|cx| std::pin::Pin::new(&mut *stream).poll_flush(cx)).await
}

fn into_outcome<T>(result: Result<T, Error>) -> Outcome<T, Error> {
    match result {
        Ok(v) => Outcome::Ok(v),
        Err(e) => Outcome::Err(e),
    }
}

fn log_notice(notice: &ErrorFields) {
    tracing::debug!(
        severity = %notice.severity,
        code = %notice.code,
        message = %notice.message,
        "server notice"
    );
}

fn disconnected(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Disconnected,
        message: msg.into(),
        source: None,
    })
}

fn with_sql(err: Error, sql: &str) -> Error {
    match err {
        Error::Query(mut q) => {
            q.sql.get_or_insert_with(|| sql.to_string());
            Error::Query(q)
        }
        other => other,
    }
}

fn error_from_fields(fields: &ErrorFields) -> Error {
    let kind = match fields.code.get(..2) {
        Some("08") => {
            return Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: fields.message.clone(),
                source: None,
            });
        }
        Some("28") => {
            return Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Authentication,
                message: fields.message.clone(),
                source: None,
            });
        }
        Some("42") => QueryErrorKind::Syntax,
        Some("23") => QueryErrorKind::Constraint,
        Some("40") => {
            if fields.code == "40001" {
                QueryErrorKind::Serialization
            } else {
                QueryErrorKind::Deadlock
            }
        }
        Some("57") => {
            if fields.code == "57014" {
                QueryErrorKind::Cancelled
            } else {
                QueryErrorKind::Timeout
            }
        }
        _ => QueryErrorKind::Database,
    };

    Error::Query(QueryError {
        kind,
        sql: None,
        sqlstate: Some(fields.code.clone()),
        message: fields.message.clone(),
        detail: fields.detail.clone(),
        hint: fields.hint.clone(),
        position: fields.position.map(|p| p as usize),
    })
}

/// Row count from a command tag: its last token, when numeric.
fn parse_rows_affected(tag: Option<&str>) -> Option<u64> {
    tag?.split_whitespace().next_back()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::oid;

    fn field(name: &str, type_oid: u32) -> FieldDescription {
        FieldDescription {
            name: name.to_string(),
            table_oid: 0,
            column_id: 0,
            type_oid,
            type_size: -1,
            type_modifier: -1,
            format: TEXT_FORMAT,
        }
    }

    fn error_fields(code: &str, message: &str) -> ErrorFields {
        ErrorFields {
            severity: "ERROR".to_string(),
            code: code.to_string(),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_affected_from_tag() {
        assert_eq!(parse_rows_affected(Some("INSERT 0 3")), Some(3));
        assert_eq!(parse_rows_affected(Some("SELECT 2")), Some(2));
        assert_eq!(parse_rows_affected(Some("UPDATE 0")), Some(0));
        assert_eq!(parse_rows_affected(Some("CREATE TABLE")), None);
        assert_eq!(parse_rows_affected(None), None);
    }

    #[test]
    fn test_error_classification() {
        let err = error_from_fields(&error_fields("23505", "unique violation"));
        assert!(matches!(&err, Error::Query(q) if q.kind == QueryErrorKind::Constraint));
        assert_eq!(err.sqlstate(), Some("23505"));

        let err = error_from_fields(&error_fields("28P01", "password authentication failed"));
        assert!(matches!(
            err,
            Error::Connection(c) if c.kind == ConnectionErrorKind::Authentication
        ));

        let err = error_from_fields(&error_fields("42P01", "relation does not exist"));
        assert!(matches!(&err, Error::Query(q) if q.kind == QueryErrorKind::Syntax));
        assert!(matches!(
            with_sql(err, "SELECT * FROM nope"),
            Error::Query(q) if q.sql.as_deref() == Some("SELECT * FROM nope")
        ));

        let err = error_from_fields(&error_fields("57014", "canceling statement"));
        assert!(matches!(err, Error::Query(q) if q.kind == QueryErrorKind::Cancelled));
    }

    #[test]
    fn test_collector_builds_rows() {
        let mut collector = ResponseCollector::default();
        let msgs = vec![
            BackendMessage::ParseComplete,
            BackendMessage::BindComplete,
            BackendMessage::RowDescription(vec![field("id", oid::INT4), field("name", oid::VARCHAR)]),
            BackendMessage::DataRow(vec![Some(b"1".to_vec()), Some(b"Test Record".to_vec())]),
            BackendMessage::DataRow(vec![Some(b"2".to_vec()), None]),
            BackendMessage::CommandComplete("SELECT 2".to_string()),
        ];
        for msg in msgs {
            assert_eq!(collector.handle(msg).unwrap(), None);
        }
        let status = collector
            .handle(BackendMessage::ReadyForQuery(TransactionStatus::InTransaction))
            .unwrap();
        assert_eq!(status, Some(TransactionStatus::InTransaction));

        let response = collector.finish().unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.rows[0].get_by_name("name"), Some(&Value::Text("Test Record".into())));
        assert_eq!(response.rows[1].get(1), Some(&Value::Null));
        assert_eq!(response.command_tag.as_deref(), Some("SELECT 2"));
        assert_eq!(
            response.columns.map(|c| c.names().to_vec()),
            Some(vec!["id".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn test_collector_holds_error_until_ready() {
        let mut collector = ResponseCollector::default();
        collector
            .handle(BackendMessage::ErrorResponse(error_fields("42601", "syntax error")))
            .unwrap();
        assert_eq!(
            collector
                .handle(BackendMessage::ReadyForQuery(TransactionStatus::Failed))
                .unwrap(),
            Some(TransactionStatus::Failed)
        );
        let err = collector.finish().unwrap_err();
        assert_eq!(err.sqlstate(), Some("42601"));
    }

    #[test]
    fn test_collector_without_row_description() {
        let mut collector = ResponseCollector::default();
        collector.handle(BackendMessage::NoData).unwrap();
        collector
            .handle(BackendMessage::CommandComplete("CREATE TABLE".to_string()))
            .unwrap();
        collector
            .handle(BackendMessage::ReadyForQuery(TransactionStatus::InTransaction))
            .unwrap();
        let response = collector.finish().unwrap();
        assert!(response.columns.is_none());
        assert!(response.rows.is_empty());
        assert_eq!(parse_rows_affected(response.command_tag.as_deref()), None);
    }

    #[test]
    fn test_collector_rejects_bad_rows() {
        let mut collector = ResponseCollector::default();
        collector
            .handle(BackendMessage::DataRow(vec![Some(b"1".to_vec())]))
            .unwrap();
        collector
            .handle(BackendMessage::ReadyForQuery(TransactionStatus::Idle))
            .unwrap();
        assert!(collector.finish().is_err());

        let mut collector = ResponseCollector::default();
        collector
            .handle(BackendMessage::RowDescription(vec![field("n", oid::INT4)]))
            .unwrap();
        collector
            .handle(BackendMessage::DataRow(vec![Some(b"abc".to_vec())]))
            .unwrap();
        collector
            .handle(BackendMessage::ReadyForQuery(TransactionStatus::Idle))
            .unwrap();
        match collector.finish() {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("n")),
            other => panic!("expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_driver_applies_template() {
        let driver = RedshiftDriver::with_config(
            RedshiftConfig::default()
                .autocommit(true)
                .application_name("reports"),
        );
        let config = driver.config_for(&ConnectParams::new("h", "dev", "awsuser", "pw").port(5440));
        assert_eq!(config.host, "h");
        assert_eq!(config.port, 5440);
        assert_eq!(config.database, "dev");
        assert_eq!(config.user, "awsuser");
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert!(config.autocommit);
        assert_eq!(config.application_name.as_deref(), Some("reports"));
    }
}
