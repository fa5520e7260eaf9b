//! Session manager: owns the single logical database connection.
//!
//! The session lives in an `Option` behind one asupersync `Mutex`, so a
//! connection and the cursor derived from it are always present or absent
//! together, and every session-touching operation runs to completion before
//! the next one starts.

use std::ops::DerefMut;

use asupersync::sync::Mutex;
use asupersync::{Cx, Outcome};
use serde::Serialize;
use sqlgate_core::error::{ConnectionError, ConnectionErrorKind};
use sqlgate_core::{Cursor, Driver, DriverConnection, Error};

use crate::config::{self, ConfigSource, ConnectArgs, FromConfig};
use crate::error::GatewayError;

/// Where the live session is connected. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub host: String,
    pub database: String,
    pub user: String,
}

/// A live connection together with its execution handle.
pub struct Session<C> {
    conn: C,
    cursor: Cursor,
    info: SessionInfo,
}

impl<C: DriverConnection> Session<C> {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Borrow the connection and the cursor at the same time.
    pub(crate) fn parts_mut(&mut self) -> (&mut C, &mut Cursor) {
        (&mut self.conn, &mut self.cursor)
    }
}

/// Owns at most one session and (re)establishes it on demand.
pub struct SessionManager<D: Driver, S> {
    driver: D,
    config: S,
    slot: Mutex<Option<Session<D::Conn>>>,
}

impl<D: Driver, S: ConfigSource> SessionManager<D, S> {
    pub fn new(driver: D, config: S) -> Self {
        Self {
            driver,
            config,
            slot: Mutex::new(None),
        }
    }

    /// Configuration consulted for connection parameters and the permission mode.
    pub fn config(&self) -> &S {
        &self.config
    }

    /// Connect with explicit arguments, falling back to configuration.
    ///
    /// Any existing session is closed first. On failure no session remains.
    #[tracing::instrument(level = "debug", skip_all, fields(host = ?args.host))]
    pub async fn connect(
        &self,
        cx: &Cx,
        args: &ConnectArgs,
    ) -> Result<SessionInfo, GatewayError> {
        let mut slot = self.lock(cx).await?;
        self.connect_in(cx, &mut slot, args).await
    }

    /// Connect from configuration alone, if it carries every required parameter.
    ///
    /// Does nothing when a session already exists. Returns the live session, if any.
    pub async fn auto_connect(&self, cx: &Cx) -> Result<Option<SessionInfo>, GatewayError> {
        let mut slot = self.lock(cx).await?;
        if slot.is_none() {
            self.auto_connect_in(cx, &mut slot).await;
        }
        Ok(slot.as_ref().map(|session| session.info.clone()))
    }

    /// Close and clear the session. Disconnecting twice is not an error.
    ///
    /// If closing fails the session is kept.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn disconnect(&self, cx: &Cx) -> Result<(), GatewayError> {
        let mut slot = self.lock(cx).await?;
        if let Some(session) = slot.as_mut() {
            if let Err(e) = settle(session.conn.close(cx).await) {
                tracing::error!(error = %e, "Disconnect failed");
                return Err(e.into());
            }
            tracing::info!(host = %session.info.host, "Disconnected");
            *slot = None;
        }
        Ok(())
    }

    /// Make sure a session exists, auto-connecting at most once.
    pub async fn ensure_connected(&self, cx: &Cx) -> Result<SessionInfo, GatewayError> {
        let mut slot = self.lock(cx).await?;
        let session = self.ensure_in(cx, &mut slot).await?;
        Ok(session.info.clone())
    }

    pub async fn is_connected(&self, cx: &Cx) -> bool {
        matches!(self.session_info(cx).await, Some(_))
    }

    pub async fn session_info(&self, cx: &Cx) -> Option<SessionInfo> {
        let slot = self.lock(cx).await.ok()?;
        slot.as_ref().map(|session| session.info.clone())
    }

    /// Take the session lock for the duration of one operation.
    pub(crate) async fn lock(
        &self,
        cx: &Cx,
    ) -> Result<impl DerefMut<Target = Option<Session<D::Conn>>> + '_, GatewayError> {
        self.slot.lock(cx).await.map_err(|_| {
            GatewayError::Driver(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Failed to acquire session lock".to_string(),
                source: None,
            }))
        })
    }

    /// The live session, auto-connecting first if there is none.
    pub(crate) async fn ensure_in<'s>(
        &self,
        cx: &Cx,
        slot: &'s mut Option<Session<D::Conn>>,
    ) -> Result<&'s mut Session<D::Conn>, GatewayError> {
        if slot.is_none() {
            self.auto_connect_in(cx, slot).await;
        }
        slot.as_mut().ok_or(GatewayError::NotConnected)
    }

    async fn connect_in(
        &self,
        cx: &Cx,
        slot: &mut Option<Session<D::Conn>>,
        args: &ConnectArgs,
    ) -> Result<SessionInfo, GatewayError> {
        let params = config::resolve_params(&[args, &FromConfig(&self.config)])?;

        if let Some(mut previous) = slot.take() {
            tracing::debug!(host = %previous.info.host, "Closing previous session");
            settle(previous.conn.close(cx).await)?;
        }

        let conn = match settle(self.driver.connect(cx, &params).await) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(host = %params.host, error = %e, "Connection failed");
                return Err(e.into());
            }
        };
        let cursor = conn.cursor();
        let info = SessionInfo {
            host: params.host,
            database: params.database,
            user: params.user,
        };
        tracing::info!(
            host = %info.host,
            database = %info.database,
            user = %info.user,
            "Connected"
        );
        *slot = Some(Session {
            conn,
            cursor,
            info: info.clone(),
        });
        Ok(info)
    }

    async fn auto_connect_in(&self, cx: &Cx, slot: &mut Option<Session<D::Conn>>) {
        if !config::has_connection_config(&self.config) {
            tracing::info!(
                "Connection variables not configured for auto-connection. Use connect_db to connect."
            );
            return;
        }

        tracing::info!("Auto-connecting from configuration");
        match self.connect_in(cx, slot, &ConnectArgs::default()).await {
            Ok(info) => {
                tracing::info!(host = %info.host, database = %info.database, "Auto-connected");
            }
            Err(e) => tracing::warn!(error = %e, "Auto-connection failed"),
        }
    }
}

/// Collapse an asupersync outcome into a plain driver result.
pub(crate) fn settle<T>(outcome: Outcome<T, Error>) -> Result<T, Error> {
    match outcome {
        Outcome::Ok(v) => Ok(v),
        Outcome::Err(e) => Err(e),
        Outcome::Cancelled(_) => Err(Error::Cancelled),
        Outcome::Panicked(p) => Err(Error::Custom(format!("driver panicked: {p:?}"))),
    }
}
