//! Statement executor: the read path (`query`) and the write path (`execute`).
//!
//! Both consult the permission gate before touching the session, so a
//! refused statement never reaches the driver.

use serde::Serialize;
use serde_json::{Map, Value as Json};
use sqlgate_core::{Cx, Driver, DriverConnection, Row, Value};

use crate::config::ConfigSource;
use crate::error::GatewayError;
use crate::mode::Mode;
use crate::permission::{self, Verdict};
use crate::session::{SessionManager, settle};

/// Rows returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReply {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub data: Vec<Map<String, Json>>,
}

/// Outcome of a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecuteReply {
    /// Driver-reported row count, `-1` when unknown
    pub rows_affected: i64,
}

/// Run the permission gate for `sql` under the currently configured mode.
pub fn check_permission<S: ConfigSource + ?Sized>(config: &S, sql: &str) -> Result<Mode, GatewayError> {
    let mode = Mode::from_config(config);
    match permission::classify(sql, mode) {
        Verdict::Allow => Ok(mode),
        Verdict::Deny { reason } => {
            tracing::warn!(%mode, reason = %reason, "Statement refused");
            Err(GatewayError::Forbidden(reason))
        }
    }
}

/// Run a read and normalize its rows into ordered JSON objects.
///
/// Never commits or rolls back.
#[tracing::instrument(level = "debug", skip_all, fields(params = params.len()))]
pub async fn query<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
    sql: &str,
    params: &[Value],
) -> Result<QueryReply, GatewayError> {
    let (columns, rows) = fetch(sessions, cx, sql, params).await?;
    let data: Vec<_> = rows.into_iter().map(|row| row_object(&columns, row)).collect();
    tracing::debug!(rows = data.len(), "Query complete");
    Ok(QueryReply {
        row_count: data.len(),
        columns,
        data,
    })
}

/// Run a write and commit it.
///
/// If the statement or the commit fails the transaction is rolled back
/// (a rollback failure is only logged) and the original error returned.
#[tracing::instrument(level = "debug", skip_all, fields(params = params.len()))]
pub async fn execute<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
    sql: &str,
    params: &[Value],
) -> Result<ExecuteReply, GatewayError> {
    check_permission(sessions.config(), sql)?;

    let mut slot = sessions.lock(cx).await?;
    let session = sessions.ensure_in(cx, &mut slot).await?;
    let (conn, cursor) = session.parts_mut();

    tracing::trace!(sql = %sql, "Executing statement");
    let result = match settle(cursor.execute(cx, conn, sql, params).await) {
        Ok(()) => settle(conn.commit(cx).await).map(|()| cursor.rowcount()),
        Err(e) => Err(e),
    };

    match result {
        Ok(rows_affected) => {
            tracing::debug!(rows_affected, "Statement committed");
            Ok(ExecuteReply { rows_affected })
        }
        Err(e) => {
            tracing::error!(error = %e, sqlstate = e.sqlstate(), "Execute failed");
            if let Err(rollback) = settle(conn.rollback(cx).await) {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            Err(e.into())
        }
    }
}

/// Gate, then execute `sql` and fetch every row with the column names.
pub(crate) async fn fetch<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
    sql: &str,
    params: &[Value],
) -> Result<(Vec<String>, Vec<Row>), GatewayError> {
    check_permission(sessions.config(), sql)?;

    let mut slot = sessions.lock(cx).await?;
    let session = sessions.ensure_in(cx, &mut slot).await?;
    let (conn, cursor) = session.parts_mut();

    tracing::trace!(sql = %sql, "Running query");
    if let Err(e) = settle(cursor.execute(cx, conn, sql, params).await) {
        tracing::error!(error = %e, sqlstate = e.sqlstate(), "Query failed");
        return Err(e.into());
    }

    let columns = cursor.description().map(<[String]>::to_vec).unwrap_or_default();
    Ok((columns, cursor.fetch_all()))
}

/// One row as a JSON object keyed by column name, in column order.
///
/// A repeated column name keeps its first position and takes the last value.
fn row_object(columns: &[String], row: Row) -> Map<String, Json> {
    let mut object = Map::with_capacity(columns.len());
    for (name, value) in columns.iter().zip(row.into_values()) {
        object.insert(name.clone(), value.to_json());
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::mode::MODE_VAR;
    use serde_json::json;

    #[test]
    fn test_row_object_preserves_order_and_last_duplicate() {
        let columns = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        let row = Row::new(
            columns.clone(),
            vec![Value::Int(1), Value::Text("x".into()), Value::Null],
        );
        let object = row_object(&columns, row);

        let keys: Vec<_> = object.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(Json::Object(object), json!({"b": null, "a": "x"}));
    }

    #[test]
    fn test_permission_uses_current_mode() {
        let config = MapConfig::new();
        assert!(matches!(
            check_permission(&config, "DROP TABLE t"),
            Err(GatewayError::Forbidden(_))
        ));
        config.set(MODE_VAR, "admin");
        assert_eq!(check_permission(&config, "DROP TABLE t").unwrap(), Mode::Admin);
    }
}
