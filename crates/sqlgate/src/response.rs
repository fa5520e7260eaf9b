//! Structured responses handed back to the transport.

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::error::GatewayError;
use crate::session::SessionInfo;

/// Top-level status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Connected,
    Disconnected,
    Error,
}

/// A JSON object with a `status` field plus payload fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: Status,
    #[serde(flatten)]
    pub body: Map<String, Json>,
}

impl Response {
    fn new(status: Status) -> Self {
        Self {
            status,
            body: Map::new(),
        }
    }

    /// A `success` response whose fields are those of `payload`.
    ///
    /// `payload` must serialize to a JSON object.
    pub fn success(payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(Json::Object(body)) => Self {
                status: Status::Success,
                body,
            },
            Ok(other) => Self::failure(
                &format!("response payload is not an object: {other}"),
                "driver_error",
            ),
            Err(e) => Self::failure(&format!("failed to serialize response: {e}"), "driver_error"),
        }
    }

    pub fn connected(info: &SessionInfo) -> Self {
        let mut response = Self::new(Status::Connected);
        response.insert("host", Json::String(info.host.clone()));
        response.insert("database", Json::String(info.database.clone()));
        response.insert("user", Json::String(info.user.clone()));
        response
    }

    pub fn disconnected() -> Self {
        Self::new(Status::Disconnected)
    }

    /// An `error` response carrying the message and its kind.
    pub fn error(err: &GatewayError) -> Self {
        let kind = serde_json::to_value(err.kind()).unwrap_or(Json::Null);
        let mut response = Self::new(Status::Error);
        response.insert("error", Json::String(err.to_string()));
        response.insert("error_kind", kind);
        response
    }

    fn failure(message: &str, kind: &str) -> Self {
        let mut response = Self::new(Status::Error);
        response.insert("error", Json::String(message.to_string()));
        response.insert("error_kind", Json::String(kind.to_string()));
        response
    }

    fn insert(&mut self, field: &str, value: Json) {
        self.body.insert(field.to_string(), value);
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// A payload field.
    pub fn get(&self, field: &str) -> Option<&Json> {
        self.body.get(field)
    }

    /// The whole response as one JSON object.
    pub fn to_json(&self) -> Json {
        let mut object = Map::with_capacity(self.body.len() + 1);
        object.insert(
            "status".to_string(),
            serde_json::to_value(self.status).unwrap_or(Json::Null),
        );
        for (key, value) in &self.body {
            object.insert(key.clone(), value.clone());
        }
        Json::Object(object)
    }
}

impl<T: Serialize, E: Into<GatewayError>> From<Result<T, E>> for Response {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(payload) => Response::success(payload),
            Err(e) => Response::error(&e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Payload {
        row_count: usize,
        columns: Vec<&'static str>,
    }

    #[test]
    fn test_success_flattens_payload() {
        let response = Response::success(Payload {
            row_count: 0,
            columns: vec!["a"],
        });
        assert_eq!(
            response.to_json(),
            json!({"status": "success", "row_count": 0, "columns": ["a"]})
        );
        assert_eq!(serde_json::to_value(&response).unwrap(), response.to_json());
    }

    #[test]
    fn test_non_object_payload_is_an_error() {
        let response = Response::success(42);
        assert!(response.is_error());
    }

    #[test]
    fn test_connected_never_carries_password() {
        let info = SessionInfo {
            host: "h".into(),
            database: "d".into(),
            user: "u".into(),
        };
        assert_eq!(
            Response::connected(&info).to_json(),
            json!({"status": "connected", "host": "h", "database": "d", "user": "u"})
        );
        assert_eq!(Response::disconnected().to_json(), json!({"status": "disconnected"}));
    }

    #[test]
    fn test_error_carries_message_and_kind() {
        let response = Response::error(&GatewayError::Forbidden("no".into()));
        assert_eq!(
            response.to_json(),
            json!({"status": "error", "error": "no", "error_kind": "forbidden"})
        );
    }
}
