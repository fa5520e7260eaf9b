//! Password authentication exchanges.

mod scram;

pub use scram::{MECHANISM as SCRAM_SHA_256, ScramClient};

use sqlgate_core::Error;
use sqlgate_core::error::{ConnectionError, ConnectionErrorKind};

/// Response to an MD5 password request: `"md5" + md5(md5(password + user) + salt)`.
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}").as_bytes());
    let mut outer_input = format!("{inner:x}").into_bytes();
    outer_input.extend_from_slice(&salt);
    format!("md5{:x}", md5::compute(&outer_input))
}

pub(crate) fn auth_error(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Authentication,
        message: msg.into(),
        source: None,
    })
}

pub(crate) fn protocol_error(msg: impl Into<String>) -> Error {
    Error::protocol(msg)
}
