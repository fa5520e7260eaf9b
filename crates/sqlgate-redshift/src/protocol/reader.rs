//! Backend message decoder.
//!
//! Bytes read from the socket are fed in arbitrary chunks; complete messages
//! are pulled out one at a time.

#![allow(clippy::cast_sign_loss)]

use sqlgate_core::Error;

use super::{BackendMessage, ErrorFields, FieldDescription, TransactionStatus, backend_type};

/// Upper bound on a single backend message.
const MAX_MESSAGE_LEN: usize = 1 << 30;

/// Incremental decoder for backend messages.
#[derive(Debug, Default)]
pub struct MessageReader {
    buf: Vec<u8>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(8192),
        }
    }

    /// Append raw bytes received from the server.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete message, or `None` if more bytes are needed.
    #[allow(clippy::result_large_err)]
    pub fn next_message(&mut self) -> Result<Option<BackendMessage>, Error> {
        if self.buf.len() < 5 {
            return Ok(None);
        }
        let type_byte = self.buf[0];
        let len = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        if len < 4 || len as usize > MAX_MESSAGE_LEN {
            return Err(Error::protocol(format!(
                "invalid length {len} for message type '{}'",
                char::from(type_byte)
            )));
        }
        let total = 1 + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let body: Vec<u8> = self.buf.drain(..total).skip(5).collect();
        parse_message(type_byte, &body).map(Some)
    }
}

#[allow(clippy::result_large_err)]
fn parse_message(type_byte: u8, body: &[u8]) -> Result<BackendMessage, Error> {
    let mut cur = Cursor::new(body);

    let msg = match type_byte {
        backend_type::AUTHENTICATION => match cur.i32()? {
            0 => BackendMessage::AuthenticationOk,
            3 => BackendMessage::AuthenticationCleartextPassword,
            5 => {
                let salt = cur.bytes(4)?;
                BackendMessage::AuthenticationMD5Password([salt[0], salt[1], salt[2], salt[3]])
            }
            10 => {
                let mut mechanisms = Vec::new();
                loop {
                    let name = cur.cstr()?;
                    if name.is_empty() {
                        break;
                    }
                    mechanisms.push(name);
                }
                BackendMessage::AuthenticationSASL(mechanisms)
            }
            11 => BackendMessage::AuthenticationSASLContinue(cur.rest().to_vec()),
            12 => BackendMessage::AuthenticationSASLFinal(cur.rest().to_vec()),
            other => {
                return Err(Error::protocol(format!(
                    "unsupported authentication request {other}"
                )));
            }
        },
        backend_type::PARAMETER_STATUS => BackendMessage::ParameterStatus {
            name: cur.cstr()?,
            value: cur.cstr()?,
        },
        backend_type::BACKEND_KEY_DATA => BackendMessage::BackendKeyData {
            process_id: cur.i32()?,
            secret_key: cur.i32()?,
        },
        backend_type::READY_FOR_QUERY => {
            let b = cur.u8()?;
            let status = TransactionStatus::from_byte(b).ok_or_else(|| {
                Error::protocol(format!("unknown transaction status '{}'", char::from(b)))
            })?;
            BackendMessage::ReadyForQuery(status)
        }
        backend_type::ROW_DESCRIPTION => {
            let count = cur.i16()?;
            let mut fields = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                fields.push(FieldDescription {
                    name: cur.cstr()?,
                    table_oid: cur.u32()?,
                    column_id: cur.i16()?,
                    type_oid: cur.u32()?,
                    type_size: cur.i16()?,
                    type_modifier: cur.i32()?,
                    format: cur.i16()?,
                });
            }
            BackendMessage::RowDescription(fields)
        }
        backend_type::DATA_ROW => {
            let count = cur.i16()?;
            let mut values = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                let len = cur.i32()?;
                if len < 0 {
                    values.push(None);
                } else {
                    values.push(Some(cur.bytes(len as usize)?.to_vec()));
                }
            }
            BackendMessage::DataRow(values)
        }
        backend_type::COMMAND_COMPLETE => BackendMessage::CommandComplete(cur.cstr()?),
        backend_type::EMPTY_QUERY => BackendMessage::EmptyQueryResponse,
        backend_type::ERROR_RESPONSE => BackendMessage::ErrorResponse(parse_fields(&mut cur)?),
        backend_type::NOTICE_RESPONSE => BackendMessage::NoticeResponse(parse_fields(&mut cur)?),
        backend_type::PARSE_COMPLETE => BackendMessage::ParseComplete,
        backend_type::BIND_COMPLETE => BackendMessage::BindComplete,
        backend_type::CLOSE_COMPLETE => BackendMessage::CloseComplete,
        backend_type::NO_DATA => BackendMessage::NoData,
        backend_type::PORTAL_SUSPENDED => BackendMessage::PortalSuspended,
        backend_type::PARAMETER_DESCRIPTION => {
            let count = cur.i16()?;
            let mut oids = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                oids.push(cur.u32()?);
            }
            BackendMessage::ParameterDescription(oids)
        }
        backend_type::NOTIFICATION => BackendMessage::NotificationResponse {
            process_id: cur.i32()?,
            channel: cur.cstr()?,
            payload: cur.cstr()?,
        },
        other => {
            return Err(Error::protocol(format!(
                "unexpected message type '{}'",
                char::from(other)
            )));
        }
    };

    Ok(msg)
}

#[allow(clippy::result_large_err)]
fn parse_fields(cur: &mut Cursor<'_>) -> Result<ErrorFields, Error> {
    let mut fields = ErrorFields::default();
    loop {
        let code = cur.u8()?;
        if code == 0 {
            break;
        }
        let value = cur.cstr()?;
        match code {
            // 'V' is the non-localized severity; prefer it when present.
            b'S' if fields.severity.is_empty() => fields.severity = value,
            b'V' => fields.severity = value,
            b'C' => fields.code = value,
            b'M' => fields.message = value,
            b'D' => fields.detail = Some(value),
            b'H' => fields.hint = Some(value),
            b'P' => fields.position = value.parse().ok(),
            _ => {}
        }
    }
    Ok(fields)
}

/// Bounds-checked reader over one message body.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

#[allow(clippy::result_large_err)]
impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::protocol("message truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.bytes(1)?[0])
    }

    fn i16(&mut self) -> Result<i16, Error> {
        let b = self.bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Result<i32, Error> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn cstr(&mut self) -> Result<String, Error> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::protocol("unterminated string in message"))?;
        let s = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(s)
    }
}
