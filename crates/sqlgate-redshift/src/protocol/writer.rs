//! Frontend message encoder.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use super::{DescribeKind, FrontendMessage, frontend_type};

/// Buffer that encodes frontend messages.
///
/// Every message is framed as `type byte + i32 length + body`, except
/// Startup which has no type byte. Integers are big-endian.
#[derive(Debug, Clone, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(1024),
        }
    }

    /// Encode `msg`, replacing the previous contents, and return the bytes.
    pub fn write(&mut self, msg: &FrontendMessage) -> &[u8] {
        self.buf.clear();

        match msg {
            FrontendMessage::Startup { version, params } => {
                let start = self.begin_untyped();
                self.put_i32(*version);
                for (key, value) in params {
                    self.put_cstr(key);
                    self.put_cstr(value);
                }
                self.buf.push(0);
                self.finish(start);
            }
            FrontendMessage::PasswordMessage(password) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(password);
                self.finish(start);
            }
            FrontendMessage::SASLInitialResponse { mechanism, data } => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(mechanism);
                if data.is_empty() {
                    self.put_i32(-1);
                } else {
                    self.put_i32(data.len() as i32);
                    self.buf.extend_from_slice(data);
                }
                self.finish(start);
            }
            FrontendMessage::SASLResponse(data) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.buf.extend_from_slice(data);
                self.finish(start);
            }
            FrontendMessage::Query(sql) => {
                let start = self.begin(frontend_type::QUERY);
                self.put_cstr(sql);
                self.finish(start);
            }
            FrontendMessage::Parse {
                name,
                query,
                param_types,
            } => {
                let start = self.begin(frontend_type::PARSE);
                self.put_cstr(name);
                self.put_cstr(query);
                self.put_i16(param_types.len() as i16);
                for oid in param_types {
                    self.buf.extend_from_slice(&oid.to_be_bytes());
                }
                self.finish(start);
            }
            FrontendMessage::Bind {
                portal,
                statement,
                param_formats,
                params,
                result_formats,
            } => {
                let start = self.begin(frontend_type::BIND);
                self.put_cstr(portal);
                self.put_cstr(statement);
                self.put_i16(param_formats.len() as i16);
                for &fmt in param_formats {
                    self.put_i16(fmt);
                }
                self.put_i16(params.len() as i16);
                for param in params {
                    match param {
                        Some(data) => {
                            self.put_i32(data.len() as i32);
                            self.buf.extend_from_slice(data);
                        }
                        None => self.put_i32(-1),
                    }
                }
                self.put_i16(result_formats.len() as i16);
                for &fmt in result_formats {
                    self.put_i16(fmt);
                }
                self.finish(start);
            }
            FrontendMessage::Describe { kind, name } => {
                self.write_targeted(frontend_type::DESCRIBE, *kind, name);
            }
            FrontendMessage::Execute { portal, max_rows } => {
                let start = self.begin(frontend_type::EXECUTE);
                self.put_cstr(portal);
                self.put_i32(*max_rows);
                self.finish(start);
            }
            FrontendMessage::Sync => {
                let start = self.begin(frontend_type::SYNC);
                self.finish(start);
            }
            FrontendMessage::Terminate => {
                let start = self.begin(frontend_type::TERMINATE);
                self.finish(start);
            }
        }

        &self.buf
    }

    fn write_targeted(&mut self, type_byte: u8, kind: DescribeKind, name: &str) {
        let start = self.begin(type_byte);
        self.buf.push(kind.as_byte());
        self.put_cstr(name);
        self.finish(start);
    }

    /// Push the type byte and a length placeholder; returns the length offset.
    fn begin(&mut self, type_byte: u8) -> usize {
        self.buf.push(type_byte);
        self.begin_untyped()
    }

    fn begin_untyped(&mut self) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        start
    }

    /// Backfill the length, which counts itself but not the type byte.
    fn finish(&mut self, start: usize) {
        let len = (self.buf.len() - start) as i32;
        self.buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PROTOCOL_VERSION;

    #[test]
    fn test_startup_message() {
        let mut writer = MessageWriter::new();
        let data = writer
            .write(&FrontendMessage::Startup {
                version: PROTOCOL_VERSION,
                params: vec![("user".to_string(), "awsuser".to_string())],
            })
            .to_vec();

        // length(4) + version(4) + "user\0" + "awsuser\0" + terminator
        let expected_len = 4 + 4 + 5 + 8 + 1;
        assert_eq!(data.len(), expected_len);
        assert_eq!(&data[..4], &(expected_len as i32).to_be_bytes());
        assert_eq!(&data[4..8], &PROTOCOL_VERSION.to_be_bytes());
        assert_eq!(data.last(), Some(&0));
    }

    #[test]
    fn test_query_message() {
        let mut writer = MessageWriter::new();
        let data = writer.write(&FrontendMessage::Query("BEGIN".into())).to_vec();
        assert_eq!(data[0], b'Q');
        assert_eq!(&data[1..5], &10_i32.to_be_bytes());
        assert_eq!(&data[5..], b"BEGIN\0");
    }

    #[test]
    fn test_bind_with_null_param() {
        let mut writer = MessageWriter::new();
        let data = writer
            .write(&FrontendMessage::Bind {
                portal: String::new(),
                statement: String::new(),
                param_formats: vec![0],
                params: vec![Some(b"42".to_vec()), None],
                result_formats: Vec::new(),
            })
            .to_vec();

        assert_eq!(data[0], b'B');
        let len = i32::from_be_bytes([data[1], data[2], data[3], data[4]]);
        assert_eq!(len as usize, data.len() - 1);
        // portal\0 statement\0 | 1 format (0) | 2 params | "42" | NULL | 0 result formats
        let body = &data[5..];
        assert_eq!(&body[..2], &[0, 0]);
        assert_eq!(&body[2..4], &1_i16.to_be_bytes());
        assert_eq!(&body[4..6], &0_i16.to_be_bytes());
        assert_eq!(&body[6..8], &2_i16.to_be_bytes());
        assert_eq!(&body[8..12], &2_i32.to_be_bytes());
        assert_eq!(&body[12..14], b"42");
        assert_eq!(&body[14..18], &(-1_i32).to_be_bytes());
        assert_eq!(&body[18..20], &0_i16.to_be_bytes());
    }

    #[test]
    fn test_empty_messages() {
        let mut writer = MessageWriter::new();
        assert_eq!(writer.write(&FrontendMessage::Sync), &[b'S', 0, 0, 0, 4]);
        assert_eq!(
            writer.write(&FrontendMessage::Terminate),
            &[b'X', 0, 0, 0, 4]
        );
    }

    #[test]
    fn test_describe_portal() {
        let mut writer = MessageWriter::new();
        let data = writer.write(&FrontendMessage::Describe {
            kind: DescribeKind::Portal,
            name: String::new(),
        });
        assert_eq!(data, &[b'D', 0, 0, 0, 6, b'P', 0]);
    }
}
