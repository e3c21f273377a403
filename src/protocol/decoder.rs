//! Incremental RESP2 reply decoder.
//!
//! Hand-rolled rather than delegated to a third-party parsing crate, the
//! way a database client typically owns its own wire-format reader instead
//! of reaching for a generic one. `gets` either yields a fully decoded
//! reply or a `Pending` sentinel (an enum variant, not a value that could
//! collide with a legitimate reply), meaning more input is needed.

use crate::error::{Error, ReplyError};
use crate::opts::Encoding;

use super::reply::{Bulk, Reply};

/// Outcome of one [`Decoder::gets`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// The buffer does not yet contain a complete reply; feed more bytes.
    Pending,
    Reply(Reply),
}

/// A growable input buffer plus cursor, fed raw bytes and polled for
/// complete replies.
pub struct Decoder {
    encoding: Option<Encoding>,
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new(encoding: Option<Encoding>) -> Self {
        Self {
            encoding,
            buf: Vec::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempt to decode the next reply from the buffered input.
    ///
    /// Returns `Ok(DecodeOutcome::Pending)` without consuming anything if
    /// the buffer does not yet hold a complete frame. A classified server
    /// error reply is returned as `Ok(DecodeOutcome::Reply(Reply::Error(_)))`,
    /// not raised; raising it is `Connection::read_one`'s job. Framing
    /// violations are raised here as `Error::Protocol`.
    pub fn gets(&mut self) -> Result<DecodeOutcome, Error> {
        match parse_one(&self.buf, self.encoding)? {
            Some((reply, consumed)) => {
                self.buf.drain(..consumed);
                Ok(DecodeOutcome::Reply(reply))
            }
            None => Ok(DecodeOutcome::Pending),
        }
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn decode_text(bytes: &[u8], encoding: Option<Encoding>) -> Result<Bulk, Error> {
    match encoding {
        Some(Encoding::Utf8) | None => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Bulk::Text(s.to_string())),
            Err(_) => Ok(Bulk::Bytes(bytes.to_vec())),
        },
        Some(Encoding::Raw) => Ok(Bulk::Bytes(bytes.to_vec())),
    }
}

/// Parse one reply from the front of `data`. Returns `Ok(None)` if `data`
/// does not yet contain a complete frame. Never consumes malformed partial
/// input silently: an unrecognized type byte or a non-numeric length is a
/// protocol error, not "need more input".
fn parse_one(data: &[u8], encoding: Option<Encoding>) -> Result<Option<(Reply, usize)>, Error> {
    let Some(&tag) = data.first() else {
        return Ok(None);
    };

    match tag {
        b'+' => {
            let Some(pos) = find_crlf(&data[1..]) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(&data[1..1 + pos])
                .map_err(|_| Error::protocol("simple string is not valid UTF-8"))?
                .to_string();
            Ok(Some((Reply::SimpleString(text), 1 + pos + 2)))
        }
        b'-' => {
            let Some(pos) = find_crlf(&data[1..]) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(&data[1..1 + pos])
                .map_err(|_| Error::protocol("error reply is not valid UTF-8"))?
                .to_string();
            Ok(Some((Reply::Error(ReplyError(text)), 1 + pos + 2)))
        }
        b':' => {
            let Some(pos) = find_crlf(&data[1..]) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(&data[1..1 + pos])
                .map_err(|_| Error::protocol("integer reply is not valid UTF-8"))?;
            let value: i64 = text
                .parse()
                .map_err(|_| Error::protocol(format!("invalid integer reply: {text:?}")))?;
            Ok(Some((Reply::Integer(value), 1 + pos + 2)))
        }
        b'$' => {
            let Some(pos) = find_crlf(&data[1..]) else {
                return Ok(None);
            };
            let header_end = 1 + pos;
            let len_text = std::str::from_utf8(&data[1..header_end])
                .map_err(|_| Error::protocol("bulk length is not valid UTF-8"))?;
            let len: i64 = len_text
                .parse()
                .map_err(|_| Error::protocol(format!("invalid bulk length: {len_text:?}")))?;

            if len == -1 {
                return Ok(Some((Reply::Bulk(None), header_end + 2)));
            }
            if len < 0 {
                return Err(Error::protocol(format!("negative bulk length: {len}")));
            }
            let len = len as usize;
            let payload_start = header_end + 2;
            let payload_end = payload_start + len;
            let total = payload_end + 2;
            if data.len() < total {
                return Ok(None);
            }
            if &data[payload_end..total] != b"\r\n" {
                return Err(Error::protocol("bulk payload missing trailing CRLF"));
            }
            let bulk = decode_text(&data[payload_start..payload_end], encoding)?;
            Ok(Some((Reply::Bulk(Some(bulk)), total)))
        }
        b'*' => {
            let Some(pos) = find_crlf(&data[1..]) else {
                return Ok(None);
            };
            let header_end = 1 + pos;
            let count_text = std::str::from_utf8(&data[1..header_end])
                .map_err(|_| Error::protocol("array length is not valid UTF-8"))?;
            let count: i64 = count_text
                .parse()
                .map_err(|_| Error::protocol(format!("invalid array length: {count_text:?}")))?;

            if count == -1 {
                return Ok(Some((Reply::Array(None), header_end + 2)));
            }
            if count < 0 {
                return Err(Error::protocol(format!("negative array length: {count}")));
            }

            let mut items = Vec::with_capacity(count as usize);
            let mut cursor = header_end + 2;
            for _ in 0..count {
                match parse_one(&data[cursor..], encoding)? {
                    Some((item, consumed)) => {
                        items.push(item);
                        cursor += consumed;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(Some(items)), cursor)))
        }
        other => Err(Error::protocol(format!(
            "unrecognized RESP type byte: {:?}",
            other as char
        ))),
    }
}
