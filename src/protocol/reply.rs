use crate::error::ReplyError;

/// A bulk-string payload, shaped by the connection's configured response
/// encoding: UTF-8 text when an encoding is set, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bulk {
    Text(String),
    Bytes(Vec<u8>),
}

impl Bulk {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Bulk::Text(s) => Some(s),
            Bulk::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Bulk::Text(s) => s.as_bytes(),
            Bulk::Bytes(b) => b,
        }
    }
}

/// A fully decoded RESP2 reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    SimpleString(String),
    /// A classified server error reply. The decoder never raises this; it
    /// is delivered as a value so the caller can choose to raise it
    /// (`Connection::read_one` does) or collect it (inside a transaction
    /// harvest).
    Error(ReplyError),
    Integer(i64),
    Bulk(Option<Bulk>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// `true` for the reply this crate treats as a plain acknowledgement
    /// (`+OK\r\n`).
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::SimpleString(s) if s == "OK")
    }

    pub fn as_simple_string(&self) -> Option<&str> {
        match self {
            Reply::SimpleString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<ReplyError> {
        match self {
            Reply::Error(e) => Some(e),
            _ => None,
        }
    }
}
