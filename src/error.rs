use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// A classified RESP error reply (`-...\r\n`).
///
/// Carries the raw error text as the server sent it, e.g.
/// `"ERR unknown command 'NONEXISTANT_COMMAND'"` or
/// `"ERR DB index is out of range"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReplyError(pub String);

#[derive(Debug, Error)]
pub enum Error {
    /// Caller misused the client: double `connect`, empty pipeline execute,
    /// `buffer_execute` while in MULTI, a foreign `Pool::put`, etc.
    #[error("client error: {0}")]
    Client(String),

    /// A server error reply (`-...\r\n`) observed outside of a transaction.
    #[error("server replied with an error: {0}")]
    Reply(#[from] ReplyError),

    /// The inbound byte stream violated RESP framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection establishment failed (TCP connect, AUTH, SELECT, or
    /// CLIENT SETNAME did not complete as expected).
    #[error("connect error: {0}")]
    Connect(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }
}
