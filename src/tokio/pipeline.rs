use crate::error::{Error, Result};
use crate::protocol::encoder::encode_command_into;
use crate::protocol::reply::Reply;

use super::Conn;

/// A buffered batch of not-yet-sent commands bound to a [`Conn`].
///
/// Arguments accumulate into a growable byte buffer rather than being
/// written one at a time, then a single `execute` call flushes the whole
/// batch and harvests replies via the ECHO-sentinel protocol
/// (`Conn::buffer_execute`).
pub struct Pipeline<'a> {
    conn: &'a mut Conn,
    buf: Vec<u8>,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(conn: &'a mut Conn) -> Self {
        Self {
            conn,
            buf: Vec::new(),
        }
    }

    /// Queue a command built from textual arguments.
    pub fn command(&mut self, args: &[&str]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::client("command requires at least one argument"));
        }
        let byte_args: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
        encode_command_into(&mut self.buf, &byte_args);
        Ok(())
    }

    /// Queue a command built from raw byte arguments.
    pub fn bytes_command(&mut self, args: &[&[u8]]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::client("command requires at least one argument"));
        }
        encode_command_into(&mut self.buf, args);
        Ok(())
    }

    /// Discard everything queued so far without sending it.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Flush the buffered batch and collect replies.
    ///
    /// `transaction` wraps the batch in MULTI/EXEC, returning the EXEC
    /// array's elements. `ignore_results` discards the wire bytes without
    /// decoding them, returning `None`. The buffer is empty again after
    /// this call regardless of outcome.
    pub async fn execute(
        &mut self,
        transaction: bool,
        ignore_results: bool,
    ) -> Result<Option<Vec<Reply>>> {
        let buf = std::mem::take(&mut self.buf);
        self.conn.buffer_execute(buf, transaction, ignore_results).await
    }
}

impl Drop for Pipeline<'_> {
    fn drop(&mut self) {
        self.buf.clear();
    }
}
