use std::future::Future;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::decoder::{DecodeOutcome, Decoder};
use crate::protocol::encoder::{encode_command, encode_command_into};
use crate::protocol::reply::{Bulk, Reply};

use tracing::instrument;

use super::pipeline::Pipeline;

/// Large read buffer so one pipelined response burst (hundreds of thousands
/// of replies) does not thrash syscalls.
const READ_BUFFER_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Multi,
}

/// A single RESP connection: one TCP socket, an encoder-backed write path,
/// a decoder-backed read path, a mode flag, and bookkeeping.
pub struct Conn {
    opts: Opts,
    stream: Option<BufReader<TcpStream>>,
    db: usize,
    mode: Mode,
    last_sent: Option<Vec<Vec<u8>>>,
    decoder: Decoder,
    read_line_buf: Vec<u8>,
    closed: bool,
}

impl Conn {
    /// Create a disconnected `Conn`. Call [`Conn::connect`] before issuing
    /// any command.
    pub fn new(opts: Opts) -> Self {
        let db = opts.database;
        let encoding = opts.encoding;
        Self {
            opts,
            stream: None,
            db,
            mode: Mode::Normal,
            last_sent: None,
            decoder: Decoder::new(encoding),
            read_line_buf: Vec::new(),
            closed: false,
        }
    }

    /// Create a `Conn` and connect it in one step. Used by [`super::Pool`]
    /// to produce fresh connections.
    pub async fn connect_new(opts: Opts) -> Result<Self> {
        let mut conn = Self::new(opts);
        conn.connect().await?;
        Ok(conn)
    }

    /// Open the TCP connection and perform AUTH / SELECT / CLIENT SETNAME in
    /// that order. `connect` is single-shot: calling it twice on the same
    /// `Conn` is a client error.
    ///
    /// Password is authenticated before the database is selected or a
    /// client name is set, since most servers refuse any other command on a
    /// fresh connection until AUTH succeeds (see DESIGN.md).
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::client("client is already connected"));
        }

        let tcp = TcpStream::connect((self.opts.host.as_str(), self.opts.port))
            .await
            .map_err(|e| Error::connect(format!("failed to connect: {e}")))?;
        tcp.set_nodelay(true)
            .map_err(|e| Error::connect(format!("failed to set TCP_NODELAY: {e}")))?;
        self.stream = Some(BufReader::with_capacity(READ_BUFFER_CAPACITY, tcp));
        self.closed = false;

        if let Some(password) = self.opts.password.take() {
            let reply = self
                .command(&[b"AUTH", password.as_bytes()])
                .await
                .map_err(|e| Error::connect(format!("AUTH failed: {e}")))?;
            if !reply.is_ok() {
                return Err(Error::connect("AUTH did not return OK"));
            }
        }

        if self.opts.database != 0 {
            self.select(self.opts.database)
                .await
                .map_err(|e| Error::connect(format!("SELECT failed: {e}")))?;
        }

        if let Some(name) = self.opts.name.clone() {
            let reply = self
                .command(&[b"CLIENT", b"SETNAME", name.as_bytes()])
                .await
                .map_err(|e| Error::connect(format!("CLIENT SETNAME failed: {e}")))?;
            if !reply.is_ok() {
                return Err(Error::connect("CLIENT SETNAME did not return OK"));
            }
        }

        Ok(())
    }

    async fn select(&mut self, db: usize) -> Result<()> {
        let reply = self.command(&[b"SELECT", db.to_string().as_bytes()]).await?;
        if !reply.is_ok() {
            return Err(Error::protocol("SELECT did not return OK"));
        }
        self.db = db;
        Ok(())
    }

    /// Encode `args` and write the frame. Does not await a reply. Updates
    /// [`Conn::last_sent`].
    pub async fn send(&mut self, args: &[&[u8]]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::client("command requires at least one argument"));
        }
        let frame = encode_command(args);
        self.write_frame(&frame).await?;
        self.last_sent = Some(args.iter().map(|a| a.to_vec()).collect());
        Ok(())
    }

    #[instrument(skip_all)]
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::client("not connected"))?;
        let result = async {
            stream.get_mut().write_all(frame).await?;
            stream.get_mut().flush().await
        }
        .await;
        if result.is_err() {
            self.closed = true;
        }
        result.map_err(Error::Io)
    }

    /// Pull the next fully decoded reply off the wire, feeding the decoder
    /// one line at a time. Does not raise on a classified error reply;
    /// callers decide whether and when to turn one into an `Err` (shared by
    /// [`Conn::read_one`] and the pipeline harvest loop, which have
    /// different raising policies).
    #[instrument(skip_all)]
    async fn next_reply_raw(&mut self) -> Result<Reply> {
        loop {
            if let DecodeOutcome::Reply(reply) = self.decoder.gets()? {
                return Ok(reply);
            }
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::client("not connected"))?;
            self.read_line_buf.clear();
            let n = match stream.read_until(b'\n', &mut self.read_line_buf).await {
                Ok(n) => n,
                Err(e) => {
                    self.closed = true;
                    return Err(Error::Io(e));
                }
            };
            if n == 0 {
                self.closed = true;
                return Err(Error::protocol("connection closed while reading a reply"));
            }
            self.decoder.feed(&self.read_line_buf);
        }
    }

    /// Read the next reply, raising if it is a classified server error.
    pub async fn read_one(&mut self) -> Result<Reply> {
        let reply = self.next_reply_raw().await?;
        if let Reply::Error(e) = reply {
            return Err(Error::Reply(e));
        }
        Ok(reply)
    }

    /// `send` then `read_one`.
    pub async fn command(&mut self, args: &[&[u8]]) -> Result<Reply> {
        self.send(args).await?;
        self.read_one().await
    }

    /// Enter MULTI mode. Fails if already in MULTI.
    pub async fn multi(&mut self) -> Result<()> {
        if self.mode == Mode::Multi {
            return Err(Error::client("already in MULTI"));
        }
        let reply = self.command(&[b"MULTI"]).await?;
        if !reply.is_ok() {
            return Err(Error::protocol("MULTI did not return OK"));
        }
        self.mode = Mode::Multi;
        Ok(())
    }

    /// Issue EXEC, returning the resulting array reply. Fails if not in
    /// MULTI.
    pub async fn exec(&mut self) -> Result<Reply> {
        if self.mode != Mode::Multi {
            return Err(Error::client("EXEC called while not in MULTI"));
        }
        let reply = self.command(&[b"EXEC"]).await?;
        self.mode = Mode::Normal;
        match reply {
            Reply::Array(_) => Ok(reply),
            other => Err(Error::protocol(format!(
                "EXEC did not return an array reply: {other:?}"
            ))),
        }
    }

    /// Issue DISCARD, aborting the queued transaction. Fails if not in
    /// MULTI.
    pub async fn discard(&mut self) -> Result<()> {
        if self.mode != Mode::Multi {
            return Err(Error::client("DISCARD called while not in MULTI"));
        }
        let reply = self.command(&[b"DISCARD"]).await?;
        self.mode = Mode::Normal;
        if !reply.is_ok() {
            return Err(Error::protocol("DISCARD did not return OK"));
        }
        Ok(())
    }

    /// Run `f` inside a MULTI/EXEC scope. Enters MULTI on the way in; if
    /// `f` returns without having called `exec`, issues DISCARD on the way
    /// out.
    ///
    /// Rust has no async `Drop`, so unlike the `Drop`-based scoped-resource
    /// idiom used elsewhere in this crate (pooled-connection check-in), the
    /// guaranteed-on-exit cleanup here is expressed as a closure scope
    /// rather than an RAII guard. See DESIGN.md.
    pub async fn transaction<F, Fut, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Conn) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.multi().await?;
        let result = f(self).await;
        if self.mode == Mode::Multi {
            self.discard().await?;
        }
        result
    }

    /// Construct a [`Pipeline`] bound to this connection.
    pub fn pipeline(&mut self) -> Pipeline<'_> {
        Pipeline::new(self)
    }

    /// Flush a pre-encoded command buffer and harvest its replies using the
    /// ECHO sentinel protocol.
    #[instrument(skip_all)]
    pub async fn buffer_execute(
        &mut self,
        buf: Vec<u8>,
        transaction: bool,
        ignore_results: bool,
    ) -> Result<Option<Vec<Reply>>> {
        if self.mode == Mode::Multi {
            return Err(Error::client("cannot execute a pipeline while in MULTI"));
        }
        if buf.is_empty() {
            return Err(Error::client("attempted to execute an empty pipeline buffer"));
        }

        let token = generate_token();

        let mut frame = Vec::with_capacity(buf.len() + 48);
        if transaction {
            encode_command_into(&mut frame, &[b"MULTI"]);
        }
        frame.extend_from_slice(&buf);
        if transaction {
            encode_command_into(&mut frame, &[b"EXEC"]);
        }
        encode_command_into(&mut frame, &[b"ECHO", token.as_bytes()]);

        self.write_frame(&frame).await?;
        self.last_sent = Some(vec![b"ECHO".to_vec(), token.clone().into_bytes()]);

        if ignore_results {
            self.discard_until_token(token.as_bytes()).await?;
            return Ok(None);
        }

        let mut results = Vec::new();
        loop {
            let reply = self.next_reply_raw().await?;
            if is_token_reply(&reply, &token) {
                break;
            }
            // A top-level error reply (MULTI/EXEC itself, an intermediate
            // queuing ack, or, outside a transaction, a command's own
            // reply) is always raised here. Per-command errors nested
            // *inside* the EXEC array are a different thing: those stay as
            // `Reply::Error` elements of the returned array and are left
            // for the caller to inspect.
            if let Reply::Error(e) = reply {
                return Err(Error::Reply(e));
            }
            if !transaction || matches!(reply, Reply::Array(_)) {
                results.push(reply);
            }
        }

        if transaction {
            if results.len() != 1 {
                return Err(Error::protocol(format!(
                    "expected exactly one array reply from EXEC, got {}",
                    results.len()
                )));
            }
            match results.pop() {
                Some(Reply::Array(Some(items))) => Ok(Some(items)),
                Some(Reply::Array(None)) => Err(Error::protocol(
                    "EXEC returned a null array; transaction was aborted",
                )),
                other => Err(Error::protocol(format!(
                    "expected an array reply from EXEC, got {other:?}"
                ))),
            }
        } else {
            Ok(Some(results))
        }
    }

    /// For `ignore_results` pipelines: scan raw bytes off the wire for the
    /// literal sequence `<token>\r\n`, discarding everything without
    /// decoding. Pure throughput, no parsing.
    #[instrument(skip_all)]
    async fn discard_until_token(&mut self, token: &[u8]) -> Result<()> {
        let mut needle = Vec::with_capacity(token.len() + 2);
        needle.extend_from_slice(token);
        needle.extend_from_slice(b"\r\n");

        let mut carry: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            if find_subslice(&carry, &needle).is_some() {
                return Ok(());
            }
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::client("not connected"))?;
            let n = match stream.read(&mut chunk).await {
                Ok(n) => n,
                Err(e) => {
                    self.closed = true;
                    return Err(Error::Io(e));
                }
            };
            if n == 0 {
                self.closed = true;
                return Err(Error::protocol(
                    "connection closed while discarding pipeline results",
                ));
            }
            carry.extend_from_slice(&chunk[..n]);
            if carry.len() > needle.len() {
                let keep_from = carry.len() - (needle.len() - 1);
                carry.drain(..keep_from);
            }
        }
    }

    /// Half-close the socket and wait for shutdown to complete.
    pub async fn close(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::client("not connected"))?;
        stream.get_mut().shutdown().await.map_err(Error::Io)?;
        self.closed = true;
        Ok(())
    }

    /// `true` once a read/write has observed EOF or an error, or after
    /// `close()`. There is no cheap non-blocking "peek for EOF" on a tokio
    /// `TcpStream`, so this flag, not a live socket probe, is what the
    /// pool's liveness check inspects.
    pub fn is_closed(&self) -> bool {
        self.closed || self.stream.is_none()
    }

    pub fn in_multi(&self) -> bool {
        self.mode == Mode::Multi
    }

    pub fn database(&self) -> usize {
        self.db
    }

    pub fn last_sent(&self) -> Option<&[Vec<u8>]> {
        self.last_sent.as_deref()
    }
}

fn is_token_reply(reply: &Reply, token: &str) -> bool {
    match reply {
        Reply::Bulk(Some(Bulk::Text(s))) => s == token,
        Reply::Bulk(Some(Bulk::Bytes(b))) => b == token.as_bytes(),
        _ => false,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// 16-hex-character sentinel token (8 random bytes, hex-encoded).
fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
