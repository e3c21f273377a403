//! A minimal in-process RESP server for integration tests.
//!
//! Stands in for a real redis-server: these tests need real socket
//! round-trips, not mocked I/O, to exercise framing, the ECHO-sentinel
//! pipeline protocol, and MULTI/EXEC bookkeeping end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tokio_resp::protocol::{Bulk, DecodeOutcome, Decoder, Reply};
use tokio_resp::Encoding;

pub struct FakeServer {
    addr: SocketAddr,
}

impl FakeServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local_addr");
        let store: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let store = Arc::clone(&store);
                tokio::spawn(handle_conn(socket, store));
            }
        });

        Self { addr }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn handle_conn(mut socket: TcpStream, store: Arc<Mutex<HashMap<String, String>>>) {
    let mut decoder = Decoder::new(Some(Encoding::Utf8));
    let mut queue: Option<Vec<Vec<String>>> = None;
    let mut chunk = [0u8; 4096];

    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => decoder.feed(&chunk[..n]),
        }

        loop {
            match decoder.gets() {
                Ok(DecodeOutcome::Pending) => break,
                Ok(DecodeOutcome::Reply(Reply::Array(Some(items)))) => {
                    let args: Vec<String> = items.iter().map(bulk_text).collect();
                    let reply = dispatch(&store, &mut queue, args);
                    if socket.write_all(&reply).await.is_err() {
                        return;
                    }
                }
                _ => return,
            }
        }
    }
}

fn bulk_text(reply: &Reply) -> String {
    match reply {
        Reply::Bulk(Some(Bulk::Text(s))) => s.clone(),
        Reply::Bulk(Some(Bulk::Bytes(b))) => String::from_utf8_lossy(b).into_owned(),
        other => panic!("expected a bulk string request argument, got {other:?}"),
    }
}

enum FakeReply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
    Array(Vec<FakeReply>),
}

fn encode_fake_reply(reply: &FakeReply) -> Vec<u8> {
    match reply {
        FakeReply::Simple(s) => format!("+{s}\r\n").into_bytes(),
        FakeReply::Error(s) => format!("-{s}\r\n").into_bytes(),
        FakeReply::Integer(n) => format!(":{n}\r\n").into_bytes(),
        FakeReply::Bulk(None) => b"$-1\r\n".to_vec(),
        FakeReply::Bulk(Some(s)) => format!("${}\r\n{s}\r\n", s.len()).into_bytes(),
        FakeReply::Array(items) => {
            let mut buf = format!("*{}\r\n", items.len()).into_bytes();
            for item in items {
                buf.extend(encode_fake_reply(item));
            }
            buf
        }
    }
}

fn apply_one(store: &Mutex<HashMap<String, String>>, args: &[String]) -> FakeReply {
    let cmd = args[0].to_ascii_uppercase();
    match cmd.as_str() {
        "PING" => FakeReply::Simple("PONG".to_string()),
        "ECHO" => FakeReply::Bulk(args.get(1).cloned()),
        "AUTH" | "SELECT" | "CLIENT" => FakeReply::Simple("OK".to_string()),
        "SET" => {
            store
                .lock()
                .expect("store mutex poisoned")
                .insert(args[1].clone(), args[2].clone());
            FakeReply::Simple("OK".to_string())
        }
        "GET" => FakeReply::Bulk(store.lock().expect("store mutex poisoned").get(&args[1]).cloned()),
        "DBSIZE" => FakeReply::Integer(store.lock().expect("store mutex poisoned").len() as i64),
        _ => FakeReply::Error(format!("ERR unknown command '{cmd}'")),
    }
}

fn dispatch(
    store: &Mutex<HashMap<String, String>>,
    queue: &mut Option<Vec<Vec<String>>>,
    args: Vec<String>,
) -> Vec<u8> {
    let cmd = args[0].to_ascii_uppercase();
    let reply = match cmd.as_str() {
        "MULTI" => {
            if queue.is_some() {
                FakeReply::Error("ERR MULTI calls can not be nested".to_string())
            } else {
                *queue = Some(Vec::new());
                FakeReply::Simple("OK".to_string())
            }
        }
        "EXEC" => match queue.take() {
            None => FakeReply::Error("ERR EXEC without MULTI".to_string()),
            Some(queued) => {
                let results = queued.iter().map(|c| apply_one(store, c)).collect();
                FakeReply::Array(results)
            }
        },
        "DISCARD" => {
            if queue.take().is_some() {
                FakeReply::Simple("OK".to_string())
            } else {
                FakeReply::Error("ERR DISCARD without MULTI".to_string())
            }
        }
        _ if queue.is_some() => {
            queue
                .as_mut()
                .expect("checked is_some above")
                .push(args);
            FakeReply::Simple("QUEUED".to_string())
        }
        _ => apply_one(store, &args),
    };
    encode_fake_reply(&reply)
}
