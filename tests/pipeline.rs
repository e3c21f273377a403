mod common;

use common::FakeServer;
use tokio_resp::protocol::{Bulk, Reply};
use tokio_resp::Opts;

fn opts_for(server: &FakeServer) -> Opts {
    Opts {
        host: server.host(),
        port: server.port(),
        ..Opts::default()
    }
}

#[tokio::test]
async fn pipeline_returns_n_replies_in_order() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    let mut pipeline = conn.pipeline();
    pipeline.bytes_command(&[b"SET", b"foo", b"bar"]).unwrap();
    pipeline.bytes_command(&[b"SET", b"bar", b"baz"]).unwrap();
    pipeline.bytes_command(&[b"GET", b"foo"]).unwrap();
    pipeline.bytes_command(&[b"GET", b"bar"]).unwrap();
    let results = pipeline.execute(false, false).await.unwrap().unwrap();

    assert_eq!(
        results,
        vec![
            Reply::SimpleString("OK".to_string()),
            Reply::SimpleString("OK".to_string()),
            Reply::Bulk(Some(Bulk::Text("bar".to_string()))),
            Reply::Bulk(Some(Bulk::Text("baz".to_string()))),
        ]
    );
}

#[tokio::test]
async fn transactional_pipeline_returns_the_exec_array() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    let mut pipeline = conn.pipeline();
    pipeline.bytes_command(&[b"SET", b"foo", b"bar"]).unwrap();
    pipeline.bytes_command(&[b"SET", b"bar", b"baz"]).unwrap();
    pipeline.bytes_command(&[b"GET", b"foo"]).unwrap();
    pipeline.bytes_command(&[b"GET", b"bar"]).unwrap();
    let results = pipeline.execute(true, false).await.unwrap().unwrap();

    assert_eq!(
        results,
        vec![
            Reply::SimpleString("OK".to_string()),
            Reply::SimpleString("OK".to_string()),
            Reply::Bulk(Some(Bulk::Text("bar".to_string()))),
            Reply::Bulk(Some(Bulk::Text("baz".to_string()))),
        ]
    );
}

#[tokio::test]
async fn ignore_results_pipeline_discards_replies_without_decoding() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    // Scaled down from a much larger batch: the point under test is the
    // raw-byte sentinel scan, not throughput at that scale.
    const COUNT: usize = 4000;
    {
        let mut pipeline = conn.pipeline();
        for i in 0..COUNT {
            let key = format!("k{i}");
            pipeline.bytes_command(&[b"SET", key.as_bytes(), b"v"]).unwrap();
        }
        let outcome = pipeline.execute(false, true).await.unwrap();
        assert!(outcome.is_none());
    }

    let reply = conn.command(&[b"DBSIZE"]).await.unwrap();
    assert_eq!(reply, Reply::Integer(COUNT as i64));
}

#[tokio::test]
async fn non_transactional_pipeline_raises_a_mid_batch_error_reply() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    let mut pipeline = conn.pipeline();
    pipeline.bytes_command(&[b"SET", b"foo", b"bar"]).unwrap();
    pipeline.bytes_command(&[b"NOSUCHCOMMAND"]).unwrap();
    pipeline.bytes_command(&[b"GET", b"foo"]).unwrap();
    let err = pipeline.execute(false, false).await.unwrap_err();

    assert!(matches!(err, tokio_resp::error::Error::Reply(_)));
}

#[tokio::test]
async fn executing_an_empty_pipeline_is_a_client_error() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    let mut pipeline = conn.pipeline();
    let err = pipeline.execute(false, false).await.unwrap_err();
    assert!(matches!(err, tokio_resp::error::Error::Client(_)));
}

#[tokio::test]
async fn pipeline_buffer_is_empty_after_execute() {
    let server = FakeServer::spawn().await;
    let mut conn = tokio_resp::tokio::Conn::new(opts_for(&server));
    conn.connect().await.unwrap();

    let mut pipeline = conn.pipeline();
    pipeline.bytes_command(&[b"PING"]).unwrap();
    pipeline.execute(false, false).await.unwrap();
    assert!(pipeline.is_empty());
}
