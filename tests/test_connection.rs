use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::sync::watch;
use wharf::http::connection::{Connection, MAX_BUFFER};
use wharf::http::static_files::StaticFiles;
use wharf::server::ConnContext;

const STYLE_RESPONSE: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/css\r\nContent-Length: 6\r\n\r\nbody{}";

struct Site {
    root: PathBuf,
}

impl Site {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("wharf-conn-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("style.css"), "body{}").unwrap();
        std::fs::write(root.join("index.html"), "<p>hi</p>").unwrap();
        Self { root }
    }

    fn files(&self) -> StaticFiles {
        StaticFiles::new(&self.root).unwrap()
    }
}

impl Drop for Site {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn context() -> (watch::Sender<bool>, ConnContext) {
    let (tx, rx) = watch::channel(false);
    (tx, ConnContext::new(1, None, rx))
}

async fn read_all(client: &mut DuplexStream) -> String {
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn test_single_request_then_close() {
    let site = Site::new("single");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client
            .write_all(b"GET /style.css HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert_eq!(text, STYLE_RESPONSE);
}

#[tokio::test]
async fn test_http10_closes_after_one_response() {
    let site = Site::new("http10");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client
            .write_all(b"GET /style.css HTTP/1.0\r\n\r\n")
            .await
            .unwrap();
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert_eq!(text, STYLE_RESPONSE);
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let site = Site::new("pipelined");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client
            .write_all(
                b"GET /style.css HTTP/1.1\r\n\r\nGET /missing HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();

    let first = text.find("200 OK").unwrap();
    let second = text.find("404 Not Found").unwrap();
    let third = text.rfind("200 OK").unwrap();
    assert!(text.starts_with(STYLE_RESPONSE));
    assert!(first < second && second < third);
    assert!(text.ends_with("<p>hi</p>"));
}

#[tokio::test]
async fn test_keep_alive_serves_sequential_requests() {
    let site = Site::new("keepalive");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client
            .write_all(b"GET /style.css HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let mut first = vec![0u8; STYLE_RESPONSE.len()];
        client.read_exact(&mut first).await.unwrap();

        client
            .write_all(b"GET /style.css HTTP/1.0\r\n\r\n")
            .await
            .unwrap();
        let rest = read_all(&mut client).await;
        (String::from_utf8(first).unwrap(), rest)
    };

    let (res, (first, second)) = tokio::join!(worker, peer);
    res.unwrap();
    assert_eq!(first, STYLE_RESPONSE);
    assert_eq!(second, STYLE_RESPONSE);
}

#[tokio::test]
async fn test_fragmented_request_is_assembled() {
    let site = Site::new("fragmented");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        let req = b"POST /style.css HTTP/1.1\r\nContent-Length: 4\r\nConnection: close\r\n\r\nabcd";
        for piece in req.chunks(3) {
            client.write_all(piece).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert_eq!(text, STYLE_RESPONSE);
}

#[tokio::test]
async fn test_malformed_request_closes_without_response() {
    let site = Site::new("malformed");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client.write_all(b"GET /\r\n\r\n").await.unwrap();
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_oversize_buffer_closes_without_response() {
    let site = Site::new("oversize");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        // A head that never ends
        let mut junk = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        junk.resize(MAX_BUFFER + 8 * 1024, b'a');
        // The worker hangs up partway through
        let _ = client.write_all(&junk).await;
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_idle_read_deadline_closes() {
    let site = Site::new("idle");
    let files = site.files();
    let (_tx, ctx) = context();
    let (mut client, server) = duplex(1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_millis(50), ctx)
            .run()
            .await
    };
    let peer = async { read_all(&mut client).await };

    let (res, text) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(worker, peer)
    })
    .await
    .unwrap();
    res.unwrap();
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_shutdown_mid_request_finishes_response_then_closes() {
    let site = Site::new("drain");
    let files = site.files();
    let (tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        Connection::new(server, &files, Duration::from_secs(2), ctx)
            .run()
            .await
    };
    let peer = async {
        client.write_all(b"GET /style.css HT").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        // keep-alive by default, yet the connection must end after this one
        client.write_all(b"TP/1.1\r\n\r\n").await.unwrap();
        read_all(&mut client).await
    };

    let (res, text) = tokio::join!(worker, peer);
    res.unwrap();
    assert_eq!(text, STYLE_RESPONSE);
}

#[tokio::test]
async fn test_shutdown_bounds_slow_partial_request() {
    let site = Site::new("dribble");
    let files = site.files();
    let (tx, ctx) = context();
    let (mut client, server) = duplex(64 * 1024);

    let worker = async {
        let started = tokio::time::Instant::now();
        let res = Connection::new(server, &files, Duration::from_millis(300), ctx)
            .run()
            .await;
        (res, started.elapsed())
    };
    let peer = async {
        client.write_all(b"GET /style.css HTTP/1.1\r\nX-Slow: ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        // Each byte lands well inside the read timeout, so only the
        // shutdown deadline can end this
        for _ in 0..40 {
            if client.write_all(b"a").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        read_all(&mut client).await
    };

    let ((res, elapsed), text) = tokio::join!(worker, peer);
    res.unwrap();
    assert!(elapsed < Duration::from_millis(1500), "worker took {elapsed:?}");
    assert!(text.is_empty());
}
