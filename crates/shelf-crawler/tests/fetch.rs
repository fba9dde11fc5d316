use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use shelf_crawler::{
    CrawlerConfig, Fetch, FetchConfig, FetchStatus, HttpFetcher, QuerySpec, TransportKind,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serves `response` to a single connection, sends back the raw request head
async fn serve_once(response: Vec<u8>) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket.write_all(&response).await.unwrap();
        socket.shutdown().await.ok();
        tx.send(String::from_utf8_lossy(&head).into_owned()).ok();
    });

    (format!("http://{addr}/category?page=1"), rx)
}

fn response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut resp = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    resp.extend_from_slice(body);
    resp
}

fn fetcher(timeout: Duration) -> HttpFetcher {
    let mut config = CrawlerConfig::default().fetch_config();
    config.timeout = timeout;
    HttpFetcher::new(&config).unwrap()
}

fn query() -> QuerySpec {
    QuerySpec::new("8", 1)
}

#[tokio::test]
async fn fetch_ok_page() {
    let (url, _) = serve_once(response("200 OK", "text/html", b"<html>ok</html>")).await;

    let result = fetcher(Duration::from_secs(5)).fetch(&query(), &url).await;

    assert!(result.is_ok());
    assert_eq!(Some("<html>ok</html>"), result.body.as_deref());
    assert_eq!(query(), result.query);
}

#[tokio::test]
async fn fetch_http_error() {
    let (url, _) = serve_once(response("503 Service Unavailable", "text/html", b"busy")).await;

    let result = fetcher(Duration::from_secs(5)).fetch(&query(), &url).await;

    assert_eq!(FetchStatus::HttpError(503), result.status);
    assert!(result.body.is_none());
}

#[tokio::test]
async fn fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}/");
    let result = fetcher(Duration::from_secs(5)).fetch(&query(), &url).await;

    assert_eq!(
        FetchStatus::TransportError(TransportKind::Connect),
        result.status
    );
}

#[tokio::test]
async fn fetch_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let url = format!("http://{addr}/");
    let result = fetcher(Duration::from_millis(200)).fetch(&query(), &url).await;

    assert_eq!(FetchStatus::Timeout, result.status);
}

#[tokio::test]
async fn fetch_gzip_payload() {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(b"<html>compressed</html>").unwrap();
    let compressed = gz.finish().unwrap();
    let (url, _) = serve_once(response("200 OK", "application/x-gzip", &compressed)).await;

    let result = fetcher(Duration::from_secs(5)).fetch(&query(), &url).await;

    assert_eq!(Some("<html>compressed</html>"), result.body.as_deref());
}

#[tokio::test]
async fn fetch_sends_identity_headers() {
    let (url, head) = serve_once(response("200 OK", "text/html", b"")).await;
    let config = FetchConfig {
        user_agent: "shelf-test/1.0".into(),
        ..CrawlerConfig::default().fetch_config()
    };

    let result = HttpFetcher::new(&config)
        .unwrap()
        .fetch(&query(), &url)
        .await;
    assert!(result.is_ok());

    let head = head.await.unwrap().to_lowercase();
    assert!(head.contains("user-agent: shelf-test/1.0"));
    assert!(head.contains("accept-language: en-us,en;q=0.5"));
    assert!(head.starts_with("get /category?page=1 "));
}

#[test]
fn invalid_header_is_rejected() {
    let mut config = CrawlerConfig::default();
    config.headers.insert("Bad Header".into(), "x".into());
    assert!(HttpFetcher::new(&config.fetch_config()).is_err());
}
