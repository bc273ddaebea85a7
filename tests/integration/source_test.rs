//! Integration tests for the HTTP quote source against a local server

use quote_sync::config::{RequestConfig, SourceConfig, ValidationConfig};
use quote_sync::quote::{FetchError, HttpQuoteSource, MarketDataSource};
use quote_sync::request::RequestClient;
use rust_decimal_macros::dec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve `status` and `body` to every connection, forwarding each raw request
async fn serve(status: &'static str, body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), rx)
}

fn source(base_url: String) -> HttpQuoteSource {
    HttpQuoteSource::new(SourceConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        timeout_ms: 5_000,
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_quote_over_http() {
    let (base_url, mut requests) = serve(
        "200 OK",
        r#"{"symbol":"AAPL","price":"189.25","previousClose":"187.00","volume":1000,"name":"Apple Inc.","timestamp":1760000000000}"#,
    )
    .await;

    let snapshot = source(base_url).fetch_quote("AAPL").await.unwrap();
    assert_eq!(snapshot.symbol, "AAPL");
    assert_eq!(snapshot.price, dec!(189.25));
    assert_eq!(snapshot.change(), dec!(2.25));
    assert_eq!(snapshot.volume, 1000);

    let request = requests.recv().await.unwrap();
    assert!(request.starts_with("GET /quote?symbol=AAPL "));
    assert!(request.to_ascii_lowercase().contains("x-api-key: test-key"));
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let (base_url, _requests) = serve("503 Service Unavailable", r#"{"error":"busy"}"#).await;

    let err = source(base_url).fetch_quote("AAPL").await.unwrap_err();
    assert!(matches!(err, FetchError::Http { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let (base_url, _requests) = serve("200 OK", "<html>maintenance</html>").await;

    let err = source(base_url).fetch_quote("AAPL").await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_request_client_rejects_implausible_quote() {
    // 100% above the previous close, over the 50% ceiling
    let (base_url, mut requests) = serve(
        "200 OK",
        r#"{"symbol":"AAPL","price":"400","previousClose":"200","timestamp":1760000000000}"#,
    )
    .await;

    let client = RequestClient::new(
        source(base_url),
        RequestConfig::default(),
        ValidationConfig::default(),
    );
    let err = client.fetch("AAPL").await.unwrap_err();
    assert!(matches!(err, FetchError::Validation(_)));

    // validation failures are not retried
    requests.recv().await.unwrap();
    assert!(requests.try_recv().is_err());
}
