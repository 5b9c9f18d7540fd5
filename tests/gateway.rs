//! End-to-end tests: client → gateway → backend over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_request_body_round_trips_through_backend() {
    let backend_addr: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28382".parse().unwrap();

    common::start_echo_backend(backend_addr).await;
    let shutdown = common::start_gateway(gateway_addr, backend_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client()
        .post(format!("http://{}/orders", gateway_addr))
        .header(CONTENT_TYPE, "application/json")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[CONTENT_LENGTH], "7");
    assert!(res.headers().contains_key("x-request-id"), "trace id propagated");
    assert_eq!(res.text().await.unwrap(), r#"{"a":1}"#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_chunked_backend_response_gets_content_length() {
    let backend_addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();

    common::start_chunked_backend(backend_addr, &["Hel", "lo"]).await;
    let shutdown = common::start_gateway(gateway_addr, backend_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client()
        .get(format!("http://{}/greeting", gateway_addr))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[CONTENT_LENGTH], "5");
    assert!(res.headers().get("transfer-encoding").is_none());
    assert_eq!(res.text().await.unwrap(), "Hello");

    shutdown.trigger();
}

#[tokio::test]
async fn test_trace_id_supplied_by_client_is_kept() {
    let backend_addr: SocketAddr = "127.0.0.1:28581".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28582".parse().unwrap();

    common::start_echo_backend(backend_addr).await;
    let shutdown = common::start_gateway(gateway_addr, backend_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client()
        .get(format!("http://{}/ping", gateway_addr))
        .header("x-request-id", "client-trace-7")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.headers()["x-request-id"], "client-trace-7");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Nothing listens on the upstream port.
    let backend_addr: SocketAddr = "127.0.0.1:28681".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:28682".parse().unwrap();

    let shutdown = common::start_gateway(gateway_addr, backend_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client()
        .post(format!("http://{}/orders", gateway_addr))
        .header(CONTENT_TYPE, "text/plain")
        .body("lost")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 502);
    assert_eq!(res.text().await.unwrap(), "Upstream request failed");

    shutdown.trigger();
}
