//! End-to-end interception through the HTTP host.

use std::time::Duration;

use axum::http::StatusCode;
use markdown_interceptor::config::AppConfig;
use markdown_interceptor::loader::FailurePolicy;
use serde_json::Value;

mod common;

static DOCS: &[(&str, &str)] = &[("/doc.md", "# Hi"), ("/notes.txt", "# Hi")];

#[tokio::test]
async fn test_markdown_served_as_html() {
    let backend = common::start_document_backend(DOCS).await;
    let interceptor = common::start_interceptor(backend, AppConfig::with_markdown_defaults()).await;

    let res = common::client().get(interceptor.url("/doc.md")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(res.headers()["content-length"], "12");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "<h1>Hi</h1>\n");
}

#[tokio::test]
async fn test_declined_request_passes_through() {
    let backend = common::start_document_backend(DOCS).await;
    let interceptor = common::start_interceptor(backend, AppConfig::with_markdown_defaults()).await;

    let res = common::client().get(interceptor.url("/notes.txt")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "# Hi");

    let missing = common::client().get(interceptor.url("/missing.txt")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND, "upstream status forwarded untouched");
}

#[tokio::test]
async fn test_upstream_404_becomes_synthetic_error() {
    let backend = common::start_document_backend(DOCS).await;
    let interceptor = common::start_interceptor(backend, AppConfig::with_markdown_defaults()).await;

    let res = common::client().get(interceptor.url("/missing.md")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.text().await.unwrap().contains("fetch_failed"));
}

#[tokio::test]
async fn test_silent_policy_leaves_request_to_host_timeout() {
    let backend = common::start_document_backend(DOCS).await;
    let mut config = AppConfig::with_markdown_defaults();
    config.loader.failure_policy = FailurePolicy::Silent;
    config.timeouts.request_secs = 1;
    let interceptor = common::start_interceptor(backend, config).await;

    let res = common::client().get(interceptor.url("/missing.md")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_deadline_turns_slow_upstream_into_504() {
    let backend = common::start_programmable_backend(|_path| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "# Late".to_string())
    })
    .await;
    let mut config = AppConfig::with_markdown_defaults();
    config.loader.deadline_secs = Some(1);
    let interceptor = common::start_interceptor(backend, config).await;

    let res = common::client().get(interceptor.url("/slow.md")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_loaders_endpoint_reports_released_loaders() {
    let backend = common::start_document_backend(DOCS).await;
    let interceptor = common::start_interceptor(backend, AppConfig::with_markdown_defaults()).await;
    let client = common::client();

    client.get(interceptor.url("/doc.md")).send().await.unwrap().text().await.unwrap();
    client.get(interceptor.url("/missing.md")).send().await.unwrap().text().await.unwrap();
    client.get(interceptor.url("/notes.txt")).send().await.unwrap().text().await.unwrap();

    // Loaders release right after notifying, so give the table a moment.
    let mut view = Value::Null;
    for _ in 0..50 {
        view = client
            .get(interceptor.url("/_interceptor/loaders"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if view["stats"]["in_flight"] == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(view["interceptors"], serde_json::json!(["markdown"]));
    assert_eq!(view["stats"]["created"], 2);
    assert_eq!(view["stats"]["done"], 1);
    assert_eq!(view["stats"]["failed"], 1);
    assert_eq!(view["stats"]["fetch_failed"], 1);
    assert_eq!(view["stats"]["in_flight"], 0);
    assert_eq!(view["loaders"], serde_json::json!([]));
}

#[tokio::test]
async fn test_browser_accept_encoding_does_not_reach_the_transform() {
    // Compresses whenever the caller asks for it, like most origins.
    let backend = common::start_raw_backend(|head| {
        let wants_gzip = common::header_value(head, "accept-encoding").is_some_and(|v| v.contains("gzip"));
        let (encoding, body): (&str, &[u8]) = if wants_gzip {
            ("Content-Encoding: gzip\r\n", &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff])
        } else {
            ("", b"# Hi")
        };
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/markdown\r\n{encoding}Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    })
    .await;
    let interceptor = common::start_interceptor(backend, AppConfig::with_markdown_defaults()).await;

    let res = common::client()
        .get(interceptor.url("/doc.md"))
        .header("accept-encoding", "gzip, deflate, br")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), "<h1>Hi</h1>\n");
}
