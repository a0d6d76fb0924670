//! Integration tests for SafeFetch using wiremock

use safefetch::{FetchConfig, FetchError, FetchUrlInput, Tool, ToolBuilder, ValidatorConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tool that may talk to the local mock server over plain HTTP
fn local_tool() -> ToolBuilder {
    Tool::builder()
        .permitted_scheme("http")
        .trusted_host("127.0.0.1")
}

#[tokio::test]
async fn test_hello_world_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<body><p>Hello   World</p></body>", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/", mock_server.uri())))
        .await;

    assert_eq!(result, "Hello\nWorld");
}

#[tokio::test]
async fn test_blocked_target_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let port = mock_server.address().port();
    let tool = Tool::default();
    let result = tool
        .execute(FetchUrlInput::new(format!("https://127.0.0.1:{}/admin", port)))
        .await;

    assert!(result.starts_with("Error: "));
    assert!(result.contains("Blocked URL"));
}

#[tokio::test]
async fn test_untrusted_loopback_is_blocked_even_over_allowed_scheme() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let port = mock_server.address().port();
    let tool = Tool::builder().permitted_scheme("http").build();
    let result = tool
        .execute(FetchUrlInput::new(format!("http://localhost:{}/", port)))
        .await;

    assert_eq!(
        result,
        "Error: Blocked URL: localhost is an internal or private target"
    );
}

#[tokio::test]
async fn test_5xx_status_is_error_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("Internal Server Error")
                .insert_header("content-type", "text/plain"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/error", mock_server.uri())))
        .await;

    assert_eq!(result, "Error: Could not fetch url: 500");
}

#[tokio::test]
async fn test_status_is_never_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_retries(3).build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/busy", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::FetchFailed(503)));
}

#[tokio::test]
async fn test_4xx_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/not-found", mock_server.uri())))
        .await;

    assert!(result.starts_with("Error: "));
    assert!(result.contains("404"));
}

#[tokio::test]
async fn test_html_to_text_strips_markup() {
    let mock_server = MockServer::start().await;

    let html = r#"<!DOCTYPE html>
<html>
<head><title>Test page</title><style>body { color: red; }</style></head>
<body>
    <h1>Title</h1>
    <p>Paragraph with <strong>bold</strong> text.</p>
    <script>alert('bad');</script>
    <ul>
        <li>Item 1</li>
        <li>Item 2</li>
    </ul>
</body>
</html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/", mock_server.uri())))
        .await;

    assert_eq!(
        result,
        "Title\nParagraph with bold text.\nItem 1\nItem 2"
    );
}

#[tokio::test]
async fn test_plain_text_passthrough() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("line one\n\n\nline two  end")
                .insert_header("content-type", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/notes.txt", mock_server.uri())))
        .await;

    assert_eq!(result, "line one\nline two\nend");
}

#[tokio::test]
async fn test_truncation_to_max_length() {
    let mock_server = MockServer::start().await;

    let body = "a".repeat(50_000);
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let doc = tool
        .try_execute(FetchUrlInput::new(format!("{}/long", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(doc.text.chars().count(), 30_000);
    assert_eq!(doc.original_length, 50_000);
    assert!(doc.truncated);
}

#[tokio::test]
async fn test_short_text_is_not_truncated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/short"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("short text")
                .insert_header("content-type", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_length(10).build();
    let doc = tool
        .try_execute(FetchUrlInput::new(format!("{}/short", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(doc.text, "short text");
    assert_eq!(doc.original_length, 10);
    assert!(!doc.truncated);
    assert_eq!(doc.status_code, 200);
    assert_eq!(doc.content_type, Some("text/plain".to_string()));
}

#[tokio::test]
async fn test_body_size_cap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("b".repeat(1_000))
                .insert_header("content-type", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_body_bytes(100).build();
    let doc = tool
        .try_execute(FetchUrlInput::new(format!("{}/big", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(doc.text.len(), 100);
}

#[tokio::test]
async fn test_safe_redirect_is_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/final"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Arrived</p>", "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let doc = tool
        .try_execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(doc.text, "Arrived");
    assert_eq!(doc.url, format!("{}/start", mock_server.uri()));
    assert_eq!(doc.final_url, format!("{}/final", mock_server.uri()));
}

#[tokio::test]
async fn test_redirect_to_private_address_is_blocked() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "http://10.0.0.1/secret"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::BlockedTarget(ref host) if host == "10.0.0.1"));
}

#[tokio::test]
async fn test_redirect_to_localhost_makes_no_second_request() {
    let mock_server = MockServer::start().await;
    let port = mock_server.address().port();

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("location", format!("http://localhost:{}/internal", port)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await;

    assert!(result.starts_with("Error: Blocked URL: localhost"));
}

#[tokio::test]
async fn test_redirect_to_other_scheme_is_denied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "ftp://example.com/file"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InsecureScheme(ref scheme) if scheme == "ftp"));
}

#[tokio::test]
async fn test_redirect_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_redirects(2).build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/loop", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TooManyRedirects(2)));
}

#[tokio::test]
async fn test_redirects_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/final"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(ResponseTemplate::new(200).set_body_string("never"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_redirects(0).build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await;

    assert_eq!(result, "Error: Too many redirects (limit 0)");
}

#[tokio::test]
async fn test_redirect_without_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/start", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MissingRedirectLocation));
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().timeout(Duration::from_millis(200)).build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/slow", mock_server.uri())))
        .await;

    assert_eq!(result, "Error: Request timed out");
}

#[tokio::test]
async fn test_binary_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/image.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, 0x50, 0x4E, 0x47]) // PNG magic bytes
                .insert_header("content-type", "image/png"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("{}/image.png", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ConversionFailed(_)));
    assert!(err.to_string().contains("image/png"));
}

#[tokio::test]
async fn test_binary_body_with_text_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x00, 0x01, 0x02, 0x03])
                .insert_header("content-type", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/data", mock_server.uri())))
        .await;

    assert_eq!(
        result,
        "Error: Content conversion failed: response body is binary data"
    );
}

#[tokio::test]
async fn test_custom_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "CustomBot/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = local_tool().user_agent("CustomBot/2.0").build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/", mock_server.uri())))
        .await;

    assert_eq!(result, "ok");
}

#[tokio::test]
async fn test_execute_json_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<body><h2>From JSON</h2></body>", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().build();
    let result = tool
        .execute_json(json!({ "url": format!("{}/page", mock_server.uri()) }))
        .await;

    assert_eq!(result, "From JSON");
}

#[tokio::test]
async fn test_name_resolving_to_loopback_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("internal"))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Without the localhost name rules the lookup result decides
    let tool = Tool::from_config(FetchConfig {
        validator: ValidatorConfig {
            permitted_scheme: "http".to_string(),
            blocked_hosts: Vec::new(),
            blocked_suffixes: Vec::new(),
            ..Default::default()
        },
        ..Default::default()
    });
    let port = mock_server.address().port();
    let result = tool
        .execute(FetchUrlInput::new(format!("http://localhost:{}/", port)))
        .await;

    assert!(
        result.starts_with("Error: Blocked URL: localhost (resolves to "),
        "{}",
        result
    );
}

#[tokio::test]
async fn test_connect_failure_is_retried_then_reported() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let tool = local_tool().max_retries(2).build();
    let err = tool
        .try_execute(FetchUrlInput::new(format!("http://127.0.0.1:{}/", port)))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Connect(_)), "{:?}", err);

    let result = tool
        .execute(FetchUrlInput::new(format!("http://127.0.0.1:{}/", port)))
        .await;
    assert!(result.starts_with("Error: Could not connect to server"), "{}", result);
}

#[tokio::test]
async fn test_body_cap_does_not_split_characters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/euro"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ab\u{20ac}")
                .insert_header("content-type", "text/plain; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let tool = local_tool().max_body_bytes(4).build();
    let result = tool
        .execute(FetchUrlInput::new(format!("{}/euro", mock_server.uri())))
        .await;

    assert_eq!(result, "ab");
}
