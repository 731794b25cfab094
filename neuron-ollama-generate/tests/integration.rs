//! Integration tests for the generate client using wiremock.

use std::time::Duration;

use futures::StreamExt;
use neuron_ollama_generate::{
    Context, GenerateClient, GenerateError, GenerateEvent, GenerateOptions,
};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn ndjson(lines: &[serde_json::Value]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

fn hello_body() -> String {
    ndjson(&[
        serde_json::json!({"model": "m", "response": "Hel", "done": false}),
        serde_json::json!({"model": "m", "response": "lo", "done": false}),
        serde_json::json!({
            "model": "m",
            "response": "",
            "done": true,
            "done_reason": "stop",
            "context": [1, 2, 3],
            "eval_count": 2,
            "eval_duration": 1000000000_u64,
            "prompt_eval_count": 1,
        }),
    ])
}

/// Matches requests whose `context` field is exactly `expected`.
fn context_is(expected: serde_json::Value) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |request: &Request| {
        serde_json::from_slice::<serde_json::Value>(&request.body)
            .map(|body| body["context"] == expected)
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn generate_streams_increments_and_returns_context() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(serde_json::json!({
            "model": "m",
            "prompt": "hi",
            "context": [],
            "stream": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(hello_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().model("m").base_url(mock_server.uri());

    let mut seen = Vec::new();
    let context = client
        .generate("hi", &Context::new(), |text| seen.push(text.to_string()))
        .await
        .expect("should succeed");

    assert_eq!(seen, vec!["Hel", "lo"]);
    assert_eq!(context, Context::from(vec![1, 2, 3]));
}

#[tokio::test]
async fn returned_context_is_sent_unmodified_on_next_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(context_is(serde_json::json!([])))
        .respond_with(ResponseTemplate::new(200).set_body_string(hello_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(context_is(serde_json::json!([1, 2, 3])))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
            serde_json::json!({"response": "again", "done": false}),
            serde_json::json!({"response": "", "done": true, "context": [1, 2, 3, 4, 5]}),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());

    let first = client
        .generate("hi", &Context::new(), |_| {})
        .await
        .expect("first call should succeed");
    let second = client
        .generate("more", &first, |_| {})
        .await
        .expect("second call should succeed");

    assert_eq!(second.as_slice(), &[1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn stream_yields_increments_before_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hello_body()))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let stream = client
        .generate_stream("hi", &Context::new())
        .await
        .expect("should succeed");

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Ok(GenerateEvent::Increment(t)) if t == "Hel"));
    assert!(matches!(&events[1], Ok(GenerateEvent::Increment(t)) if t == "lo"));

    let Some(Ok(GenerateEvent::Complete(completion))) = events.last() else {
        panic!("expected Complete last, got: {events:?}");
    };
    assert_eq!(completion.response, "Hello");
    assert_eq!(completion.done_reason.as_deref(), Some("stop"));
    assert_eq!(completion.model.as_deref(), Some("m"));
    assert_eq!(completion.stats.eval_count, Some(2));
    assert_eq!(completion.stats.tokens_per_second(), Some(2.0));
}

#[tokio::test]
async fn non_success_status_is_request_error_with_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'nonexistent' not found"))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new()
        .model("nonexistent")
        .base_url(mock_server.uri());
    let mut called = false;
    let err = client
        .generate("hi", &Context::new(), |_| called = true)
        .await
        .unwrap_err();

    assert!(!called);
    assert!(err.is_model_not_found());
    match err {
        GenerateError::Request { status, body } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body, "model 'nonexistent' not found");
        }
        other => panic!("expected Request, got: {other:?}"),
    }
}

/// Serve one raw HTTP response on a local port, then close the connection.
async fn serve_once(response: &'static [u8]) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket.write_all(response).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn truncated_error_body_keeps_status() {
    let base_url = serve_once(
        b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\nmodel crashed",
    )
    .await;

    let client = GenerateClient::new().base_url(base_url);
    let err = client
        .generate("hi", &Context::new(), |_| {})
        .await
        .unwrap_err();

    match &err {
        GenerateError::Request { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.contains("unreadable"), "unexpected body: {body}");
        }
        other => panic!("expected Request, got: {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn truncated_error_body_on_client_error_is_not_retryable() {
    let base_url = serve_once(
        b"HTTP/1.1 400 Bad Request\r\ncontent-length: 100\r\n\r\nbad",
    )
    .await;

    let client = GenerateClient::new().base_url(base_url);
    let err = client
        .generate_stream("hi", &Context::new())
        .await
        .unwrap_err();

    assert!(
        matches!(&err, GenerateError::Request { status, .. } if status.as_u16() == 400),
        "expected Request, got: {err:?}"
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn server_error_status_is_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal server error"))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let err = client
        .generate_stream("hi", &Context::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerateError::Request { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn error_frame_fails_with_generation_error() {
    let mock_server = MockServer::start().await;

    let body = ndjson(&[
        serde_json::json!({"response": "par", "done": false}),
        serde_json::json!({"error": "out of memory"}),
        serde_json::json!({"response": "tial", "done": false}),
        serde_json::json!({"response": "", "done": true, "context": [1]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let mut text = String::new();
    let err = client
        .generate("hi", &Context::new(), |t| text.push_str(t))
        .await
        .unwrap_err();

    assert_eq!(text, "par");
    assert!(
        matches!(&err, GenerateError::Generation(msg) if msg == "out of memory"),
        "expected Generation, got: {err:?}"
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_line_fails_with_protocol_error() {
    let mock_server = MockServer::start().await;

    let body = concat!(
        r#"{"response":"a","done":false}"#,
        "\n",
        "<html>bad gateway</html>\n",
        r#"{"response":"","done":true,"context":[1]}"#,
        "\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let mut text = String::new();
    let err = client
        .generate("hi", &Context::new(), |t| text.push_str(t))
        .await
        .unwrap_err();

    assert_eq!(text, "a");
    match err {
        GenerateError::Protocol { line, .. } => assert_eq!(line, "<html>bad gateway</html>"),
        other => panic!("expected Protocol, got: {other:?}"),
    }
}

#[tokio::test]
async fn stream_closed_without_done_is_incomplete() {
    let mock_server = MockServer::start().await;

    let body = ndjson(&[
        serde_json::json!({"response": "Hel", "done": false}),
        serde_json::json!({"response": "lo", "done": false}),
    ]);

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let mut text = String::new();
    let err = client
        .generate("hi", &Context::new(), |t| text.push_str(t))
        .await
        .unwrap_err();

    assert_eq!(text, "Hello");
    assert!(
        matches!(err, GenerateError::IncompleteStream { frames: 2, .. }),
        "expected IncompleteStream, got: {err:?}"
    );
}

#[tokio::test]
async fn empty_prompt_is_rejected_without_sending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(hello_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new().base_url(mock_server.uri());
    let err = client
        .generate("", &Context::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, GenerateError::InvalidRequest(_)));
}

#[tokio::test]
async fn configured_fields_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "mistral",
            "system": "answer in French",
            "keep_alive": "0",
            "options": {"temperature": 0.5, "seed": 42},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(hello_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new()
        .model("mistral")
        .system("answer in French")
        .keep_alive("0")
        .options(GenerateOptions {
            temperature: Some(0.5),
            seed: Some(42),
            ..Default::default()
        })
        .base_url(mock_server.uri());

    client
        .generate("bonjour", &Context::new(), |_| {})
        .await
        .expect("should succeed");
}

#[tokio::test]
async fn slow_headers_hit_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(hello_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = GenerateClient::new()
        .base_url(mock_server.uri())
        .request_timeout(Duration::from_millis(100));
    let err = client
        .generate_stream("hi", &Context::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, GenerateError::Timeout(d) if d == Duration::from_millis(100)),
        "expected Timeout, got: {err:?}"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let client = GenerateClient::new().base_url("http://127.0.0.1:1");
    let err = client
        .generate("hi", &Context::new(), |_| {})
        .await
        .unwrap_err();

    assert!(
        matches!(err, GenerateError::Network(_)),
        "expected Network, got: {err:?}"
    );
    assert!(err.is_retryable());
}
