//! End-to-end tests for the streaming consumer against a mock backend.

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use vaelis::config::Config;
use vaelis::events::ChatMode;
use vaelis::stream::{GenerationRequest, StreamClient, StreamError, StreamEvent};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api_base_url = base_url.to_string();
    config.api_token = Some("test-token".to_string());
    config.stream.idle_timeout_secs = 2;
    config
}

/// Build an SSE body from `data:` frames
fn sse_body(frames: &[serde_json::Value]) -> String {
    frames
        .iter()
        .map(|frame| format!("data: {}\n\n", frame))
        .collect()
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/ai/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

/// Drain every event the session produces
async fn collect_events(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let deadline = timeout(Duration::from_secs(10), async {
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
    });
    deadline.await.expect("stream did not terminate in time");
    events
}

fn deltas(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Delta(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

fn count_done(events: &[StreamEvent]) -> usize {
    events.iter().filter(|e| matches!(e, StreamEvent::Done)).count()
}

fn count_errors(events: &[StreamEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Error(_)))
        .count()
}

#[tokio::test]
async fn deltas_arrive_in_order_followed_by_exactly_one_done() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse_body(&[
            json!({"delta": "Hel"}),
            json!({"delta": "lo, "}),
            json!({"delta": "world"}),
            json!({"done": true}),
        ]),
    )
    .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["Hel", "lo, ", "world"]);
    assert_eq!(deltas(&events).concat(), "Hello, world");
    assert_eq!(count_done(&events), 1);
    assert_eq!(count_errors(&events), 0);
    // Done is last
    assert!(matches!(events.last(), Some(StreamEvent::Done)));
}

#[tokio::test]
async fn conversation_id_before_content_is_delivered_before_first_delta() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse_body(&[
            json!({"conv_id": 42}),
            json!({"delta": "ok"}),
            json!({"done": true}),
        ]),
    )
    .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    let conv_pos = events
        .iter()
        .position(|e| matches!(e, StreamEvent::ConversationId(42)))
        .expect("conversation id was not delivered");
    let delta_pos = events
        .iter()
        .position(|e| matches!(e, StreamEvent::Delta(_)))
        .expect("delta was not delivered");
    assert!(conv_pos < delta_pos);
    assert_eq!(count_done(&events), 1);
}

#[tokio::test]
async fn conversation_id_after_content_still_fires_exactly_once() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse_body(&[
            json!({"delta": "first"}),
            json!({"conv_id": 7}),
            json!({"conv_id": 7}),
            json!({"delta": "second"}),
            json!({"done": true}),
        ]),
    )
    .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Think));
    let events = collect_events(rx).await;

    let conv_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::ConversationId(_)))
        .collect();
    assert_eq!(conv_events.len(), 1);
    assert_eq!(deltas(&events), vec!["first", "second"]);
    assert_eq!(count_done(&events), 1);
}

#[tokio::test]
async fn dropped_connection_after_partial_output_is_a_transport_error() {
    let server = MockServer::start().await;
    // Body ends without the explicit end marker: a dropped connection,
    // not a clean finish
    mount_stream(&server, sse_body(&[json!({"delta": "partial"})])).await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["partial"]);
    assert_eq!(count_done(&events), 0);
    assert_eq!(count_errors(&events), 1);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Transport(_)))
    ));
}

#[tokio::test]
async fn fallback_call_succeeds_after_stream_failure() {
    let server = MockServer::start().await;
    mount_stream(&server, sse_body(&[json!({"delta": "partial"})])).await;
    Mock::given(method("POST"))
        .and(path("/ai/generate"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"prompt": "hi", "mode": "chat"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": "full response",
            "conv_id": 9,
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let client = StreamClient::new(&config);
    let request = GenerationRequest::new("hi", ChatMode::Chat);
    let (_handle, rx) = client.start_stream(request.clone());
    let events = collect_events(rx).await;
    assert_eq!(count_errors(&events), 1);

    // Caller-level policy: same tuple, non-streaming endpoint
    let api = vaelis::api::ApiClient::new(&config);
    let result = api.generate(&request).await.unwrap();
    assert_eq!(result.output, "full response");
    assert_eq!(result.conv_id, Some(9));
}

#[tokio::test]
async fn stop_before_first_chunk_suppresses_every_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    sse_body(&[json!({"delta": "late"}), json!({"done": true})]),
                    "text/event-stream",
                )
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (handle, mut rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));

    handle.stop();
    handle.stop(); // idempotent

    let next = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("channel should close promptly after stop");
    assert!(next.is_none(), "no event may follow stop(), got {:?}", next);
}

#[tokio::test]
async fn non_2xx_status_is_a_single_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/stream"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        StreamEvent::Error(StreamError::Transport(msg)) if msg.contains("502")
    ));
}

#[tokio::test]
async fn malformed_frame_is_a_terminal_protocol_error() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {{not json\n\ndata: {}\n\n",
        json!({"delta": "ok"}),
        json!({"done": true}),
    );
    mount_stream(&server, body).await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["ok"]);
    assert_eq!(count_done(&events), 0, "done must not follow an error");
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Protocol(_)))
    ));
}

#[tokio::test]
async fn server_reported_error_frame_terminates_without_done() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse_body(&[
            json!({"delta": "par"}),
            json!({"error": "model_error", "message": "upstream failed"}),
            json!({"done": true}),
        ]),
    )
    .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["par"]);
    assert_eq!(count_done(&events), 0);
    assert_eq!(count_errors(&events), 1);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Transport(msg))) if msg.contains("model_error")
    ));
}

#[tokio::test]
async fn comments_keepalives_and_blank_lines_are_ignored() {
    let server = MockServer::start().await;
    let body = format!(
        ": keepalive\n\nevent: ping\n\n\ndata: {}\n\n: another comment\ndata: {}\n\n",
        json!({"delta": "hello"}),
        json!({"done": true}),
    );
    mount_stream(&server, body).await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Study));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["hello"]);
    assert_eq!(count_done(&events), 1);
    assert_eq!(count_errors(&events), 0);
}

#[tokio::test]
async fn oversized_accumulation_is_a_protocol_error() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse_body(&[
            json!({"delta": "0123"}),
            json!({"delta": "4567"}),
            json!({"delta": "89AB"}),
            json!({"done": true}),
        ]),
    )
    .await;

    let mut config = test_config(&server.uri());
    config.stream.max_output_bytes = 8;
    let client = StreamClient::new(&config);
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    // The delta that crosses the bound is withheld
    assert_eq!(deltas(&events), vec!["0123", "4567"]);
    assert_eq!(count_done(&events), 0);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Protocol(_)))
    ));
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    // No mock server mounted at all: the session must fail locally
    let mut config = test_config("http://127.0.0.1:9");
    config.api_token = None;

    let client = StreamClient::new(&config);
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        StreamEvent::Error(StreamError::Transport(msg)) if msg.contains("token")
    ));
}

/// Serve one SSE response that sends a single delta then goes silent,
/// without ever closing. Exercises the idle timeout.
async fn stalled_sse_server() -> std::net::SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 8192];
            let _ = socket.read(&mut buf).await;

            let headers = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
            let _ = socket.write_all(headers.as_bytes()).await;

            let frame = "data: {\"delta\": \"partial\"}\n\n";
            let chunk = format!("{:x}\r\n{}\r\n", frame.len(), frame);
            let _ = socket.write_all(chunk.as_bytes()).await;
            let _ = socket.flush().await;

            // Hold the connection open, sending nothing further
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    addr
}

#[tokio::test]
async fn stalled_stream_errors_after_the_idle_timeout() {
    let addr = stalled_sse_server().await;

    let mut config = test_config(&format!("http://{}", addr));
    config.stream.idle_timeout_secs = 1;

    let client = StreamClient::new(&config);
    let (_handle, rx) = client.start_stream(GenerationRequest::new("hi", ChatMode::Chat));
    let events = collect_events(rx).await;

    assert_eq!(deltas(&events), vec!["partial"]);
    assert_eq!(count_done(&events), 0);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error(StreamError::Transport(msg))) if msg.contains("no data")
    ));
}

#[tokio::test]
async fn request_carries_mode_search_and_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/stream"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "prompt": "explain lifetimes",
            "mode": "study",
            "use_search": true,
            "conv_id": 12,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[json!({"delta": "ok"}), json!({"done": true})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = StreamClient::new(&test_config(&server.uri()));
    let request = GenerationRequest::new("explain lifetimes", ChatMode::Study)
        .with_search(true)
        .with_conversation(Some(12));
    let (_handle, rx) = client.start_stream(request);
    let events = collect_events(rx).await;

    assert_eq!(count_done(&events), 1);
}
