//! Streaming generation client for the Vaelis backend.
//!
//! `POST /ai/stream` answers with `text/event-stream`. Each `data:` payload is
//! a small JSON object carrying exactly one of: the conversation id assigned
//! to this turn, an incremental text delta, a server-side error, or the
//! explicit `{"done": true}` end marker. The end marker is how a clean finish
//! is told apart from a dropped connection.

use crate::config::Config;
use crate::events::ChatMode;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

/// One text-generation request. Immutable once a stream starts.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub mode: ChatMode,
    pub use_search: bool,
    /// When present, the new turn is appended to this conversation server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conv_id: Option<i64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            use_search: false,
            conv_id: None,
        }
    }

    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    pub fn with_conversation(mut self, conv_id: Option<i64>) -> Self {
        self.conv_id = conv_id;
        self
    }
}

/// Events emitted by a stream session, in transport order.
///
/// `Done` and `Error` are terminal and mutually exclusive; nothing follows
/// either. The conversation id is an out-of-band signal and may arrive
/// before, between, or after deltas, but at most once per session.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The backend assigned or confirmed the conversation for this turn
    ConversationId(i64),
    /// Incremental text delta (the delta only, never the accumulation)
    Delta(String),
    /// Explicit end marker received; the session completed cleanly
    Done,
    /// The session failed; see the error for which way
    Error(StreamError),
}

/// Failure taxonomy for a stream session.
///
/// Neither variant is retried internally; falling back to the single-shot
/// call is the caller's policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// Connection could not be established, dropped early, or the backend
    /// reported a generation failure
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body did not follow the expected framing
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Handle to an in-flight stream session.
pub struct StreamHandle {
    task: tokio::task::JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl StreamHandle {
    /// Abort the transport. Idempotent. No new events are produced after this
    /// returns; events already sitting in the channel may still be read.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether the session has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Frame shapes the backend multiplexes onto one `data:` channel
#[derive(Debug, Deserialize)]
struct ServerFrame {
    conv_id: Option<i64>,
    delta: Option<String>,
    error: Option<String>,
    message: Option<String>,
    done: Option<bool>,
}

/// Capacity of the event channel. A bounded channel is the backpressure
/// policy: when the consumer lags this far behind, the transport task waits.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client for streaming generations
#[derive(Clone)]
pub struct StreamClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    idle_timeout: Duration,
    max_output_bytes: usize,
}

impl StreamClient {
    pub fn new(config: &Config) -> Self {
        // No overall request timeout: a healthy stream can outlive any fixed
        // deadline. Stalls are caught by the idle timeout instead.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token(),
            idle_timeout: Duration::from_secs(config.stream.idle_timeout_secs),
            max_output_bytes: config.stream.max_output_bytes,
        }
    }

    /// Open a stream session for `request`.
    ///
    /// Returns immediately; all results arrive through the receiver. Every
    /// call builds a fresh session — terminated sessions are never reused.
    /// The caller is responsible for stopping a prior session before starting
    /// the next one for the same composer.
    pub fn start_stream(
        &self,
        request: GenerationRequest,
    ) -> (StreamHandle, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stopped = Arc::new(AtomicBool::new(false));

        let client = self.client.clone();
        let url = format!("{}/ai/stream", self.base_url);
        let token = self.token.clone();
        let idle = self.idle_timeout;
        let max_bytes = self.max_output_bytes;

        let guard = stopped.clone();
        let task = tokio::spawn(async move {
            let session = StreamSession {
                tx,
                stopped: guard,
                idle,
                max_bytes,
            };
            session.run(client, url, token, request).await;
        });

        (StreamHandle { task, stopped }, rx)
    }
}

/// State for one in-flight session, owned by the transport task
struct StreamSession {
    tx: mpsc::Sender<StreamEvent>,
    stopped: Arc<AtomicBool>,
    idle: Duration,
    max_bytes: usize,
}

impl StreamSession {
    async fn run(
        &self,
        client: reqwest::Client,
        url: String,
        token: Option<String>,
        request: GenerationRequest,
    ) {
        match self.consume(client, url, token, request).await {
            Ok(()) => {
                self.emit(StreamEvent::Done).await;
            }
            Err(err) => {
                warn!("stream session failed: {}", err);
                self.emit(StreamEvent::Error(err)).await;
            }
        }
    }

    /// Read the transport until the end marker. `Ok` means exactly the clean
    /// completion; every other exit is a terminal error.
    async fn consume(
        &self,
        client: reqwest::Client,
        url: String,
        token: Option<String>,
        request: GenerationRequest,
    ) -> Result<(), StreamError> {
        let Some(token) = token else {
            return Err(StreamError::Transport(
                "no API token configured".to_string(),
            ));
        };

        let payload = serde_json::json!({
            "prompt": request.prompt,
            "mode": request.mode.wire_name(),
            "use_search": request.use_search,
            "conv_id": request.conv_id,
        });

        debug!(mode = request.mode.wire_name(), "opening generation stream");

        let response = client
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "text/event-stream")
            .json(&payload)
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Transport(format!(
                "backend returned {}: {}",
                status,
                body.trim()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut accumulated = 0usize;
        let mut conv_id_sent = false;

        loop {
            let chunk = match timeout(self.idle, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    return Err(StreamError::Transport(e.to_string()));
                }
                Ok(None) => {
                    // Connection closed without the end marker
                    return Err(StreamError::Transport(
                        "connection closed before end of stream".to_string(),
                    ));
                }
                Err(_) => {
                    return Err(StreamError::Transport(format!(
                        "no data received for {}s",
                        self.idle.as_secs()
                    )));
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete lines
            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].trim().to_string();
                buffer = buffer[newline_pos + 1..].to_string();

                // Blank separators, comments, and keepalives carry no payload
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                let frame: ServerFrame = serde_json::from_str(data).map_err(|e| {
                    StreamError::Protocol(format!("unparseable frame: {}", e))
                })?;

                if let Some(error) = frame.error {
                    let detail = frame.message.unwrap_or_default();
                    return Err(StreamError::Transport(format!(
                        "{}: {}",
                        error,
                        detail.trim()
                    )));
                }

                if let Some(id) = frame.conv_id {
                    // At most once per session, whatever the backend repeats
                    if !conv_id_sent {
                        conv_id_sent = true;
                        if !self.emit(StreamEvent::ConversationId(id)).await {
                            return Ok(());
                        }
                    }
                    continue;
                }

                if frame.done == Some(true) {
                    return Ok(());
                }

                if let Some(delta) = frame.delta {
                    if delta.is_empty() {
                        continue;
                    }
                    accumulated += delta.len();
                    if accumulated > self.max_bytes {
                        return Err(StreamError::Protocol(format!(
                            "response exceeded {} bytes",
                            self.max_bytes
                        )));
                    }
                    if !self.emit(StreamEvent::Delta(delta)).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Send an event unless the session was stopped or the receiver is gone.
    /// Returns false when the session should wind down without a terminal
    /// event (the reader already walked away).
    async fn emit(&self, event: StreamEvent) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }
}
