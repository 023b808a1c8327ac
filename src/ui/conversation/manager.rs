use crate::api::{ApiClient, ConversationDetail, GenerationResult};
use crate::config::Config;
use crate::events::{ChatMode, ConversationRole};
use crate::recents::RecentsStore;
use crate::stream::{GenerationRequest, StreamClient, StreamEvent, StreamHandle};
use crate::ui::conversation::commands::{ParsedCommand, SlashCommand, get_help_text};
use crate::ui::conversation::composer::{Composer, ComposerResult, mode_placeholder};
use crate::ui::conversation::history::ConversationHistory;
use crate::ui::conversation::streaming::StreamingResponse;
use anyhow::Result;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Actions that bubble up from the conversation manager to the app loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// One in-flight stream session owned by this composer.
///
/// At most one exists at a time; starting a new generation stops the
/// previous session first.
struct ActiveStream {
    handle: StreamHandle,
    rx: mpsc::Receiver<StreamEvent>,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager {
    history: ConversationHistory,
    composer: Composer,
    streaming: StreamingResponse,
    stream_client: StreamClient,
    api: ApiClient,
    recents: RecentsStore,
    mode: ChatMode,
    use_search: bool,
    conv_id: Option<i64>,
    conv_title: Option<String>,
    active: Option<ActiveStream>,
    last_request: Option<GenerationRequest>,
    fallback_rx: Option<oneshot::Receiver<Result<GenerationResult>>>,
}

impl ConversationManager {
    pub fn new(config: &Config) -> Self {
        let mode = config.default_mode;
        let mut composer = Composer::new(mode_placeholder(mode).to_string(), mode);
        composer.set_focus(true);
        composer.set_search_enabled(config.use_search);

        Self {
            history: ConversationHistory::new(config.ui.history_limit, config.ui.show_timestamps),
            composer,
            streaming: StreamingResponse::new(),
            stream_client: StreamClient::new(config),
            api: ApiClient::new(config),
            recents: RecentsStore::new(config),
            mode,
            use_search: config.use_search,
            conv_id: None,
            conv_title: None,
            active: None,
            last_request: None,
            fallback_rx: None,
        }
    }

    /// Populate the view from a persisted conversation (resume flow)
    pub fn resume(&mut self, detail: ConversationDetail) {
        self.conv_id = Some(detail.conversation.id);
        self.conv_title = detail.conversation.title.clone();

        for message in &detail.messages {
            self.history.add_message(crate::ui::conversation::history::HistoryMessage {
                role: ConversationRole::parse(&message.role),
                content: message.content.clone(),
                mode: self.mode,
                timestamp: message.created_at.unwrap_or_else(chrono::Utc::now),
            });
        }

        if let Some(title) = &detail.conversation.title {
            self.record_recent(detail.conversation.id, title);
        }
        info!(conv_id = detail.conversation.id, "resumed conversation");
    }

    /// Current mode, for persisting back into config on exit
    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Current search toggle, for persisting back into config on exit
    pub fn use_search(&self) -> bool {
        self.use_search
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> ConversationAction {
        // Esc stops an in-flight generation once the palette is out of the way
        if key.code == crossterm::event::KeyCode::Esc
            && !self.composer.palette_open()
            && self.active.is_some()
        {
            self.stop_generation();
            return ConversationAction::None;
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(input) => {
                self.submit_prompt(input);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    /// Start a generation for a freshly composed prompt
    fn submit_prompt(&mut self, prompt: String) {
        if prompt.trim().is_empty() {
            return;
        }

        self.history.add_user_message(prompt.clone(), self.mode);
        if self.conv_title.is_none() {
            self.conv_title = Some(prompt.clone());
        }

        let request = GenerationRequest::new(prompt, self.mode)
            .with_search(self.use_search)
            .with_conversation(self.conv_id);
        self.start_stream(request);
    }

    /// Open a stream session for `request`, stopping any prior one first
    fn start_stream(&mut self, request: GenerationRequest) {
        if let Some(active) = self.active.take() {
            active.handle.stop();
            self.finalize_partial("(interrupted)");
        }
        self.fallback_rx = None;

        self.last_request = Some(request.clone());
        self.streaming.start_streaming();
        self.history.set_streaming_message(String::new());

        let (handle, rx) = self.stream_client.start_stream(request);
        self.active = Some(ActiveStream { handle, rx });
    }

    /// Drain pending stream and fallback events. Called from the app loop on
    /// every tick; never blocks.
    pub fn process_events(&mut self) {
        self.poll_fallback();

        loop {
            let polled = match self.active.as_mut() {
                Some(active) => active.rx.try_recv(),
                None => break,
            };

            match polled {
                Ok(StreamEvent::ConversationId(id)) => {
                    self.note_conversation_id(id);
                }
                Ok(StreamEvent::Delta(delta)) => {
                    self.streaming.process_event(&StreamEvent::Delta(delta));
                    self.history
                        .set_streaming_message(self.streaming.response().to_string());
                }
                Ok(StreamEvent::Done) => {
                    let text = self.streaming.response().to_string();
                    self.history.clear_streaming_message();
                    if !text.is_empty() {
                        self.history.add_assistant_message(text, self.mode);
                    }
                    self.streaming.clear();
                    self.active = None;
                    break;
                }
                Ok(StreamEvent::Error(error)) => {
                    // Fallback to the single-shot call is this caller's
                    // policy; the consumer itself never retries.
                    warn!("stream failed, falling back: {}", error);
                    self.history.clear_streaming_message();
                    self.streaming.clear();
                    self.history.add_system_message(
                        format!("Stream failed ({}), retrying without streaming…", error),
                        self.mode,
                    );
                    self.active = None;
                    self.start_fallback();
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    break;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Session wound down without a terminal event (stopped)
                    self.finalize_partial("(stopped)");
                    self.active = None;
                    break;
                }
            }
        }
    }

    /// Issue the single-shot fallback call for the last request
    fn start_fallback(&mut self) {
        let Some(mut request) = self.last_request.clone() else {
            return;
        };
        // The stream may have assigned a conversation before failing
        request.conv_id = self.conv_id;

        let api = self.api.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(api.generate(&request).await);
        });
        self.fallback_rx = Some(rx);
    }

    /// Check whether a pending fallback call has resolved
    fn poll_fallback(&mut self) {
        let Some(rx) = &mut self.fallback_rx else {
            return;
        };

        match rx.try_recv() {
            Ok(Ok(result)) => {
                self.fallback_rx = None;
                if let Some(id) = result.conv_id {
                    self.note_conversation_id(id);
                }
                self.history.add_assistant_message(result.output, self.mode);
            }
            Ok(Err(error)) => {
                self.fallback_rx = None;
                warn!("fallback generation failed: {:#}", error);
                self.history
                    .add_system_message(format!("Generation failed: {:#}", error), self.mode);
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.fallback_rx = None;
            }
        }
    }

    /// Record a backend-assigned conversation id (fires at most once per
    /// session; may arrive before any text)
    fn note_conversation_id(&mut self, id: i64) {
        if self.conv_id != Some(id) {
            self.conv_id = Some(id);
        }
        if let Some(title) = self.conv_title.clone() {
            self.record_recent(id, &title);
        }
    }

    fn record_recent(&self, id: i64, title: &str) {
        if let Err(error) = self.recents.record(id, title, self.mode) {
            warn!("failed to update recents cache: {:#}", error);
        }
    }

    /// Stop the in-flight generation, keeping any partial text
    pub fn stop_generation(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.stop();
            self.finalize_partial("(stopped)");
            self.history
                .add_system_message("Generation stopped.".to_string(), self.mode);
        }
    }

    /// Move accumulated partial text into history with a trailing marker
    fn finalize_partial(&mut self, marker: &str) {
        let partial = self.streaming.response().to_string();
        self.history.clear_streaming_message();
        self.streaming.clear();
        if !partial.is_empty() {
            self.history
                .add_assistant_message(format!("{} {}", partial, marker), self.mode);
        }
    }

    /// Switch to a different mode
    fn switch_mode(&mut self, new_mode: ChatMode) {
        if new_mode == self.mode {
            return;
        }

        self.mode = new_mode;
        self.composer.update_mode(new_mode);
        self.history.add_system_message(
            format!("Switched to {} mode", new_mode.display_name()),
            new_mode,
        );
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.active.is_some() && !command.command.available_during_streaming() {
            self.history.add_system_message(
                format!("/{} is not available while responding", command.command.command()),
                self.mode,
            );
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::Mode => {
                if let Some(target) = command.mode_target() {
                    self.switch_mode(target);
                } else {
                    self.history.add_system_message(
                        format!(
                            "Current mode: {}. Use /mode <chat|think|study|code|document>.",
                            self.mode.display_name()
                        ),
                        self.mode,
                    );
                }
                ConversationAction::None
            }
            SlashCommand::Search => {
                self.use_search = !self.use_search;
                self.composer.set_search_enabled(self.use_search);
                self.history.add_system_message(
                    format!(
                        "Web search {} for new generations",
                        if self.use_search { "enabled" } else { "disabled" }
                    ),
                    self.mode,
                );
                ConversationAction::None
            }
            SlashCommand::New => {
                if let Some(active) = self.active.take() {
                    active.handle.stop();
                }
                self.history.clear();
                self.streaming.clear();
                self.conv_id = None;
                self.conv_title = None;
                self.last_request = None;
                self.fallback_rx = None;
                self.history
                    .add_system_message("Started a new conversation.".to_string(), self.mode);
                ConversationAction::None
            }
            SlashCommand::Retry => {
                if let Some(mut request) = self.last_request.clone() {
                    request.conv_id = self.conv_id;
                    self.history
                        .add_system_message("Retrying last prompt…".to_string(), self.mode);
                    self.start_stream(request);
                } else {
                    self.history
                        .add_system_message("Nothing to retry yet.".to_string(), self.mode);
                }
                ConversationAction::None
            }
            SlashCommand::Help => {
                self.history.add_system_message(get_help_text(), self.mode);
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    /// Render the conversation UI
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.size();
        let streaming = self.streaming.is_streaming();

        let constraints = if streaming {
            vec![
                Constraint::Min(10),
                Constraint::Length(1),
                Constraint::Length(4),
            ]
        } else {
            vec![Constraint::Min(10), Constraint::Length(4)]
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        frame.render_widget(self.history.clone(), chunks[0]);

        if streaming {
            frame.render_widget(self.streaming.clone(), chunks[1]);
            frame.render_widget(self.composer.clone(), chunks[2]);
        } else {
            frame.render_widget(self.composer.clone(), chunks[1]);
        }
    }
}
