use crate::stream::StreamEvent;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use std::collections::VecDeque;

/// State for managing streaming text output
#[derive(Clone)]
pub struct StreamState {
    /// Accumulated text buffer
    text_buffer: String,
    /// Lines ready to be displayed
    queued_lines: VecDeque<Line<'static>>,
    /// Current line being built
    current_line: String,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            text_buffer: String::new(),
            queued_lines: VecDeque::new(),
            current_line: String::new(),
        }
    }

    /// Process a text delta from the stream
    pub fn push_delta(&mut self, delta: &str) {
        self.text_buffer.push_str(delta);
        self.current_line.push_str(delta);

        // Check for complete lines
        while let Some(newline_pos) = self.current_line.find('\n') {
            let line_content = self.current_line[..newline_pos].to_string();
            self.current_line = self.current_line[newline_pos + 1..].to_string();
            self.queued_lines
                .push_back(Line::from(vec![Span::raw(line_content)]));
        }
    }

    /// Get all complete lines collected so far
    pub fn drain_lines(&mut self) -> Vec<Line<'static>> {
        self.queued_lines.drain(..).collect()
    }

    /// Get the current partial line (for cursor display)
    pub fn current_line(&self) -> &str {
        &self.current_line
    }

    /// Full text accumulated so far
    pub fn accumulated(&self) -> &str {
        &self.text_buffer
    }

    /// Finalize and get any remaining content
    pub fn finalize(&mut self) -> Vec<Line<'static>> {
        let mut lines = self.drain_lines();

        if !self.current_line.trim().is_empty() {
            lines.push(Line::from(vec![Span::raw(self.current_line.clone())]));
        }

        lines
    }

    /// Clear all state
    pub fn clear(&mut self) {
        self.text_buffer.clear();
        self.queued_lines.clear();
        self.current_line.clear();
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller that feeds stream events into display state.
///
/// Mirrors the session state machine: streaming until the terminal event,
/// then complete. Terminal states are never left; a new generation gets a
/// fresh controller via `reset`.
#[derive(Clone)]
pub struct StreamController {
    state: StreamState,
    is_streaming: bool,
    is_complete: bool,
    error: Option<String>,
}

impl StreamController {
    pub fn new() -> Self {
        Self {
            state: StreamState::new(),
            is_streaming: false,
            is_complete: false,
            error: None,
        }
    }

    /// Start streaming
    pub fn start_streaming(&mut self) {
        self.is_streaming = true;
        self.is_complete = false;
        self.error = None;
    }

    /// Process a stream event, returning any display lines it produced
    pub fn process_event(&mut self, event: &StreamEvent) -> Vec<Line<'static>> {
        match event {
            StreamEvent::ConversationId(_) => {
                // Out-of-band signal; nothing to render
                Vec::new()
            }
            StreamEvent::Delta(delta) => {
                self.state.push_delta(delta);
                self.state.drain_lines()
            }
            StreamEvent::Done => {
                self.is_complete = true;
                self.is_streaming = false;
                self.state.finalize()
            }
            StreamEvent::Error(error) => {
                self.is_complete = true;
                self.is_streaming = false;
                self.error = Some(error.to_string());
                vec![Line::from(vec![
                    Span::styled("Error: ", Style::default().fg(Color::Red)),
                    Span::raw(error.to_string()),
                ])]
            }
        }
    }

    /// Get the current partial line for display
    pub fn current_line(&self) -> Option<Line<'static>> {
        let current = self.state.current_line();
        if current.is_empty() {
            None
        } else {
            Some(Line::from(vec![
                Span::raw(current.to_string()),
                Span::styled("▋", Style::default().fg(Color::Green)),
            ]))
        }
    }

    /// Full text accumulated so far
    pub fn accumulated(&self) -> &str {
        self.state.accumulated()
    }

    /// Check if streaming is active
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Check if streaming reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Error message, when the session ended in one
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Reset the controller for a fresh session
    pub fn reset(&mut self) {
        self.state.clear();
        self.is_streaming = false;
        self.is_complete = false;
        self.error = None;
    }
}

impl Default for StreamController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamError;

    #[test]
    fn deltas_accumulate_and_split_into_lines() {
        let mut state = StreamState::new();
        state.push_delta("Hel");
        state.push_delta("lo, ");
        state.push_delta("world\nsecond");

        assert_eq!(state.accumulated(), "Hello, world\nsecond");
        let lines = state.drain_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(state.current_line(), "second");
    }

    #[test]
    fn finalize_flushes_the_partial_line() {
        let mut state = StreamState::new();
        state.push_delta("one\ntwo");
        let lines = state.finalize();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn done_marks_the_controller_complete() {
        let mut controller = StreamController::new();
        controller.start_streaming();
        controller.process_event(&StreamEvent::Delta("hi".to_string()));
        assert!(controller.is_streaming());

        controller.process_event(&StreamEvent::Done);
        assert!(!controller.is_streaming());
        assert!(controller.is_complete());
        assert!(controller.error().is_none());
    }

    #[test]
    fn errors_are_terminal_and_recorded() {
        let mut controller = StreamController::new();
        controller.start_streaming();
        let lines = controller.process_event(&StreamEvent::Error(StreamError::Transport(
            "connection reset".to_string(),
        )));
        assert_eq!(lines.len(), 1);
        assert!(controller.is_complete());
        assert!(controller.error().unwrap().contains("connection reset"));
    }
}
