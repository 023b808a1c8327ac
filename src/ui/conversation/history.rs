//! Conversation history display component

use crate::events::{ChatMode, ConversationRole};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::collections::VecDeque;

/// A single message in the conversation history
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub role: ConversationRole,
    pub content: String,
    pub mode: ChatMode,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Conversation history display component
#[derive(Clone)]
pub struct ConversationHistory {
    messages: VecDeque<HistoryMessage>,
    max_messages: usize,
    show_timestamps: bool,
    streaming_message: Option<String>,
}

impl ConversationHistory {
    pub fn new(max_messages: usize, show_timestamps: bool) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages,
            show_timestamps,
            streaming_message: None,
        }
    }

    /// Add a new message to the history
    pub fn add_message(&mut self, message: HistoryMessage) {
        self.messages.push_back(message);

        if self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }

    /// Add a user message
    pub fn add_user_message(&mut self, content: String, mode: ChatMode) {
        self.add_message(HistoryMessage {
            role: ConversationRole::User,
            content,
            mode,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Add an assistant message
    pub fn add_assistant_message(&mut self, content: String, mode: ChatMode) {
        self.add_message(HistoryMessage {
            role: ConversationRole::Assistant,
            content,
            mode,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Add a system message
    pub fn add_system_message(&mut self, content: String, mode: ChatMode) {
        self.add_message(HistoryMessage {
            role: ConversationRole::System,
            content,
            mode,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Clear all messages
    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming_message = None;
    }

    /// Get message count
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Set the current streaming message
    pub fn set_streaming_message(&mut self, message: String) {
        self.streaming_message = Some(message);
    }

    /// Clear the streaming message
    pub fn clear_streaming_message(&mut self) {
        self.streaming_message = None;
    }
}

impl Widget for ConversationHistory {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() && self.streaming_message.is_none() {
            let welcome_lines = vec![
                Line::from(vec![Span::styled(
                    "Welcome to Vaelis",
                    Style::default().fg(Color::Green),
                )]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Type below to start a conversation.",
                    Style::default().fg(Color::Gray),
                )]),
                Line::from(vec![Span::styled(
                    "Enter sends, Shift+Enter inserts a newline, / opens commands.",
                    Style::default().fg(Color::DarkGray),
                )]),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
        } else {
            // Collect all lines for messages (including streaming if any)
            let mut all_lines: Vec<Line> = Vec::new();
            for message in self.messages.iter() {
                let mut lines = self.render_message(message, inner_area.width);
                all_lines.append(&mut lines);
                all_lines.push(Line::from(vec![Span::raw("")]));
            }

            if let Some(ref streaming_text) = self.streaming_message {
                let mut streaming_lines =
                    self.render_streaming_message(streaming_text, inner_area.width);
                all_lines.append(&mut streaming_lines);
            }

            // Show the tail that fits
            let height = inner_area.height as usize;
            let total = all_lines.len();
            let start = total.saturating_sub(height);
            let visible = &all_lines[start..];

            for (i, line) in visible.iter().enumerate() {
                buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
            }
        }
    }
}

impl ConversationHistory {
    /// Render a single message into lines
    fn render_message(&self, message: &HistoryMessage, width: u16) -> Vec<Line> {
        let mut lines = Vec::new();

        let role_label = match message.role {
            ConversationRole::User => "you",
            ConversationRole::Assistant => "vaelis",
            ConversationRole::System => "system",
        };

        let header = if self.show_timestamps {
            format!(
                "{} · {} · {}",
                role_label,
                message.mode.display_name().to_lowercase(),
                message.timestamp.format("%H:%M:%S")
            )
        } else {
            format!("{} · {}", role_label, message.mode.display_name().to_lowercase())
        };

        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let content_lines = wrap_text(&message.content, width.saturating_sub(2) as usize);
        for content_line in content_lines {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, self.content_style(&message.role)),
            ]));
        }

        lines
    }

    /// Get content style based on role
    fn content_style(&self, role: &ConversationRole) -> Style {
        match role {
            ConversationRole::User => Style::default().fg(Color::Blue),
            ConversationRole::Assistant => Style::default().fg(Color::Green),
            ConversationRole::System => Style::default().fg(Color::Yellow),
        }
    }

    /// Render the in-flight assistant message with a cursor
    fn render_streaming_message(&self, text: &str, width: u16) -> Vec<Line> {
        let mut lines = Vec::new();

        lines.push(Line::from(vec![Span::styled(
            "vaelis · responding",
            Style::default().fg(Color::DarkGray),
        )]));

        let content_lines = wrap_text(text, width.saturating_sub(2) as usize);
        for (i, content_line) in content_lines.iter().enumerate() {
            let is_last_line = i == content_lines.len() - 1;
            let cursor = if is_last_line { "▋" } else { "" };

            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line.clone(), Style::default().fg(Color::Green)),
                Span::styled(cursor, Style::default().fg(Color::Yellow)),
            ]));
        }

        lines
    }
}

/// Wrap text to fit within the given width, preserving explicit newlines
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current_line = String::new();

        for word in paragraph.split_whitespace() {
            if current_line.chars().count() + word.chars().count() + 1 <= width {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(word);
            } else {
                if !current_line.is_empty() {
                    lines.push(current_line);
                    current_line = String::new();
                }
                current_line.push_str(word);
            }
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped() {
        let mut history = ConversationHistory::new(2, false);
        history.add_user_message("one".to_string(), ChatMode::Chat);
        history.add_user_message("two".to_string(), ChatMode::Chat);
        history.add_user_message("three".to_string(), ChatMode::Chat);
        assert_eq!(history.message_count(), 2);
    }

    #[test]
    fn wrap_preserves_explicit_newlines() {
        let lines = wrap_text("first\nsecond paragraph here", 10);
        assert_eq!(lines[0], "first");
        assert!(lines.len() >= 3);
    }
}
