use crate::stream::StreamEvent;
use crate::streaming::StreamController;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// Streaming response indicator shown above the composer while a generation
/// is in flight
#[derive(Clone)]
pub struct StreamingResponse {
    controller: StreamController,
}

impl StreamingResponse {
    pub fn new() -> Self {
        Self {
            controller: StreamController::new(),
        }
    }

    /// Start streaming a new response
    pub fn start_streaming(&mut self) {
        self.controller.reset();
        self.controller.start_streaming();
    }

    /// Process a stream event; returns false once the session is terminal
    pub fn process_event(&mut self, event: &StreamEvent) -> bool {
        self.controller.process_event(event);
        !self.controller.is_complete()
    }

    /// Check if currently streaming
    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// Get the accumulated response content
    pub fn response(&self) -> &str {
        self.controller.accumulated()
    }

    /// Error from the session, when it ended in one
    pub fn error(&self) -> Option<&str> {
        self.controller.error()
    }

    /// Clear the response
    pub fn clear(&mut self) {
        self.controller.reset();
    }
}

impl Default for StreamingResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StreamingResponse {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.controller.is_streaming() {
            return;
        }

        let dots = match (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            / 300)
            % 4
        {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        };

        let indicator = Line::from(vec![
            Span::styled("vaelis is responding", Style::default().fg(Color::Green)),
            Span::styled(dots, Style::default().fg(Color::Yellow)),
            Span::styled(
                "  (Esc to stop)",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        buf.set_line(area.x, area.y, &indicator, area.width);
    }
}
