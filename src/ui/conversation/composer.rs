use crate::events::ChatMode;
use crate::ui::conversation::commands::{CommandEntry, ParsedCommand, command_entries};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Byte offset into `content`, always on a char boundary
    pub cursor_position: usize,
}

/// Composer for user input, with a slash-command palette
#[derive(Clone)]
pub struct Composer {
    state: RefCell<TextAreaState>,
    placeholder: String,
    has_focus: bool,
    current_mode: ChatMode,
    search_enabled: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl Composer {
    pub fn new(placeholder: String, current_mode: ChatMode) -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            placeholder,
            has_focus: false,
            current_mode,
            search_enabled: false,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input
    pub fn handle_key(&self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        let mut state = self.state.borrow_mut();

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char(&mut state, '\n');
                } else if self.show_command_palette.get() {
                    if self.apply_selected_command(&mut state) {
                        return ComposerResult::None;
                    }
                } else if !state.content.trim().is_empty() {
                    let content = state.content.clone();
                    state.content.clear();
                    state.cursor_position = 0;
                    self.close_command_palette();
                    drop(state);
                    if let Some(command) =
                        crate::ui::conversation::commands::parse_slash_command(&content)
                    {
                        return ComposerResult::Command(command);
                    } else {
                        return ComposerResult::Submitted(content);
                    }
                }
            }
            KeyCode::Up => {
                if self.show_command_palette.get() {
                    self.move_command_selection(-1);
                    return ComposerResult::None;
                }
            }
            KeyCode::Down => {
                if self.show_command_palette.get() {
                    self.move_command_selection(1);
                    return ComposerResult::None;
                }
            }
            KeyCode::Esc => {
                if self.show_command_palette.get() {
                    self.close_command_palette();
                    return ComposerResult::None;
                }
            }
            KeyCode::Tab => {
                if self.show_command_palette.get() {
                    if self.apply_selected_command(&mut state) {
                        return ComposerResult::None;
                    }
                }
            }
            KeyCode::Char(c) => {
                if c == '/' && state.content.is_empty() {
                    self.insert_char(&mut state, c);
                    self.open_command_palette(&state);
                    return ComposerResult::None;
                }

                self.insert_char(&mut state, c);

                if self.show_command_palette.get() {
                    if state.content.starts_with('/') {
                        if c.is_whitespace() {
                            self.close_command_palette();
                        } else {
                            self.refresh_command_palette(&state);
                        }
                    } else {
                        self.close_command_palette();
                    }
                }
            }
            KeyCode::Backspace => {
                if self.backspace(&mut state) {
                    if self.show_command_palette.get() {
                        if state.content.starts_with('/') {
                            self.refresh_command_palette(&state);
                        } else {
                            self.close_command_palette();
                        }
                    }
                }
            }
            KeyCode::Delete => {
                self.delete(&mut state);
            }
            KeyCode::Left => {
                state.cursor_position = prev_boundary(&state.content, state.cursor_position);
            }
            KeyCode::Right => {
                state.cursor_position = next_boundary(&state.content, state.cursor_position);
            }
            KeyCode::Home => {
                state.cursor_position = 0;
            }
            KeyCode::End => {
                state.cursor_position = state.content.len();
            }
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert a character at the cursor position
    fn insert_char(&self, state: &mut TextAreaState, c: char) {
        state.content.insert(state.cursor_position, c);
        state.cursor_position += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(&self, state: &mut TextAreaState) -> bool {
        if state.cursor_position > 0 {
            let prev = prev_boundary(&state.content, state.cursor_position);
            state.content.remove(prev);
            state.cursor_position = prev;
            true
        } else {
            false
        }
    }

    /// Delete character at cursor
    fn delete(&self, state: &mut TextAreaState) -> bool {
        if state.cursor_position < state.content.len() {
            state.content.remove(state.cursor_position);
            true
        } else {
            false
        }
    }

    fn open_command_palette(&self, state: &TextAreaState) {
        self.show_command_palette.set(true);
        self.refresh_command_palette(state);
        self.selected_command.set(Some(0));
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            let clamped = index.min(filtered.len() - 1);
            self.selected_command.set(Some(clamped));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let current = self.selected_command.get().unwrap_or(0) as isize;
        let len = filtered.len() as isize;
        let mut next = current + delta;

        if next < 0 {
            next = len - 1;
        } else if next >= len {
            next = 0;
        }

        self.selected_command.set(Some(next as usize));
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let filtered = self.filtered_commands.borrow();
        let Some(index) = self.selected_command.get() else {
            return false;
        };

        if index >= filtered.len() {
            return false;
        }

        let entry = filtered[index];
        state.content = format!("/{} ", entry.keyword);
        state.cursor_position = state.content.len();
        drop(filtered);
        self.close_command_palette();
        true
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Update current mode
    pub fn update_mode(&mut self, mode: ChatMode) {
        self.current_mode = mode;
        self.placeholder = mode_placeholder(mode).to_string();
    }

    /// Reflect the search toggle in the title bar
    pub fn set_search_enabled(&mut self, enabled: bool) {
        self.search_enabled = enabled;
    }

    /// Whether the command palette is currently showing
    pub fn palette_open(&self) -> bool {
        self.show_command_palette.get()
    }

    /// Clear content
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.content.clear();
        state.cursor_position = 0;
    }
}

/// Snap to the previous char boundary
fn prev_boundary(content: &str, pos: usize) -> usize {
    let mut pos = pos;
    while pos > 0 {
        pos -= 1;
        if content.is_char_boundary(pos) {
            break;
        }
    }
    pos
}

/// Snap to the next char boundary
fn next_boundary(content: &str, pos: usize) -> usize {
    let mut pos = pos;
    while pos < content.len() {
        pos += 1;
        if content.is_char_boundary(pos) {
            break;
        }
    }
    pos.min(content.len())
}

/// Mode-specific placeholder text
pub fn mode_placeholder(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Chat => "Ask the assistant anything...",
        ChatMode::Think => "Pose a question worth thinking hard about...",
        ChatMode::Study => "What would you like explained?",
        ChatMode::Code => "Describe the code you need...",
        ChatMode::Document => "What should the document cover?",
    }
}

impl Widget for Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.state.borrow();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        // Render content or placeholder
        if state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                &self.placeholder,
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            // Render content with cursor indicator
            let mut content = state.content.clone();
            if self.has_focus {
                content.insert(state.cursor_position.min(content.len()), '▌');
            }

            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner_area.height as usize {
                    let line = Line::from(vec![Span::raw(line_text)]);
                    buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
                }
            }
        }

        // Render command palette if active
        if self.show_command_palette.get() {
            let filtered = self.filtered_commands.borrow();
            let palette_height = (filtered.len().min(6) + 2) as u16;
            let palette_area = Rect {
                x: inner_area.x,
                y: inner_area.y.saturating_sub(palette_height),
                width: inner_area.width,
                height: palette_height,
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let selected = self.selected_command.get();
            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let is_selected = selected == Some(index);
                let style = if is_selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

impl Composer {
    /// Title combining the active mode with the search toggle
    fn title(&self) -> String {
        let search = if self.search_enabled { " · search on" } else { "" };
        format!(
            "{} — {}{}",
            self.current_mode.display_name(),
            mode_placeholder(self.current_mode),
            search
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent};

    fn press(composer: &Composer, code: KeyCode) -> ComposerResult {
        composer.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn typed_text_submits_on_enter() {
        let composer = Composer::new("...".to_string(), ChatMode::Chat);
        for c in "hi there".chars() {
            press(&composer, KeyCode::Char(c));
        }
        match press(&composer, KeyCode::Enter) {
            ComposerResult::Submitted(text) => assert_eq!(text, "hi there"),
            other => panic!("expected submission, got {:?}", other),
        }
    }

    #[test]
    fn leading_slash_parses_as_command() {
        let composer = Composer::new("...".to_string(), ChatMode::Chat);
        for c in "/bye".chars() {
            press(&composer, KeyCode::Char(c));
        }
        // Esc dismisses the palette, Enter then submits the typed command
        press(&composer, KeyCode::Esc);
        match press(&composer, KeyCode::Enter) {
            ComposerResult::Command(parsed) => {
                assert_eq!(parsed.command, crate::ui::conversation::commands::SlashCommand::Bye)
            }
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn backspace_handles_multibyte_input() {
        let composer = Composer::new("...".to_string(), ChatMode::Chat);
        press(&composer, KeyCode::Char('é'));
        press(&composer, KeyCode::Char('!'));
        press(&composer, KeyCode::Backspace);
        press(&composer, KeyCode::Backspace);
        match press(&composer, KeyCode::Enter) {
            ComposerResult::None => {}
            other => panic!("expected empty composer, got {:?}", other),
        }
    }
}
