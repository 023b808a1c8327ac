//! Terminal setup and the conversation event loop

use crate::api::ApiClient;
use crate::config::Config;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::time::Duration;
use tracing::info;

/// Run the conversation TUI, optionally resuming an existing conversation.
///
/// Owns the config for the session: loads it on the way in, saves the
/// toggles the user changed on the way out.
pub async fn run(mut config: Config, conv_id: Option<i64>) -> Result<()> {
    let mut manager = ConversationManager::new(&config);

    if let Some(id) = conv_id {
        let api = ApiClient::new(&config);
        let detail = api
            .get_conversation(id)
            .await
            .with_context(|| format!("could not open conversation {}", id))?;
        manager.resume(detail);
    }

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = event_loop(&mut terminal, &mut manager).await;

    disable_raw_mode().ok();
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    // Save boundary: persist toggles flipped during the session
    config.default_mode = manager.mode();
    config.use_search = manager.use_search();
    if let Err(error) = config.save() {
        tracing::warn!("failed to save config: {:#}", error);
    }

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    manager: &mut ConversationManager,
) -> Result<()> {
    info!("conversation ui started");

    loop {
        manager.process_events();

        terminal
            .draw(|frame| manager.render(frame))
            .context("Failed to draw frame")?;

        // Short poll keeps streaming output moving between key presses
        if event::poll(Duration::from_millis(50)).context("Failed to poll for events")? {
            match event::read().context("Failed to read event")? {
                Event::Key(key) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        break;
                    }
                }
                Event::Resize(_, _) => {
                    // Next draw picks up the new size
                }
                _ => {}
            }
        }
    }

    info!("conversation ui exited");
    Ok(())
}
