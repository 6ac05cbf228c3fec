pub mod app;
pub mod event;
pub mod input;
pub mod ui;
pub mod widgets;

use std::sync::Arc;

use color_eyre::Result;
use spotify_history::history::{PaginationController, SpotifyHistoryClient};

pub type Controller = PaginationController<SpotifyHistoryClient>;

/// Main entry point for the TUI
pub fn run(controller: Arc<Controller>) -> Result<()> {
    use ratatui::crossterm::{
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::prelude::*;
    use std::io;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create and run app
    let mut app = app::App::new(controller, tokio::runtime::Handle::current());
    let result = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
