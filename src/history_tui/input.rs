use crate::history_tui::{
    app::{App, AppMode},
    event::AppEvent,
};
use color_eyre::Result;
use ratatui::crossterm::event::KeyEvent;

const PAGE_STEP: usize = 10;

pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Result<()> {
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.quit();
            Ok(())
        }
        _ => match app.mode {
            AppMode::Browse => handle_browse_input(app, key),
            AppMode::Error => handle_error_input(app, key),
        },
    }
}

fn handle_browse_input(app: &mut App, key: KeyEvent) -> Result<()> {
    use ratatui::crossterm::event::KeyCode;

    let len = app.view.records.len();
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.quit();
        }
        KeyCode::Char('r') => {
            app.events.send(AppEvent::Refresh);
        }
        KeyCode::Up | KeyCode::Char('k') => app.selection.up(1),
        KeyCode::Down | KeyCode::Char('j') => {
            app.selection.down(1, len);
            app.check_near_end();
        }
        KeyCode::PageUp => app.selection.up(PAGE_STEP),
        KeyCode::PageDown => {
            app.selection.down(PAGE_STEP, len);
            app.check_near_end();
        }
        KeyCode::Home | KeyCode::Char('g') => app.selection.first(),
        KeyCode::End | KeyCode::Char('G') => {
            app.selection.last(len);
            app.check_near_end();
        }
        _ => {}
    }
    Ok(())
}

fn handle_error_input(app: &mut App, key: KeyEvent) -> Result<()> {
    use ratatui::crossterm::event::KeyCode;

    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.dismiss_error(),
        KeyCode::Char('q') => app.quit(),
        _ => {}
    }
    Ok(())
}
