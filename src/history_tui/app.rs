use std::sync::Arc;

use color_eyre::Result;
use spotify_history::history::{ErrorNotice, HistoryView, LoadOutcome, PAGE_SIZE};
use tokio::runtime::Handle;

use crate::history_tui::Controller;
use crate::history_tui::event::{
    AppEvent, BackgroundEvent, BackgroundRequest, Event, EventHandler,
};
use crate::history_tui::input::handle_key_event;

/// How close to the end of the list the selection has to be before the next page is requested.
pub const NEAR_END_THRESHOLD: usize = PAGE_SIZE as usize / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Browse,
    Error,
}

/// Selected row of the history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
}

impl Selection {
    pub fn up(&mut self, by: usize) {
        self.index = self.index.saturating_sub(by);
    }

    pub fn down(&mut self, by: usize, len: usize) {
        self.index = (self.index + by).min(len.saturating_sub(1));
    }

    pub fn first(&mut self) {
        self.index = 0;
    }

    pub fn last(&mut self, len: usize) {
        self.index = len.saturating_sub(1);
    }

    /// Keep the selection inside a list that may have shrunk after a refresh.
    pub fn clamp(&mut self, len: usize) {
        self.index = self.index.min(len.saturating_sub(1));
    }

    pub fn is_near_end(&self, len: usize) -> bool {
        len > 0 && self.index + NEAR_END_THRESHOLD >= len
    }
}

pub struct App {
    pub mode: AppMode,
    pub view: HistoryView,
    pub selection: Selection,
    pub error: Option<ErrorNotice>,
    pub status_message: Option<String>,

    pub running: bool,
    /// Event handler.
    pub events: EventHandler,
    controller: Arc<Controller>,
}

impl App {
    pub fn new(controller: Arc<Controller>, runtime: Handle) -> Self {
        Self {
            mode: AppMode::Browse,
            view: controller.snapshot(),
            selection: Selection::default(),
            error: None,
            status_message: None,
            running: true,
            events: EventHandler::new(controller.clone(), runtime),
            controller,
        }
    }

    pub fn run(
        &mut self,
        terminal: &mut ratatui::prelude::Terminal<
            ratatui::prelude::CrosstermBackend<std::io::Stdout>,
        >,
    ) -> Result<()> {
        self.events.send(AppEvent::Refresh);

        while self.running {
            self.view = self.controller.snapshot();
            self.selection.clamp(self.view.records.len());

            terminal.draw(|f| crate::history_tui::ui::render(f, self))?;
            self.handle_events()?;
        }

        Ok(())
    }

    fn handle_events(&mut self) -> Result<()> {
        match self.events.next()? {
            Event::Tick => {}
            Event::Crossterm(event) => match event {
                ratatui::crossterm::event::Event::Key(key_event)
                    if key_event.kind == ratatui::crossterm::event::KeyEventKind::Press =>
                {
                    handle_key_event(self, key_event)?
                }
                _ => {}
            },
            Event::App(app_event) => match app_event {
                AppEvent::Refresh => {
                    self.status_message = Some("Refreshing...".to_string());
                    self.events
                        .send_background_request(BackgroundRequest::Refresh);
                }
                AppEvent::NearEnd => {
                    self.events
                        .send_background_request(BackgroundRequest::LoadMore);
                }
            },
            Event::Background(background_event) => match background_event {
                BackgroundEvent::Finished { request, outcome } => {
                    self.on_finished(request, outcome)
                }
                BackgroundEvent::Failed(notice) => {
                    log::error!("History request failed: {}", notice.message);
                    self.status_message = None;
                    self.error = Some(notice);
                    self.mode = AppMode::Error;
                }
            },
        }
        Ok(())
    }

    fn on_finished(&mut self, request: BackgroundRequest, outcome: LoadOutcome) {
        if request == BackgroundRequest::Refresh && matches!(outcome, LoadOutcome::Loaded { .. }) {
            self.selection.first();
        }

        let refresh_in_flight = self.controller.snapshot().is_loading_initial;
        self.status_message =
            status_after(request, outcome, refresh_in_flight, self.status_message.take());
    }

    /// Ask for the next page when the selection gets close to the end.
    pub fn check_near_end(&mut self) {
        if self.view.has_more && self.selection.is_near_end(self.view.records.len()) {
            self.events.send(AppEvent::NearEnd);
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
        self.mode = AppMode::Browse;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}

/// Status line once a background request has finished.
///
/// A refresh that was skipped or dropped clears "Refreshing..." unless another
/// refresh is still running and will report its own result.
fn status_after(
    request: BackgroundRequest,
    outcome: LoadOutcome,
    refresh_in_flight: bool,
    current: Option<String>,
) -> Option<String> {
    match (request, outcome) {
        (BackgroundRequest::Refresh, LoadOutcome::Loaded { received, .. }) => {
            Some(format!("Loaded {} tracks", received))
        }
        (BackgroundRequest::LoadMore, LoadOutcome::Loaded { received, has_more: true }) => {
            Some(format!("Loaded {} more tracks", received))
        }
        (BackgroundRequest::LoadMore, LoadOutcome::Loaded { .. }) => {
            Some("Reached the end of your history".to_string())
        }
        (BackgroundRequest::Refresh, _) if !refresh_in_flight => None,
        _ => current,
    }
}
