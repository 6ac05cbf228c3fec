// This file is based on https://github.com/ratatui/templates/blob/main/event-driven/template/src/event.rs
use std::{sync::Arc, sync::mpsc, thread, time::Duration};

use color_eyre::eyre::{Context, Result};
use ratatui::crossterm::event::{self, Event as CrosstermEvent};
use spotify_history::history::{ErrorNotice, LoadOutcome};
use tokio::runtime::Handle;

use crate::history_tui::Controller;

const TIMEOUT: Duration = Duration::from_millis(250);

/// Representation of all possible events.
#[derive(Clone, Debug)]
pub enum Event {
    /// Emitted when no terminal input arrived within the poll timeout.
    Tick,
    /// Crossterm events.
    ///
    /// These events are emitted by the terminal.
    Crossterm(CrosstermEvent),
    /// Application events.
    App(AppEvent),
    /// Background events.
    ///
    /// These events are emitted by the history tasks.
    Background(BackgroundEvent),
}

/// Application events.
#[derive(Clone, Debug)]
pub enum AppEvent {
    /// Reload the newest page, replacing the list.
    Refresh,
    /// The selection is close to the end of the list.
    NearEnd,
}

/// Background events.
#[derive(Clone, Debug)]
pub enum BackgroundEvent {
    /// A request finished and the history may have changed.
    Finished {
        request: BackgroundRequest,
        outcome: LoadOutcome,
    },
    /// A request failed.
    Failed(ErrorNotice),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundRequest {
    Refresh,
    LoadMore,
}

/// Terminal event handler.
#[derive(Debug)]
pub struct EventHandler {
    /// Event sender channel.
    sender: mpsc::Sender<Event>,
    /// Event receiver channel.
    receiver: mpsc::Receiver<Event>,
    /// Background request channel.
    background_sender: tokio::sync::mpsc::UnboundedSender<BackgroundRequest>,
}

impl EventHandler {
    /// Constructs a new instance of [`EventHandler`], spawning a thread for terminal input and
    /// a task on `runtime` for history requests.
    pub fn new(controller: Arc<Controller>, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::channel();

        let cross_term_actor = CrosstermEventThread::new(sender.clone());
        thread::spawn(|| cross_term_actor.run());

        let (background_sender, background_receiver) = tokio::sync::mpsc::unbounded_channel();
        let worker = BackgroundWorker::new(background_receiver, sender.clone(), controller);
        runtime.spawn(worker.run());

        Self {
            sender,
            receiver,
            background_sender,
        }
    }

    /// Receives an event from the sender.
    ///
    /// This function blocks until an event is received.
    ///
    /// # Errors
    ///
    /// This function returns an error if the sender channel is disconnected. This can happen if an
    /// error occurs in the event thread. In practice, this should not happen unless there is a
    /// problem with the underlying terminal.
    pub fn next(&self) -> Result<Event> {
        self.receiver.recv().wrap_err("failed to receive event")
    }

    /// Queue an app event to be sent to the event receiver.
    pub fn send(&mut self, app_event: AppEvent) {
        // Ignore the result as the reciever cannot be dropped while this struct still has a
        // reference to it
        let _ = self.sender.send(Event::App(app_event));
    }

    /// Queue a history request for the background worker.
    pub fn send_background_request(&mut self, request: BackgroundRequest) {
        let _ = self.background_sender.send(request);
    }
}

/// A thread that handles reading crossterm events
struct CrosstermEventThread {
    /// Event sender channel.
    sender: mpsc::Sender<Event>,
}

impl CrosstermEventThread {
    /// Constructs a new instance of [`CrosstermEventThread`].
    fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Polls for crossterm events, emitting a tick whenever the poll times out.
    fn run(self) -> Result<()> {
        loop {
            let event = if event::poll(TIMEOUT).wrap_err("failed to poll for crossterm events")? {
                Event::Crossterm(event::read().wrap_err("failed to read crossterm event")?)
            } else {
                Event::Tick
            };
            // The receiver is dropped when the app shuts down
            if self.sender.send(event).is_err() {
                return Ok(());
            }
        }
    }
}

/// Runs history requests against the shared controller.
///
/// Every request gets its own task, so a refresh can start while a load-more is still
/// running. The controller decides what actually goes out.
struct BackgroundWorker {
    requests: tokio::sync::mpsc::UnboundedReceiver<BackgroundRequest>,
    sender: mpsc::Sender<Event>,
    controller: Arc<Controller>,
}

impl BackgroundWorker {
    fn new(
        requests: tokio::sync::mpsc::UnboundedReceiver<BackgroundRequest>,
        sender: mpsc::Sender<Event>,
        controller: Arc<Controller>,
    ) -> Self {
        Self {
            requests,
            sender,
            controller,
        }
    }

    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            let controller = self.controller.clone();
            let sender = self.sender.clone();
            tokio::spawn(handle_request(controller, sender, request));
        }
    }
}

async fn handle_request(
    controller: Arc<Controller>,
    sender: mpsc::Sender<Event>,
    request: BackgroundRequest,
) {
    let result = match request {
        BackgroundRequest::Refresh => controller.refresh().await,
        BackgroundRequest::LoadMore => controller.load_more().await,
    };

    let event = match result {
        Ok(outcome) => BackgroundEvent::Finished { request, outcome },
        Err(error) => BackgroundEvent::Failed(
            controller
                .take_error()
                .unwrap_or_else(|| ErrorNotice::from(&error)),
        ),
    };
    let _ = sender.send(Event::Background(event));
}
