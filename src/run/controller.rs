use super::session::{RunSession, SessionStatus};
use crate::client::{ApiClient, EventChannel, EventChannelHandlers, TransportError};
use crate::records::ExecutionEvent;
use std::sync::mpsc::{self, Receiver, Sender};

/// One discrete completion from the event channel, delivered to the owning
/// thread and folded there. Handlers only enqueue; all session mutation
/// happens inside [`RunController::pump`], one signal at a time.
#[derive(Debug)]
pub enum ChannelSignal {
    Event(ExecutionEvent),
    Closed,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl std::fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerStatus::Idle => write!(f, "idle"),
            ControllerStatus::Running => write!(f, "running"),
            ControllerStatus::Completed => write!(f, "completed"),
            ControllerStatus::Failed => write!(f, "failed"),
            ControllerStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Owns the lifecycle of at most one observed run: issues the start request,
/// holds the single open event channel, and folds its signals into the
/// current [`RunSession`]. Starting a new run supersedes the previous
/// session; the old channel is closed before anything else happens, so two
/// streams can never race on one session.
pub struct RunController {
    client: ApiClient,
    session: Option<RunSession>,
    channel: Option<EventChannel>,
    signals: Option<Receiver<ChannelSignal>>,
}

impl RunController {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            session: None,
            channel: None,
            signals: None,
        }
    }

    pub fn session(&self) -> Option<&RunSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> ControllerStatus {
        match self.session.as_ref().map(RunSession::status) {
            None => ControllerStatus::Idle,
            Some(SessionStatus::Running) => ControllerStatus::Running,
            Some(SessionStatus::Completed) => ControllerStatus::Completed,
            Some(SessionStatus::Failed) => ControllerStatus::Failed,
            Some(SessionStatus::Interrupted) => ControllerStatus::Interrupted,
        }
    }

    pub fn channel_is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Starts a run of `workflow_id` and opens its event channel. Any
    /// previous channel is closed and the previous session discarded first.
    /// On failure no channel is open and the controller is idle again.
    pub fn start(
        &mut self,
        workflow_id: &str,
        initial_context: &str,
    ) -> Result<&RunSession, TransportError> {
        self.shutdown();
        let started = self.client.start_run(workflow_id, initial_context)?;
        let (tx, rx) = mpsc::channel();
        let channel = self
            .client
            .open_event_channel(&started.run_id, signal_handlers(tx))?;
        self.channel = Some(channel);
        self.signals = Some(rx);
        Ok(self
            .session
            .insert(RunSession::new(started.run_id, workflow_id)))
    }

    /// Attaches to an existing run: seeds the session from the persisted run
    /// record, then opens the channel. Events the service buffered for a late
    /// subscriber replay through the normal fold.
    pub fn attach(&mut self, run_id: &str) -> Result<&RunSession, TransportError> {
        self.shutdown();
        let record = self.client.get_run(run_id)?;
        let (tx, rx) = mpsc::channel();
        let channel = self
            .client
            .open_event_channel(&record.id, signal_handlers(tx))?;
        self.channel = Some(channel);
        self.signals = Some(rx);
        Ok(self.session.insert(RunSession::with_record_status(
            record.id,
            record.workflow_id,
            record.status,
        )))
    }

    /// Drains every pending channel signal and folds it into the session.
    /// Returns the number of signals handled. Called from the owning loop, so
    /// folding is serialized with every other state mutation.
    pub fn pump(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(signals) = &self.signals {
            while let Ok(signal) = signals.try_recv() {
                pending.push(signal);
            }
        }
        let handled = pending.len();
        for signal in pending {
            self.handle_signal(signal);
        }
        handled
    }

    fn handle_signal(&mut self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Event(event) => {
                if let Some(session) = &mut self.session {
                    session.apply(event);
                }
            }
            ChannelSignal::Closed => {
                if let Some(session) = &mut self.session {
                    session.mark_channel_closed();
                }
                self.teardown_channel();
            }
            ChannelSignal::Error(reason) => {
                if let Some(session) = &mut self.session {
                    session.mark_channel_error(&reason);
                }
                // The transport does not guarantee a closed state after an
                // error, so close explicitly.
                self.teardown_channel();
            }
        }
    }

    /// Closes any open channel and discards the current session. Called on
    /// supersede and on drop; closing the channel is the one mandatory
    /// cleanup action.
    pub fn shutdown(&mut self) {
        self.teardown_channel();
        self.signals = None;
        self.session = None;
    }

    fn teardown_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.teardown_channel();
    }
}

fn signal_handlers(tx: Sender<ChannelSignal>) -> EventChannelHandlers {
    let close_tx = tx.clone();
    let error_tx = tx.clone();
    EventChannelHandlers {
        on_event: Box::new(move |event| {
            let _ = tx.send(ChannelSignal::Event(event));
        }),
        on_close: Box::new(move || {
            let _ = close_tx.send(ChannelSignal::Closed);
        }),
        on_error: Box::new(move |reason| {
            let _ = error_tx.send(ChannelSignal::Error(reason));
        }),
    }
}
