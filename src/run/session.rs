use crate::records::{EventType, ExecutionEvent, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    /// The channel ended before a terminal event arrived. No further updates
    /// are expected; the run's true outcome is unknown to this client.
    Interrupted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Observation state for one run: an append-only event log in arrival order
/// and a status derived purely from terminal event types. The log is an audit
/// trail; it is never rewritten, compacted, or reordered.
#[derive(Debug)]
pub struct RunSession {
    run_id: String,
    workflow_id: String,
    status: SessionStatus,
    events: Vec<ExecutionEvent>,
    last_channel_error: Option<String>,
}

impl RunSession {
    pub fn new(run_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id: workflow_id.into(),
            status: SessionStatus::Running,
            events: Vec::new(),
            last_channel_error: None,
        }
    }

    /// A session attached to an already-persisted run starts from the
    /// record's status instead of assuming the run is still live.
    pub fn with_record_status(
        run_id: impl Into<String>,
        workflow_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        let mut session = Self::new(run_id, workflow_id);
        session.status = match status {
            RunStatus::Pending | RunStatus::Running => SessionStatus::Running,
            RunStatus::Completed => SessionStatus::Completed,
            RunStatus::Failed => SessionStatus::Failed,
        };
        session
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    pub fn last_channel_error(&self) -> Option<&str> {
        self.last_channel_error.as_deref()
    }

    /// Folds one delivered event: always appended to the log, and the status
    /// moves only on terminal event types. Status is monotonic; events that
    /// arrive after a terminal status still land in the log but cannot move
    /// the status back to running.
    pub fn apply(&mut self, event: ExecutionEvent) {
        let event_type = event.event_type;
        self.events.push(event);
        if self.status != SessionStatus::Running {
            return;
        }
        match event_type {
            EventType::RunCompleted => self.status = SessionStatus::Completed,
            EventType::RunFailed => self.status = SessionStatus::Failed,
            _ => {}
        }
    }

    /// The channel reported that no further events will arrive.
    pub fn mark_channel_closed(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Interrupted;
        }
    }

    /// The channel failed at the transport level. The log is untouched.
    pub fn mark_channel_error(&mut self, reason: &str) {
        self.last_channel_error = Some(reason.to_string());
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Interrupted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::EventType;
    use serde_json::Map;

    fn event(event_type: EventType) -> ExecutionEvent {
        ExecutionEvent {
            event_type,
            run_id: "run-1".to_string(),
            step_id: None,
            attempt: 1,
            timestamp: None,
            payload: Map::new(),
        }
    }

    #[test]
    fn status_is_monotonic_and_log_is_append_only() {
        let mut session = RunSession::new("run-1", "wf-1");
        for event_type in [
            EventType::RunStarted,
            EventType::StepStarted,
            EventType::RunCompleted,
            EventType::StepStarted,
        ] {
            session.apply(event(event_type));
        }
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.events().len(), 4);
    }

    #[test]
    fn non_terminal_events_leave_status_running() {
        let mut session = RunSession::new("run-1", "wf-1");
        for event_type in [
            EventType::Connected,
            EventType::RunStarted,
            EventType::StepStarted,
            EventType::LlmChunk,
            EventType::LlmOutput,
            EventType::ValidationFailed,
            EventType::StepFailed,
        ] {
            session.apply(event(event_type));
        }
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn run_failed_is_terminal_and_sticky() {
        let mut session = RunSession::new("run-1", "wf-1");
        session.apply(event(EventType::RunFailed));
        session.apply(event(EventType::RunCompleted));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.events().len(), 2);
    }

    #[test]
    fn channel_close_before_terminal_event_interrupts() {
        let mut session = RunSession::new("run-1", "wf-1");
        session.apply(event(EventType::RunStarted));
        session.mark_channel_closed();
        assert_eq!(session.status(), SessionStatus::Interrupted);
        assert!(session.status().is_terminal());
    }

    #[test]
    fn channel_close_after_terminal_event_keeps_outcome() {
        let mut session = RunSession::new("run-1", "wf-1");
        session.apply(event(EventType::RunCompleted));
        session.mark_channel_closed();
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn channel_error_records_reason_and_interrupts() {
        let mut session = RunSession::new("run-1", "wf-1");
        session.mark_channel_error("connection reset");
        assert_eq!(session.status(), SessionStatus::Interrupted);
        assert_eq!(session.last_channel_error(), Some("connection reset"));
    }

    #[test]
    fn attached_terminal_record_does_not_regress_on_replayed_events() {
        let mut session =
            RunSession::with_record_status("run-1", "wf-1", RunStatus::Completed);
        session.apply(event(EventType::StepStarted));
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.events().len(), 1);
    }
}
