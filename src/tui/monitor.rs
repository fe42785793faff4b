use super::{setup_terminal, teardown_terminal};
use crate::records::{EventType, ExecutionEvent};
use crate::run::{ControllerStatus, RunController};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::Stdout;
use std::thread;
use std::time::Duration;

const UI_POLL_INTERVAL: Duration = Duration::from_millis(60);
const PAYLOAD_DISPLAY_LIMIT: usize = 160;

/// Live view over a run: pumps the controller each tick and renders the
/// cumulative event log. Stays open after the run reaches a terminal state so
/// the operator can read the tail; q/Esc exits.
pub fn run_monitor(controller: &mut RunController) -> Result<String, String> {
    let mut terminal = setup_terminal()?;
    let result = run_event_loop(&mut terminal, controller);
    teardown_terminal(&mut terminal)?;
    result
}

/// Line-stream fallback for non-interactive stdout: prints each event as it
/// arrives and returns once the run reaches a terminal state.
pub fn run_plain_watch(controller: &mut RunController) -> Result<String, String> {
    let mut printed = 0usize;
    loop {
        controller.pump();
        if let Some(session) = controller.session() {
            for event in &session.events()[printed..] {
                println!("{}", event_display_line(event));
            }
            printed = session.events().len();
        }
        match controller.status() {
            ControllerStatus::Idle => return Err("no active run to watch".to_string()),
            ControllerStatus::Running => thread::sleep(UI_POLL_INTERVAL),
            _ => {
                // One more drain in case events were queued behind the
                // terminal transition.
                controller.pump();
                if let Some(session) = controller.session() {
                    for event in &session.events()[printed..] {
                        println!("{}", event_display_line(event));
                    }
                }
                return Ok(summary_text(controller));
            }
        }
    }
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: &mut RunController,
) -> Result<String, String> {
    loop {
        controller.pump();
        draw_monitor(terminal, controller)?;

        if !event::poll(UI_POLL_INTERVAL).map_err(|e| format!("failed to poll events: {e}"))? {
            continue;
        }
        let Event::Key(key) = event::read().map_err(|e| format!("failed to read event: {e}"))?
        else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            break;
        }
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
            break;
        }
    }
    Ok(summary_text(controller))
}

fn summary_text(controller: &RunController) -> String {
    match controller.session() {
        Some(session) => {
            let mut summary = format!(
                "run_id={}\nworkflow_id={}\nstatus={}\nevents={}",
                session.run_id(),
                session.workflow_id(),
                session.status(),
                session.events().len()
            );
            if controller.status() == ControllerStatus::Interrupted {
                summary.push_str("\nchannel ended before a terminal event; no further updates expected");
            }
            if let Some(reason) = session.last_channel_error() {
                summary.push_str(&format!("\nchannel_error={reason}"));
            }
            summary
        }
        None => "no active run".to_string(),
    }
}

fn draw_monitor(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: &RunController,
) -> Result<(), String> {
    terminal
        .draw(|frame| {
            let sections = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Min(8),
                    Constraint::Length(3),
                ])
                .split(frame.area());

            let (header_lines, status_line) = match controller.session() {
                Some(session) => (
                    vec![
                        Line::raw(format!(
                            "run {}  workflow {}",
                            session.run_id(),
                            session.workflow_id()
                        )),
                        Line::styled(
                            format!("status: {}", session.status()),
                            Style::default()
                                .fg(status_color(controller.status()))
                                .add_modifier(Modifier::BOLD),
                        ),
                    ],
                    monitor_status_line(controller),
                ),
                None => (vec![Line::raw("no active run")], String::new()),
            };

            let header = Paragraph::new(header_lines).block(
                Block::default()
                    .title("Run")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(header, sections[0]);

            let visible_rows = sections[1].height.saturating_sub(2) as usize;
            let lines = controller
                .session()
                .map(|session| {
                    let events = session.events();
                    let skip = events.len().saturating_sub(visible_rows);
                    events[skip..]
                        .iter()
                        .map(|event| {
                            Line::styled(
                                event_display_line(event),
                                Style::default().fg(event_color(event.event_type)),
                            )
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let log = Paragraph::new(lines)
                .block(Block::default().title("Events").borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            frame.render_widget(log, sections[1]);

            let status = Paragraph::new(status_line)
                .block(Block::default().title("Status").borders(Borders::ALL));
            frame.render_widget(status, sections[2]);
        })
        .map_err(|e| format!("failed to render run monitor: {e}"))?;
    Ok(())
}

fn monitor_status_line(controller: &RunController) -> String {
    match controller.status() {
        ControllerStatus::Running => "streaming events; q or Esc detaches".to_string(),
        ControllerStatus::Interrupted => {
            "channel ended before a terminal event; no further updates expected".to_string()
        }
        ControllerStatus::Completed | ControllerStatus::Failed => {
            format!("run {}; q or Esc exits", controller.status())
        }
        ControllerStatus::Idle => "no active run".to_string(),
    }
}

pub(crate) fn event_display_line(event: &ExecutionEvent) -> String {
    let mut parts = Vec::new();
    if let Some(timestamp) = &event.timestamp {
        parts.push(format_clock_time(timestamp));
    }
    parts.push(event.event_type.to_string());
    if let Some(step_id) = &event.step_id {
        parts.push(format!("step={}", short_id(step_id)));
    }
    if event.attempt > 1 {
        parts.push(format!("attempt={}", event.attempt));
    }
    let payload = event.payload_summary(PAYLOAD_DISPLAY_LIMIT);
    if !payload.is_empty() {
        parts.push(payload);
    }
    parts.join(" ")
}

fn format_clock_time(raw: &str) -> String {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%H:%M:%S").to_string();
    }
    // The service emits naive UTC timestamps without an offset suffix.
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format("%H:%M:%S").to_string();
    }
    raw.chars().take(19).collect()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn event_color(event_type: EventType) -> Color {
    match event_type {
        EventType::Connected => Color::DarkGray,
        EventType::RunStarted | EventType::StepStarted => Color::Cyan,
        EventType::LlmChunk | EventType::LlmOutput => Color::Gray,
        EventType::ValidationPassed | EventType::StepCompleted | EventType::RunCompleted => {
            Color::Green
        }
        EventType::ValidationFailed | EventType::StepFailed | EventType::RunFailed => Color::Red,
    }
}

fn status_color(status: ControllerStatus) -> Color {
    match status {
        ControllerStatus::Idle => Color::Gray,
        ControllerStatus::Running => Color::Yellow,
        ControllerStatus::Completed => Color::Green,
        ControllerStatus::Failed => Color::Red,
        ControllerStatus::Interrupted => Color::Magenta,
    }
}
