use super::{setup_terminal, teardown_terminal};
use crate::draft::{StepPatch, WorkflowDraft, MAX_RETRIES_CEILING};
use crate::records::{ValidationRule, VALIDATION_KINDS};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::Stdout;
use std::time::Duration;

const UI_POLL_INTERVAL: Duration = Duration::from_millis(60);
const PROMPT_PREVIEW_LIMIT: usize = 48;

const STEPS_HINT_TEXT: &str =
    "Up/Down select | a add | d delete | n name | p prompt | y system | m model | r retries | v checks | w title | e descr | u webhook | s save | Esc cancel";
const VALIDATIONS_HINT_TEXT: &str =
    "Up/Down select | a add | d delete | t kind | e value | Esc back";
const EDIT_HINT_TEXT: &str = "Enter apply | Esc discard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorExit {
    Save,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    WorkflowName,
    WorkflowDescription,
    WebhookUrl,
    StepName,
    StepPrompt,
    StepSystemPrompt,
    ValidationDetail,
}

impl TextTarget {
    fn title(self) -> &'static str {
        match self {
            TextTarget::WorkflowName => "Workflow name",
            TextTarget::WorkflowDescription => "Description",
            TextTarget::WebhookUrl => "Webhook URL",
            TextTarget::StepName => "Step name",
            TextTarget::StepPrompt => "Prompt",
            TextTarget::StepSystemPrompt => "System prompt",
            TextTarget::ValidationDetail => "Check value",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EditorMode {
    Steps,
    Validations,
    EditText { target: TextTarget, buffer: String },
}

pub(crate) struct EditorState {
    pub(crate) draft: WorkflowDraft,
    mode: EditorMode,
    selected_step: usize,
    selected_rule: usize,
    status: String,
}

impl EditorState {
    pub(crate) fn new(draft: WorkflowDraft) -> Self {
        Self {
            draft,
            mode: EditorMode::Steps,
            selected_step: 0,
            selected_rule: 0,
            status: String::new(),
        }
    }
}

/// Interactive draft editor. Every key maps to one draft-model operation; the
/// draft itself enforces the structural invariants. Save is allowed only once
/// the draft passes its save-time preconditions, so the caller can project
/// and send the request without re-checking.
pub fn run_editor(draft: &mut WorkflowDraft) -> Result<EditorExit, String> {
    let mut terminal = setup_terminal()?;
    let mut state = EditorState::new(std::mem::take(draft));
    let result = run_event_loop(&mut terminal, &mut state);
    *draft = state.draft;
    teardown_terminal(&mut terminal)?;
    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut EditorState,
) -> Result<EditorExit, String> {
    loop {
        draw_editor(terminal, state)?;

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
        if let Some(exit) = apply_key(state, key) {
            return Ok(exit);
        }
    }
}

fn apply_key(state: &mut EditorState, key: KeyEvent) -> Option<EditorExit> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(EditorExit::Cancel);
    }
    state.status.clear();
    match &state.mode {
        EditorMode::Steps => apply_steps_key(state, key),
        EditorMode::Validations => {
            apply_validations_key(state, key);
            None
        }
        EditorMode::EditText { .. } => {
            apply_edit_text_key(state, key);
            None
        }
    }
}

fn apply_steps_key(state: &mut EditorState, key: KeyEvent) -> Option<EditorExit> {
    match key.code {
        KeyCode::Esc => return Some(EditorExit::Cancel),
        KeyCode::Up => {
            state.selected_step = state.selected_step.saturating_sub(1);
        }
        KeyCode::Down => {
            if state.selected_step + 1 < state.draft.steps().len() {
                state.selected_step += 1;
            }
        }
        KeyCode::Char('a') => {
            state.draft.add_step();
            state.selected_step = state.draft.steps().len() - 1;
        }
        KeyCode::Char('d') => {
            if state.draft.can_remove_step() {
                state.draft.remove_step(state.selected_step);
                if state.selected_step >= state.draft.steps().len() {
                    state.selected_step = state.draft.steps().len() - 1;
                }
            } else {
                state.status = "cannot remove the last step".to_string();
            }
        }
        KeyCode::Char('m') => {
            let model = state.draft.steps()[state.selected_step].model.next_in_catalog();
            state.draft.update_step(
                state.selected_step,
                StepPatch {
                    model: Some(model),
                    ..StepPatch::default()
                },
            );
        }
        KeyCode::Char('r') => {
            let current = state.draft.steps()[state.selected_step].max_retries;
            state.draft.update_step(
                state.selected_step,
                StepPatch {
                    max_retries: Some((current + 1) % (MAX_RETRIES_CEILING + 1)),
                    ..StepPatch::default()
                },
            );
        }
        KeyCode::Char('n') => enter_text_mode(state, TextTarget::StepName),
        KeyCode::Char('p') => enter_text_mode(state, TextTarget::StepPrompt),
        KeyCode::Char('y') => enter_text_mode(state, TextTarget::StepSystemPrompt),
        KeyCode::Char('w') => enter_text_mode(state, TextTarget::WorkflowName),
        KeyCode::Char('e') => enter_text_mode(state, TextTarget::WorkflowDescription),
        KeyCode::Char('u') => enter_text_mode(state, TextTarget::WebhookUrl),
        KeyCode::Char('v') => {
            state.selected_rule = 0;
            state.mode = EditorMode::Validations;
        }
        KeyCode::Char('s') => match state.draft.validate_for_save() {
            Ok(()) => return Some(EditorExit::Save),
            Err(err) => state.status = err.to_string(),
        },
        _ => {}
    }
    None
}

fn apply_validations_key(state: &mut EditorState, key: KeyEvent) {
    let rule_count = state.draft.steps()[state.selected_step].validations.len();
    match key.code {
        KeyCode::Esc => state.mode = EditorMode::Steps,
        KeyCode::Up => {
            state.selected_rule = state.selected_rule.saturating_sub(1);
        }
        KeyCode::Down => {
            if state.selected_rule + 1 < rule_count {
                state.selected_rule += 1;
            }
        }
        KeyCode::Char('a') => {
            state.draft.add_validation(state.selected_step);
            state.selected_rule = state.draft.steps()[state.selected_step].validations.len() - 1;
        }
        KeyCode::Char('d') => {
            state
                .draft
                .remove_validation(state.selected_step, state.selected_rule);
            let remaining = state.draft.steps()[state.selected_step].validations.len();
            if state.selected_rule >= remaining && remaining > 0 {
                state.selected_rule = remaining - 1;
            }
        }
        KeyCode::Char('t') => {
            if let Some(rule) = selected_rule(state) {
                let current = rule.kind();
                let index = VALIDATION_KINDS
                    .iter()
                    .position(|kind| *kind == current)
                    .unwrap_or(0);
                let next = VALIDATION_KINDS[(index + 1) % VALIDATION_KINDS.len()];
                state
                    .draft
                    .set_validation_kind(state.selected_step, state.selected_rule, next);
            }
        }
        KeyCode::Char('e') => {
            if selected_rule(state).is_some_and(|rule| rule.detail_label().is_some()) {
                enter_text_mode(state, TextTarget::ValidationDetail);
            }
        }
        _ => {}
    }
}

fn apply_edit_text_key(state: &mut EditorState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if let EditorMode::EditText { target, .. } = &state.mode {
                let target = *target;
                state.mode = text_parent_mode(target);
            }
        }
        KeyCode::Enter => {
            if let EditorMode::EditText { target, buffer } = &state.mode {
                let target = *target;
                let value = buffer.clone();
                state.mode = text_parent_mode(target);
                commit_text(state, target, &value);
            }
        }
        KeyCode::Backspace => {
            if let EditorMode::EditText { buffer, .. } = &mut state.mode {
                buffer.pop();
            }
        }
        KeyCode::Char(ch) => {
            if let EditorMode::EditText { buffer, .. } = &mut state.mode {
                buffer.push(ch);
            }
        }
        _ => {}
    }
}

fn text_parent_mode(target: TextTarget) -> EditorMode {
    if target == TextTarget::ValidationDetail {
        EditorMode::Validations
    } else {
        EditorMode::Steps
    }
}

fn enter_text_mode(state: &mut EditorState, target: TextTarget) {
    let step = &state.draft.steps()[state.selected_step];
    let buffer = match target {
        TextTarget::WorkflowName => state.draft.name().to_string(),
        TextTarget::WorkflowDescription => state.draft.description().to_string(),
        TextTarget::WebhookUrl => state.draft.webhook_url().to_string(),
        TextTarget::StepName => step.name.clone(),
        TextTarget::StepPrompt => step.prompt.clone(),
        TextTarget::StepSystemPrompt => step.system_prompt.clone(),
        TextTarget::ValidationDetail => selected_rule(state)
            .and_then(|rule| rule.detail())
            .unwrap_or_default()
            .to_string(),
    };
    state.mode = EditorMode::EditText { target, buffer };
}

fn commit_text(state: &mut EditorState, target: TextTarget, value: &str) {
    match target {
        TextTarget::WorkflowName => state.draft.set_name(value),
        TextTarget::WorkflowDescription => state.draft.set_description(value),
        TextTarget::WebhookUrl => state.draft.set_webhook_url(value),
        TextTarget::StepName => state.draft.update_step(
            state.selected_step,
            StepPatch {
                name: Some(value.to_string()),
                ..StepPatch::default()
            },
        ),
        TextTarget::StepPrompt => state.draft.update_step(
            state.selected_step,
            StepPatch {
                prompt: Some(value.to_string()),
                ..StepPatch::default()
            },
        ),
        TextTarget::StepSystemPrompt => state.draft.update_step(
            state.selected_step,
            StepPatch {
                system_prompt: Some(value.to_string()),
                ..StepPatch::default()
            },
        ),
        TextTarget::ValidationDetail => {
            state
                .draft
                .set_validation_detail(state.selected_step, state.selected_rule, value)
        }
    }
}

fn selected_rule(state: &EditorState) -> Option<&ValidationRule> {
    state
        .draft
        .steps()
        .get(state.selected_step)
        .and_then(|step| step.validations.get(state.selected_rule))
}

fn draw_editor(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &EditorState,
) -> Result<(), String> {
    terminal
        .draw(|frame| {
            let sections = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Min(8),
                    Constraint::Length(3),
                    Constraint::Length(3),
                ])
                .split(frame.area());

            let title = if state.draft.name().is_empty() {
                "(unnamed workflow)".to_string()
            } else {
                state.draft.name().to_string()
            };
            let marker = if state.draft.is_dirty() { " *" } else { "" };
            let header = Paragraph::new(vec![
                Line::raw(format!("{title}{marker}")),
                Line::raw(state.draft.description().to_string()),
            ])
            .block(
                Block::default()
                    .title("Workflow")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(header, sections[0]);

            let body = match &state.mode {
                EditorMode::Validations => validation_lines(state),
                _ => step_lines(state),
            };
            let body_title = if matches!(state.mode, EditorMode::Validations) {
                format!("Checks for step {}", state.selected_step + 1)
            } else {
                "Steps".to_string()
            };
            let body_widget = Paragraph::new(body)
                .block(Block::default().title(body_title).borders(Borders::ALL))
                .wrap(Wrap { trim: false });
            frame.render_widget(body_widget, sections[1]);

            let status_line = if let EditorMode::EditText { target, buffer } = &state.mode {
                format!("{}> {buffer}█", target.title())
            } else if state.status.is_empty() {
                String::new()
            } else {
                state.status.clone()
            };
            let status = Paragraph::new(status_line).block(
                Block::default()
                    .title("Status")
                    .borders(Borders::ALL)
                    .border_style(if state.status.is_empty() {
                        Style::default()
                    } else {
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                    }),
            );
            frame.render_widget(status, sections[2]);

            let hint = match &state.mode {
                EditorMode::Steps => STEPS_HINT_TEXT,
                EditorMode::Validations => VALIDATIONS_HINT_TEXT,
                EditorMode::EditText { .. } => EDIT_HINT_TEXT,
            };
            let hint_widget = Paragraph::new(hint)
                .block(Block::default().title("Keys").borders(Borders::ALL));
            frame.render_widget(hint_widget, sections[3]);
        })
        .map_err(|e| format!("failed to render workflow editor: {e}"))?;
    Ok(())
}

fn step_lines(state: &EditorState) -> Vec<Line<'static>> {
    state
        .draft
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let prompt_preview = preview(&step.prompt, PROMPT_PREVIEW_LIMIT);
            let text = format!(
                "{} {}. {}  model={}  retries={}  checks={}  prompt: {}",
                if index == state.selected_step { ">" } else { " " },
                step.order,
                step.name,
                step.model,
                step.max_retries,
                step.validations.len(),
                prompt_preview,
            );
            if index == state.selected_step {
                Line::styled(text, Style::default().fg(Color::Yellow))
            } else {
                Line::raw(text)
            }
        })
        .collect()
}

fn validation_lines(state: &EditorState) -> Vec<Line<'static>> {
    let step = &state.draft.steps()[state.selected_step];
    if step.validations.is_empty() {
        return vec![Line::styled(
            "no checks; press a to add one",
            Style::default().fg(Color::Gray),
        )];
    }
    step.validations
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            let detail = match (rule.detail_label(), rule.detail()) {
                (Some(label), Some(value)) => {
                    format!("  {label}: {}", preview(value, PROMPT_PREVIEW_LIMIT))
                }
                _ => String::new(),
            };
            let text = format!(
                "{} {}{}",
                if index == state.selected_rule { ">" } else { " " },
                rule.kind(),
                detail,
            );
            if index == state.selected_rule {
                Line::styled(text, Style::default().fg(Color::Yellow))
            } else {
                Line::raw(text)
            }
        })
        .collect()
}

fn preview(value: &str, limit: usize) -> String {
    let flattened = value.replace('\n', " ");
    if flattened.chars().count() <= limit {
        return flattened;
    }
    let truncated: String = flattened.chars().take(limit).collect();
    format!("{truncated}…")
}
