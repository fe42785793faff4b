//! In-memory editable representation of one workflow. Edits run against the
//! draft only; nothing touches the service until the save command projects
//! the draft into a create/update request.

use crate::records::{
    ModelName, StepPayload, ValidationKind, ValidationRule, WorkflowCreate, WorkflowRecord,
    WorkflowUpdate, MODEL_CATALOG,
};
use crate::shared::ids::generate_step_id;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const MAX_RETRIES_CEILING: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftValidationError {
    #[error("workflow name must be non-empty")]
    BlankName,
    #[error("step {order} has an empty prompt")]
    BlankPrompt { order: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    /// Client-minted idempotency id; `None` when id generation was
    /// unavailable, in which case the service mints one on create.
    pub step_id: Option<String>,
    pub name: String,
    pub order: u32,
    pub model: ModelName,
    pub prompt: String,
    pub system_prompt: String,
    pub validations: Vec<ValidationRule>,
    pub max_retries: u32,
}

/// Partial step update. Unset fields leave the step untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPatch {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<ModelName>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDraft {
    /// Set when the draft was materialized from a persisted record; a save
    /// then updates that record instead of creating a new one.
    pub record_id: Option<String>,
    name: String,
    description: String,
    webhook_url: String,
    steps: Vec<StepDraft>,
    dirty: bool,
}

impl Default for WorkflowDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowDraft {
    /// A fresh draft always starts with exactly one step.
    pub fn new() -> Self {
        Self {
            record_id: None,
            name: String::new(),
            description: String::new(),
            webhook_url: String::new(),
            steps: vec![default_step(1)],
            dirty: false,
        }
    }

    /// Materializes an editable copy of a persisted record. The record itself
    /// is never mutated; step order is re-established from the record's
    /// declared ordering.
    pub fn from_record(record: &WorkflowRecord) -> Self {
        let mut sorted = record.steps.clone();
        sorted.sort_by_key(|step| step.order);
        let mut steps: Vec<StepDraft> = sorted
            .into_iter()
            .map(|step| StepDraft {
                step_id: Some(step.id),
                name: step.name,
                order: step.order,
                model: step.model,
                prompt: step.prompt,
                system_prompt: step.system_prompt.unwrap_or_default(),
                validations: step.validations,
                max_retries: step.max_retries.min(MAX_RETRIES_CEILING),
            })
            .collect();
        if steps.is_empty() {
            steps.push(default_step(1));
        }
        let mut draft = Self {
            record_id: Some(record.id.clone()),
            name: record.name.clone(),
            description: record.description.clone().unwrap_or_default(),
            webhook_url: record.webhook_url.clone().unwrap_or_default(),
            steps,
            dirty: false,
        };
        draft.renumber_steps();
        draft
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn steps(&self) -> &[StepDraft] {
        &self.steps
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.dirty = true;
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.dirty = true;
    }

    pub fn set_webhook_url(&mut self, webhook_url: &str) {
        self.webhook_url = webhook_url.to_string();
        self.dirty = true;
    }

    /// Appends a step with default field values and the next order position.
    pub fn add_step(&mut self) {
        let order = self.steps.len() as u32 + 1;
        self.steps.push(default_step(order));
        self.dirty = true;
    }

    pub fn can_remove_step(&self) -> bool {
        self.steps.len() > 1
    }

    /// Removes `steps[index]` and renumbers the remainder to `1..=len`.
    /// Refuses to empty the draft; callers gate on [`can_remove_step`] so a
    /// removal of the last step only ever arrives from a stale command.
    ///
    /// [`can_remove_step`]: WorkflowDraft::can_remove_step
    pub fn remove_step(&mut self, index: usize) {
        if self.steps.len() <= 1 || index >= self.steps.len() {
            return;
        }
        self.steps.remove(index);
        self.renumber_steps();
        self.dirty = true;
    }

    /// Merges the set fields of `patch` into `steps[index]`. An out-of-range
    /// index is a stale command and is dropped.
    pub fn update_step(&mut self, index: usize, patch: StepPatch) {
        let Some(step) = self.steps.get_mut(index) else {
            return;
        };
        if let Some(name) = patch.name {
            step.name = name;
        }
        if let Some(prompt) = patch.prompt {
            step.prompt = prompt;
        }
        if let Some(system_prompt) = patch.system_prompt {
            step.system_prompt = system_prompt;
        }
        if let Some(model) = patch.model {
            step.model = model;
        }
        if let Some(max_retries) = patch.max_retries {
            step.max_retries = max_retries.min(MAX_RETRIES_CEILING);
        }
        self.dirty = true;
    }

    pub fn add_validation(&mut self, step_index: usize) {
        let Some(step) = self.steps.get_mut(step_index) else {
            return;
        };
        step.validations
            .push(ValidationRule::empty_of(ValidationKind::Contains));
        self.dirty = true;
    }

    /// Replaces the rule with an empty rule of the new kind. Fields belonging
    /// to the previous kind do not survive the change.
    pub fn set_validation_kind(&mut self, step_index: usize, rule_index: usize, kind: ValidationKind) {
        let Some(rule) = self
            .steps
            .get_mut(step_index)
            .and_then(|step| step.validations.get_mut(rule_index))
        else {
            return;
        };
        if rule.kind() == kind {
            return;
        }
        *rule = ValidationRule::empty_of(kind);
        self.dirty = true;
    }

    pub fn set_validation_detail(&mut self, step_index: usize, rule_index: usize, value: &str) {
        let Some(rule) = self
            .steps
            .get_mut(step_index)
            .and_then(|step| step.validations.get_mut(rule_index))
        else {
            return;
        };
        if rule.detail_label().is_none() {
            return;
        }
        rule.set_detail(value);
        self.dirty = true;
    }

    pub fn remove_validation(&mut self, step_index: usize, rule_index: usize) {
        let Some(step) = self.steps.get_mut(step_index) else {
            return;
        };
        if rule_index >= step.validations.len() {
            return;
        }
        step.validations.remove(rule_index);
        self.dirty = true;
    }

    /// Save-time preconditions. Editing intentionally allows transient
    /// invalid states; the save command calls this before any network round
    /// trip.
    pub fn validate_for_save(&self) -> Result<(), DraftValidationError> {
        if self.name.trim().is_empty() {
            return Err(DraftValidationError::BlankName);
        }
        for step in &self.steps {
            if step.prompt.trim().is_empty() {
                return Err(DraftValidationError::BlankPrompt { order: step.order });
            }
        }
        Ok(())
    }

    pub fn to_create_request(&self) -> WorkflowCreate {
        WorkflowCreate {
            name: self.name.clone(),
            description: optional(&self.description),
            steps: self.steps.iter().map(step_payload).collect(),
            webhook_url: optional(&self.webhook_url),
        }
    }

    pub fn to_update_request(&self) -> WorkflowUpdate {
        WorkflowUpdate {
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
            steps: Some(self.steps.iter().map(step_payload).collect()),
            webhook_url: Some(self.webhook_url.clone()),
        }
    }

    fn renumber_steps(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.order = index as u32 + 1;
        }
    }
}

fn default_step(order: u32) -> StepDraft {
    StepDraft {
        step_id: generate_step_id().ok(),
        name: format!("Step {order}"),
        order,
        model: MODEL_CATALOG[0],
        prompt: String::new(),
        system_prompt: String::new(),
        validations: Vec::new(),
        max_retries: DEFAULT_MAX_RETRIES,
    }
}

fn step_payload(step: &StepDraft) -> StepPayload {
    StepPayload {
        id: step.step_id.clone(),
        name: step.name.clone(),
        order: step.order,
        model: step.model,
        prompt: step.prompt.clone(),
        system_prompt: if step.system_prompt.trim().is_empty() {
            None
        } else {
            Some(step.system_prompt.clone())
        },
        validations: step.validations.clone(),
        max_retries: step.max_retries.min(MAX_RETRIES_CEILING),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
