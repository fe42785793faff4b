//! Wire contract shared with the workflow service: persisted records, request
//! bodies, and the execution events delivered over the per-run channel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelName {
    #[serde(rename = "kimi-k2-instruct-0905")]
    KimiK2Instruct0905,
    #[serde(rename = "kimi-k2p5")]
    KimiK2p5,
}

pub const MODEL_CATALOG: [ModelName; 2] = [ModelName::KimiK2Instruct0905, ModelName::KimiK2p5];

impl ModelName {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelName::KimiK2Instruct0905 => "kimi-k2-instruct-0905",
            ModelName::KimiK2p5 => "kimi-k2p5",
        }
    }

    pub fn next_in_catalog(self) -> Self {
        let index = MODEL_CATALOG
            .iter()
            .position(|model| *model == self)
            .unwrap_or(0);
        MODEL_CATALOG[(index + 1) % MODEL_CATALOG.len()]
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    PythonSyntax,
    JsonValid,
    RegexMatch,
    Contains,
    TestExec,
    LlmJudge,
}

pub const VALIDATION_KINDS: [ValidationKind; 6] = [
    ValidationKind::Contains,
    ValidationKind::RegexMatch,
    ValidationKind::PythonSyntax,
    ValidationKind::JsonValid,
    ValidationKind::TestExec,
    ValidationKind::LlmJudge,
];

impl ValidationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationKind::PythonSyntax => "python_syntax",
            ValidationKind::JsonValid => "json_valid",
            ValidationKind::RegexMatch => "regex_match",
            ValidationKind::Contains => "contains",
            ValidationKind::TestExec => "test_exec",
            ValidationKind::LlmJudge => "llm_judge",
        }
    }
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single check applied to a step's output. Each kind carries only its own
/// configuration, so switching kinds can never leave a stale field behind.
/// The service encodes rules as a flat object with a `type` discriminator and
/// nulls for the unused fields; the internally tagged form below accepts that
/// encoding and emits only the fields the kind owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    PythonSyntax,
    JsonValid,
    RegexMatch {
        #[serde(default)]
        pattern: String,
    },
    Contains {
        #[serde(default)]
        expected: String,
    },
    TestExec {
        #[serde(default)]
        test_code: String,
    },
    LlmJudge {
        #[serde(default)]
        criteria: String,
    },
}

impl ValidationRule {
    pub fn empty_of(kind: ValidationKind) -> Self {
        match kind {
            ValidationKind::PythonSyntax => ValidationRule::PythonSyntax,
            ValidationKind::JsonValid => ValidationRule::JsonValid,
            ValidationKind::RegexMatch => ValidationRule::RegexMatch {
                pattern: String::new(),
            },
            ValidationKind::Contains => ValidationRule::Contains {
                expected: String::new(),
            },
            ValidationKind::TestExec => ValidationRule::TestExec {
                test_code: String::new(),
            },
            ValidationKind::LlmJudge => ValidationRule::LlmJudge {
                criteria: String::new(),
            },
        }
    }

    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationRule::PythonSyntax => ValidationKind::PythonSyntax,
            ValidationRule::JsonValid => ValidationKind::JsonValid,
            ValidationRule::RegexMatch { .. } => ValidationKind::RegexMatch,
            ValidationRule::Contains { .. } => ValidationKind::Contains,
            ValidationRule::TestExec { .. } => ValidationKind::TestExec,
            ValidationRule::LlmJudge { .. } => ValidationKind::LlmJudge,
        }
    }

    /// The kind-specific configuration value, when the kind has one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ValidationRule::PythonSyntax | ValidationRule::JsonValid => None,
            ValidationRule::RegexMatch { pattern } => Some(pattern),
            ValidationRule::Contains { expected } => Some(expected),
            ValidationRule::TestExec { test_code } => Some(test_code),
            ValidationRule::LlmJudge { criteria } => Some(criteria),
        }
    }

    pub fn detail_label(&self) -> Option<&'static str> {
        match self {
            ValidationRule::PythonSyntax | ValidationRule::JsonValid => None,
            ValidationRule::RegexMatch { .. } => Some("pattern"),
            ValidationRule::Contains { .. } => Some("expected"),
            ValidationRule::TestExec { .. } => Some("test_code"),
            ValidationRule::LlmJudge { .. } => Some("criteria"),
        }
    }

    /// Writes the kind-specific configuration value. No-op for kinds without
    /// configuration.
    pub fn set_detail(&mut self, value: &str) {
        match self {
            ValidationRule::PythonSyntax | ValidationRule::JsonValid => {}
            ValidationRule::RegexMatch { pattern } => *pattern = value.to_string(),
            ValidationRule::Contains { expected } => *expected = value.to_string(),
            ValidationRule::TestExec { test_code } => *test_code = value.to_string(),
            ValidationRule::LlmJudge { criteria } => *criteria = value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Synthetic envelope the service sends when the channel opens.
    Connected,
    RunStarted,
    StepStarted,
    LlmChunk,
    LlmOutput,
    ValidationPassed,
    ValidationFailed,
    StepCompleted,
    StepFailed,
    RunCompleted,
    RunFailed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventType::Connected => "connected",
            EventType::RunStarted => "run_started",
            EventType::StepStarted => "step_started",
            EventType::LlmChunk => "llm_chunk",
            EventType::LlmOutput => "llm_output",
            EventType::ValidationPassed => "validation_passed",
            EventType::ValidationFailed => "validation_failed",
            EventType::StepCompleted => "step_completed",
            EventType::StepFailed => "step_failed",
            EventType::RunCompleted => "run_completed",
            EventType::RunFailed => "run_failed",
        };
        f.write_str(label)
    }
}

fn default_attempt() -> u32 {
    1
}

/// One message from the per-run event channel. The payload is an open mapping
/// the client never interprets beyond display truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    #[serde(rename = "event", alias = "event_type")]
    pub event_type: EventType,
    pub run_id: String,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl ExecutionEvent {
    /// Compact single-line payload rendering, truncated to `limit` characters
    /// for display. The payload contents are otherwise opaque to the client.
    pub fn payload_summary(&self, limit: usize) -> String {
        if self.payload.is_empty() {
            return String::new();
        }
        let rendered = Value::Object(self.payload.clone()).to_string();
        if rendered.chars().count() <= limit {
            return rendered;
        }
        let truncated: String = rendered.chars().take(limit).collect();
        format!("{truncated}…")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub model: ModelName,
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub current_step_order: u32,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub final_output: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub order: u32,
    pub model: ModelName,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    pub initial_context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStarted {
    pub run_id: String,
    pub websocket_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_rule_decodes_flat_null_padded_encoding() {
        let raw = r#"{"type":"contains","pattern":null,"expected":"fn main","criteria":null,"test_code":null}"#;
        let rule: ValidationRule = serde_json::from_str(raw).expect("decode contains rule");
        assert_eq!(
            rule,
            ValidationRule::Contains {
                expected: "fn main".to_string()
            }
        );
    }

    #[test]
    fn validation_rule_emits_only_its_own_fields() {
        let rule = ValidationRule::RegexMatch {
            pattern: "^def ".to_string(),
        };
        let value = serde_json::to_value(&rule).expect("encode");
        assert_eq!(value, json!({"type": "regex_match", "pattern": "^def "}));

        let bare = serde_json::to_value(ValidationRule::JsonValid).expect("encode bare kind");
        assert_eq!(bare, json!({"type": "json_valid"}));
    }

    #[test]
    fn execution_event_decodes_both_discriminator_spellings() {
        let standard = r#"{"event":"step_started","run_id":"r1","step_id":"s1","attempt":2,"timestamp":"2026-08-04T10:00:00.000000","payload":{"step_name":"draft"}}"#;
        let event: ExecutionEvent = serde_json::from_str(standard).expect("decode event");
        assert_eq!(event.event_type, EventType::StepStarted);
        assert_eq!(event.attempt, 2);
        assert_eq!(event.payload["step_name"], json!("draft"));

        let connected = r#"{"event_type":"connected","run_id":"r1","status":"running","payload":{}}"#;
        let event: ExecutionEvent = serde_json::from_str(connected).expect("decode connected");
        assert_eq!(event.event_type, EventType::Connected);
        assert_eq!(event.attempt, 1);
    }

    #[test]
    fn execution_event_rejects_unknown_event_type() {
        let raw = r#"{"event":"run_ended","run_id":"r1"}"#;
        assert!(serde_json::from_str::<ExecutionEvent>(raw).is_err());
    }

    #[test]
    fn payload_summary_truncates_on_character_boundaries() {
        let mut payload = Map::new();
        payload.insert("output".to_string(), json!("é".repeat(400)));
        let event = ExecutionEvent {
            event_type: EventType::LlmOutput,
            run_id: "r1".to_string(),
            step_id: None,
            attempt: 1,
            timestamp: None,
            payload,
        };
        let summary = event.payload_summary(40);
        assert_eq!(summary.chars().count(), 41);
        assert!(summary.ends_with('…'));

        let empty = ExecutionEvent {
            payload: Map::new(),
            ..event
        };
        assert_eq!(empty.payload_summary(40), "");
    }

    #[test]
    fn run_record_tolerates_server_only_fields() {
        let raw = r#"{
            "id": "r1",
            "workflow_id": "w1",
            "status": "completed",
            "current_step_order": 3,
            "step_runs": {"s1": {"status": "passed"}},
            "context": "done",
            "final_output": "ok",
            "total_cost_usd": 0.0125,
            "started_at": "2026-08-04T10:00:00",
            "finished_at": "2026-08-04T10:01:00"
        }"#;
        let record: RunRecord = serde_json::from_str(raw).expect("decode run record");
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.status.is_terminal());
        assert_eq!(record.current_step_order, 3);
        assert_eq!(record.final_output.as_deref(), Some("ok"));
    }

    #[test]
    fn model_catalog_cycles_through_every_entry() {
        let mut model = MODEL_CATALOG[0];
        for _ in 0..MODEL_CATALOG.len() {
            model = model.next_in_catalog();
        }
        assert_eq!(model, MODEL_CATALOG[0]);
    }
}
