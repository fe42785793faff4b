#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Workflow,
    Run,
    Doctor,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "workflow" => CliVerb::Workflow,
        "run" => CliVerb::Run,
        "doctor" => CliVerb::Doctor,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  workflow list                        List saved workflows".to_string(),
        "  workflow show <workflow_id>          Print a workflow as YAML".to_string(),
        "  workflow new                         Build a workflow in the editor".to_string(),
        "  workflow edit <workflow_id>          Edit a saved workflow".to_string(),
        "  workflow delete <workflow_id>        Delete a saved workflow".to_string(),
        "  workflow export <workflow_id>        Print a workflow as JSON".to_string(),
        "  workflow import <path>               Create a workflow from a JSON file".to_string(),
        "  run start <workflow_id> [--context <text>] [--watch]".to_string(),
        "                                       Start a run; --watch follows it live".to_string(),
        "  run watch <run_id>                   Follow a run's event stream".to_string(),
        "  run status <run_id>                  Show a run's persisted state".to_string(),
        "  run list                             List runs".to_string(),
        "  doctor                               Check config and service health".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
