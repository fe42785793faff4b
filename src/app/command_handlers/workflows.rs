use crate::app::command_support::{client_from_settings, is_interactive, load_settings};
use crate::client::ApiClient;
use crate::draft::WorkflowDraft;
use crate::tui::editor::{run_editor, EditorExit};
use serde_json::Value;
use std::fs;

pub fn cmd_workflow(args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err(
            "usage: workflow <list|show|new|edit|delete|export|import> ...".to_string(),
        );
    }

    match args[0].as_str() {
        "list" => {
            if args.len() != 1 {
                return Err("usage: workflow list".to_string());
            }
            let client = default_client()?;
            let workflows = client.list_workflows().map_err(|e| e.to_string())?;
            if workflows.is_empty() {
                return Ok("no workflows".to_string());
            }
            Ok(workflows
                .iter()
                .map(|record| {
                    format!(
                        "{}  {}  steps={}",
                        record.id,
                        record.name,
                        record.steps.len()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "show" => {
            if args.len() != 2 {
                return Err("usage: workflow show <workflow_id>".to_string());
            }
            let client = default_client()?;
            let record = client.get_workflow(&args[1]).map_err(|e| e.to_string())?;
            serde_yaml::to_string(&record).map_err(|e| format!("failed to encode workflow: {e}"))
        }
        "new" => {
            if args.len() != 1 {
                return Err("usage: workflow new".to_string());
            }
            if !is_interactive() {
                return Err("workflow new requires an interactive terminal".to_string());
            }
            let client = default_client()?;
            let mut draft = WorkflowDraft::new();
            match run_editor(&mut draft)? {
                EditorExit::Cancel => Ok("workflow edit canceled".to_string()),
                EditorExit::Save => {
                    draft.validate_for_save().map_err(|e| e.to_string())?;
                    let record = client
                        .create_workflow(&draft.to_create_request())
                        .map_err(|e| e.to_string())?;
                    Ok(format!(
                        "workflow created\nid={}\nname={}\nsteps={}",
                        record.id,
                        record.name,
                        record.steps.len()
                    ))
                }
            }
        }
        "edit" => {
            if args.len() != 2 {
                return Err("usage: workflow edit <workflow_id>".to_string());
            }
            if !is_interactive() {
                return Err("workflow edit requires an interactive terminal".to_string());
            }
            let client = default_client()?;
            let record = client.get_workflow(&args[1]).map_err(|e| e.to_string())?;
            let mut draft = WorkflowDraft::from_record(&record);
            match run_editor(&mut draft)? {
                EditorExit::Cancel => Ok("workflow edit canceled".to_string()),
                EditorExit::Save => {
                    draft.validate_for_save().map_err(|e| e.to_string())?;
                    let updated = client
                        .update_workflow(&record.id, &draft.to_update_request())
                        .map_err(|e| e.to_string())?;
                    Ok(format!(
                        "workflow updated\nid={}\nname={}\nsteps={}",
                        updated.id,
                        updated.name,
                        updated.steps.len()
                    ))
                }
            }
        }
        "delete" => {
            if args.len() != 2 {
                return Err("usage: workflow delete <workflow_id>".to_string());
            }
            let client = default_client()?;
            client.delete_workflow(&args[1]).map_err(|e| e.to_string())?;
            Ok(format!("workflow deleted\nid={}", args[1]))
        }
        "export" => {
            if args.len() != 2 {
                return Err("usage: workflow export <workflow_id>".to_string());
            }
            let client = default_client()?;
            let exported = client.export_workflow(&args[1]).map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&exported)
                .map_err(|e| format!("failed to encode workflow export: {e}"))
        }
        "import" => {
            if args.len() != 2 {
                return Err("usage: workflow import <path>".to_string());
            }
            let raw = fs::read_to_string(&args[1])
                .map_err(|e| format!("failed to read {}: {e}", args[1]))?;
            let workflow: Value = serde_json::from_str(&raw)
                .map_err(|e| format!("failed to parse {}: {e}", args[1]))?;
            let client = default_client()?;
            let record = client.import_workflow(&workflow).map_err(|e| e.to_string())?;
            Ok(format!(
                "workflow imported\nid={}\nname={}",
                record.id, record.name
            ))
        }
        other => Err(format!("unknown workflow subcommand `{other}`")),
    }
}

fn default_client() -> Result<ApiClient, String> {
    let settings = load_settings()?;
    Ok(client_from_settings(&settings))
}
