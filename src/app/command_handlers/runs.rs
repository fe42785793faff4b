use crate::app::command_support::{client_from_settings, is_interactive, load_settings};
use crate::client::ApiClient;
use crate::records::RunRecord;
use crate::run::RunController;
use crate::tui::monitor::{run_monitor, run_plain_watch};

pub fn cmd_run(args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err("usage: run <start|watch|status|list> ...".to_string());
    }

    match args[0].as_str() {
        "start" => {
            if args.len() < 2 {
                return Err(
                    "usage: run start <workflow_id> [--context <text>] [--watch]".to_string(),
                );
            }
            let workflow_id = &args[1];
            let (initial_context, watch) = parse_start_flags(&args[2..])?;
            let client = default_client()?;
            if !watch {
                let started = client
                    .start_run(workflow_id, &initial_context)
                    .map_err(|e| e.to_string())?;
                return Ok(format!(
                    "run started\nrun_id={}\nwebsocket_url={}",
                    started.run_id, started.websocket_url
                ));
            }
            let mut controller = RunController::new(client);
            controller
                .start(workflow_id, &initial_context)
                .map_err(|e| e.to_string())?;
            watch_controller(&mut controller)
        }
        "watch" => {
            if args.len() != 2 {
                return Err("usage: run watch <run_id>".to_string());
            }
            let client = default_client()?;
            let mut controller = RunController::new(client);
            controller.attach(&args[1]).map_err(|e| e.to_string())?;
            watch_controller(&mut controller)
        }
        "status" => {
            if args.len() != 2 {
                return Err("usage: run status <run_id>".to_string());
            }
            let client = default_client()?;
            let record = client.get_run(&args[1]).map_err(|e| e.to_string())?;
            Ok(render_run_record(&record))
        }
        "list" => {
            if args.len() != 1 {
                return Err("usage: run list".to_string());
            }
            let client = default_client()?;
            let runs = client.list_runs().map_err(|e| e.to_string())?;
            if runs.is_empty() {
                return Ok("no runs".to_string());
            }
            Ok(runs
                .iter()
                .map(|record| {
                    format!(
                        "{}  {}  workflow={}  cost_usd={:.4}",
                        record.id, record.status, record.workflow_id, record.total_cost_usd
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        other => Err(format!("unknown run subcommand `{other}`")),
    }
}

fn watch_controller(controller: &mut RunController) -> Result<String, String> {
    if is_interactive() {
        run_monitor(controller)
    } else {
        run_plain_watch(controller)
    }
}

fn parse_start_flags(args: &[String]) -> Result<(String, bool), String> {
    let mut initial_context = String::new();
    let mut watch = false;
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--context" => {
                if i + 1 >= args.len() {
                    return Err("--context requires a value".to_string());
                }
                initial_context = args[i + 1].clone();
                i += 2;
            }
            "--watch" => {
                watch = true;
                i += 1;
            }
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }
    Ok((initial_context, watch))
}

fn render_run_record(record: &RunRecord) -> String {
    let mut lines = vec![
        format!("run_id={}", record.id),
        format!("workflow_id={}", record.workflow_id),
        format!("status={}", record.status),
        format!("current_step_order={}", record.current_step_order),
        format!("total_cost_usd={:.4}", record.total_cost_usd),
    ];
    if let Some(started_at) = &record.started_at {
        lines.push(format!("started_at={started_at}"));
    }
    if let Some(finished_at) = &record.finished_at {
        lines.push(format!("finished_at={finished_at}"));
    }
    if let Some(failure_reason) = &record.failure_reason {
        lines.push(format!("failure_reason={failure_reason}"));
    }
    if let Some(final_output) = &record.final_output {
        lines.push(format!("final_output:\n{final_output}"));
    }
    lines.join("\n")
}

fn default_client() -> Result<ApiClient, String> {
    let settings = load_settings()?;
    Ok(client_from_settings(&settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RunStatus;

    #[test]
    fn start_flags_parse_context_and_watch() {
        let args = vec![
            "--context".to_string(),
            "seed text".to_string(),
            "--watch".to_string(),
        ];
        let (context, watch) = parse_start_flags(&args).expect("parse flags");
        assert_eq!(context, "seed text");
        assert!(watch);
    }

    #[test]
    fn start_flags_reject_unknown_arguments() {
        let args = vec!["--follow".to_string()];
        let err = parse_start_flags(&args).expect_err("unknown flag");
        assert!(err.contains("--follow"));
    }

    #[test]
    fn run_record_rendering_includes_failure_reason_when_present() {
        let record = RunRecord {
            id: "run-1".to_string(),
            workflow_id: "wf-1".to_string(),
            status: RunStatus::Failed,
            current_step_order: 2,
            context: String::new(),
            final_output: None,
            failure_reason: Some("Step 2 failed: SyntaxError".to_string()),
            total_cost_usd: 0.0125,
            started_at: Some("2026-08-04T10:00:00".to_string()),
            finished_at: None,
        };
        let rendered = render_run_record(&record);
        assert!(rendered.contains("status=failed"));
        assert!(rendered.contains("failure_reason=Step 2 failed: SyntaxError"));
        assert!(rendered.contains("total_cost_usd=0.0125"));
        assert!(!rendered.contains("finished_at"));
    }
}
