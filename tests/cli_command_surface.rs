use flowdeck::app::command_handlers::run_cli;

fn run(args: &[&str]) -> Result<String, String> {
    run_cli(args.iter().map(|arg| arg.to_string()).collect())
}

#[test]
fn bare_invocation_prints_help() {
    let output = run(&[]).expect("help output");
    assert!(output.contains("workflow list"));
    assert!(output.contains("run start"));
    assert!(output.contains("doctor"));
}

#[test]
fn unknown_command_is_rejected() {
    let err = run(&["deploy"]).expect_err("unknown command");
    assert!(err.contains("deploy"));
}

#[test]
fn workflow_requires_a_subcommand() {
    let err = run(&["workflow"]).expect_err("usage error");
    assert!(err.contains("usage: workflow"));
}

#[test]
fn workflow_rejects_unknown_subcommands() {
    let err = run(&["workflow", "promote"]).expect_err("usage error");
    assert!(err.contains("promote"));
}

#[test]
fn workflow_show_requires_an_id() {
    let err = run(&["workflow", "show"]).expect_err("usage error");
    assert_eq!(err, "usage: workflow show <workflow_id>");
}

#[test]
fn workflow_new_refuses_without_a_terminal() {
    // Test harness stdin/stdout are not terminals, so the editor cannot open.
    let err = run(&["workflow", "new"]).expect_err("interactivity guard");
    assert!(err.contains("interactive terminal"));
}

#[test]
fn workflow_import_reports_unreadable_files() {
    let err = run(&["workflow", "import", "/nonexistent/workflow.json"])
        .expect_err("missing file");
    assert!(err.contains("/nonexistent/workflow.json"));
}

#[test]
fn run_requires_a_subcommand() {
    let err = run(&["run"]).expect_err("usage error");
    assert!(err.contains("usage: run"));
}

#[test]
fn run_start_requires_a_workflow_id() {
    let err = run(&["run", "start"]).expect_err("usage error");
    assert!(err.contains("usage: run start"));
}

#[test]
fn run_start_rejects_dangling_context_flag() {
    let err = run(&["run", "start", "wf-1", "--context"]).expect_err("usage error");
    assert_eq!(err, "--context requires a value");
}

#[test]
fn run_watch_requires_a_run_id() {
    let err = run(&["run", "watch"]).expect_err("usage error");
    assert_eq!(err, "usage: run watch <run_id>");
}
