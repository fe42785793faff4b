use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod doctor;
pub mod runs;
pub mod workflows;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Workflow => workflows::cmd_workflow(&args[1..]),
        CliVerb::Run => runs::cmd_run(&args[1..]),
        CliVerb::Doctor => doctor::cmd_doctor(),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
