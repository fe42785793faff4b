use crate::app::command_support::{client_from_settings, load_settings};
use crate::config::default_global_config_path;

pub fn cmd_doctor() -> Result<String, String> {
    let mut lines = Vec::new();

    match default_global_config_path() {
        Ok(path) => {
            let state = if path.exists() { "present" } else { "absent (defaults in use)" };
            lines.push(format!("config: {} ({state})", path.display()));
        }
        Err(err) => lines.push(format!("config: {err}")),
    }

    let settings = load_settings()?;
    lines.push(format!("api_base: {}", settings.api_base));
    if let Some(event_base) = &settings.event_base {
        lines.push(format!("event_base: {event_base}"));
    }
    lines.push(format!("state_root: {}", settings.state_root.display()));

    let client = client_from_settings(&settings);
    match client.health() {
        Ok(health) => lines.push(format!("service: {}", health.status)),
        Err(err) => lines.push(format!("service: unreachable ({err})")),
    }

    Ok(lines.join("\n"))
}
