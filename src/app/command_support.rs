use crate::client::ApiClient;
use crate::config::{load_global_settings, Settings};
use std::io::{self, IsTerminal};

pub fn load_settings() -> Result<Settings, String> {
    load_global_settings().map_err(|err| err.to_string())
}

pub fn client_from_settings(settings: &Settings) -> ApiClient {
    ApiClient::from_settings(settings)
}

pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}
