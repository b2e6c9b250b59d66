use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::domain::{Chain, ContractAddress};
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "session.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub contract_address: ContractAddress,
    pub chain: Chain,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub value_watch_interval_ms: u64,
    pub event_buffer: usize,
    pub strict_recipient_check: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            contract_address: ContractAddress::new("0x0"),
            chain: Chain::Sepolia,
            poll_interval_ms: 2_000,
            max_poll_attempts: 90,
            value_watch_interval_ms: 5_000,
            event_buffer: 1024,
            strict_recipient_check: false,
        }
    }
}

impl SessionSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_attempts(&self) -> u32 {
        self.max_poll_attempts.max(1)
    }

    pub fn value_watch_interval(&self) -> Duration {
        Duration::from_millis(self.value_watch_interval_ms.max(1))
    }
}

pub fn load_settings() -> SessionSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

/// Defaults, then the TOML file at `path` if it exists, then environment overrides.
pub fn load_settings_from(path: &Path) -> SessionSettings {
    let mut settings = read_settings_file(path);
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Defaults overlaid with the TOML file at `path`; a missing or unparseable
/// file leaves the defaults in place.
pub fn read_settings_file(path: &Path) -> SessionSettings {
    match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<SessionSettings>(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %path.display(), "config: ignoring unparseable settings file: {err}");
                SessionSettings::default()
            }
        },
        Err(_) => SessionSettings::default(),
    }
}

pub fn apply_env_overrides(
    settings: &mut SessionSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("CONTRACT_ADDRESS") {
        settings.contract_address = ContractAddress::new(v);
    }
    if let Some(v) = lookup("APP__CONTRACT_ADDRESS") {
        settings.contract_address = ContractAddress::new(v);
    }

    if let Some(v) = lookup("APP__CHAIN") {
        match v.to_ascii_lowercase().as_str() {
            "mainnet" => settings.chain = Chain::Mainnet,
            "sepolia" => settings.chain = Chain::Sepolia,
            other => warn!("config: ignoring unknown APP__CHAIN={other}"),
        }
    }

    override_parsed(&lookup, "APP__POLL_INTERVAL_MS", &mut settings.poll_interval_ms);
    override_parsed(&lookup, "APP__MAX_POLL_ATTEMPTS", &mut settings.max_poll_attempts);
    override_parsed(
        &lookup,
        "APP__VALUE_WATCH_INTERVAL_MS",
        &mut settings.value_watch_interval_ms,
    );
    override_parsed(&lookup, "APP__EVENT_BUFFER", &mut settings.event_buffer);
    override_parsed(
        &lookup,
        "APP__STRICT_RECIPIENT_CHECK",
        &mut settings.strict_recipient_check,
    );
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("config: ignoring unparseable {key}={raw}"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
