use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::protocol::QLAB_TCP_PORT;

pub const CONFIG_ENV: &str = "CUEBRIDGE_CONFIG";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    pub host: String,
    pub port: u16,
    pub debounce_ms: u64,
    pub service_announcement: bool,
    pub workspace_name: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: QLAB_TCP_PORT,
            debounce_ms: 50,
            service_announcement: true,
            workspace_name: "Untitled Show".to_string(),
        }
    }
}

impl BridgeSettings {
    /// Defaults, then the JSON file named by `CUEBRIDGE_CONFIG`, then the
    /// individual `CUEBRIDGE_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CUEBRIDGE_HOST") {
            self.host = host;
        }
        if let Some(v) = lookup("CUEBRIDGE_PORT") {
            match v.parse() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!("Ignoring CUEBRIDGE_PORT={}, not a port number.", v),
            }
        }
        if let Some(v) = lookup("CUEBRIDGE_DEBOUNCE_MS") {
            match v.parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => log::warn!("Ignoring CUEBRIDGE_DEBOUNCE_MS={}.", v),
            }
        }
        if let Some(v) = lookup("CUEBRIDGE_ANNOUNCE") {
            self.service_announcement = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
