use std::{collections::HashMap, fs};

use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub staff_password: String,
    pub seed_demo_cases: bool,
    pub citizens_without_dfe: Vec<String>,
    pub dfe_remediation_url: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            session_secret: "dev-session-secret".into(),
            session_ttl_seconds: 8 * 3600,
            staff_password: "123456".into(),
            seed_demo_cases: true,
            citizens_without_dfe: Vec::new(),
            dfe_remediation_url: "/dfe/constituir".into(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

/// Overlays flat `key = "value"` pairs. A file that does not parse is ignored.
pub fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file");
            return;
        }
    };
    apply(settings, |key| file_cfg.get(key).cloned());
}

pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    apply(settings, |key| lookup(&format!("APP__{}", key.to_ascii_uppercase())));
}

fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("bind_addr") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("session_secret") {
        settings.session_secret = v;
    }
    if let Some(v) = lookup("session_ttl_seconds") {
        parse_into(&mut settings.session_ttl_seconds, "session_ttl_seconds", &v);
    }
    if let Some(v) = lookup("staff_password") {
        settings.staff_password = v;
    }
    if let Some(v) = lookup("seed_demo_cases") {
        parse_into(&mut settings.seed_demo_cases, "seed_demo_cases", &v);
    }
    if let Some(v) = lookup("citizens_without_dfe") {
        settings.citizens_without_dfe = v
            .split(',')
            .map(str::trim)
            .filter(|cuit| !cuit.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = lookup("dfe_remediation_url") {
        settings.dfe_remediation_url = v;
    }
    if let Some(v) = lookup("max_body_bytes") {
        parse_into(&mut settings.max_body_bytes, "max_body_bytes", &v);
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value = raw, "ignoring invalid setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
