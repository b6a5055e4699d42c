//! Bot-side configuration: round-loop tuning plus per-role credentials read
//! from a `key=value` file with environment fallbacks.

use crate::config::{load_kv_file, parse_kv};
use crate::game::grid::Direction;
use crate::shared::names::valid_color;
use std::collections::HashMap;
use std::env;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub full_map_refresh_rounds: u64,
    pub timeout_ms: u64,
    pub auto_respawn: bool,
    pub respawn_delay_ms: u64,
    pub safety_margin_ms: i64,
    pub default_direction: Direction,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:18080".to_string(),
            full_map_refresh_rounds: 50,
            timeout_ms: 5000,
            auto_respawn: true,
            respawn_delay_ms: 2000,
            safety_margin_ms: 150,
            default_direction: Direction::Right,
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub endpoint: String,
    pub uid: String,
    pub paste: String,
    pub name: String,
    pub color: Option<String>,
}

fn lookup(
    file: &HashMap<String, String>,
    key: &str,
    env_key: &str,
    fallback: &str,
) -> String {
    if let Some(value) = file.get(key) {
        if !value.is_empty() {
            return value.clone();
        }
    }
    env::var(env_key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Resolve one bot role's settings. Priority per key: config file, then
/// `SNAKE_<ROLE>_*` env var, then default. The file path comes from
/// `SNAKE_BOT_CONFIG` and defaults to `config/bots.conf`; a missing file
/// just means env and defaults.
pub fn bot_settings(role: &str, default_color: &str) -> BotSettings {
    let path = env::var("SNAKE_BOT_CONFIG").unwrap_or_else(|_| "config/bots.conf".to_string());
    let file = load_kv_file(Path::new(&path)).unwrap_or_else(|_| parse_kv(""));
    let role_upper = role.to_ascii_uppercase();

    let endpoint = lookup(&file, "endpoint", "SNAKE_ENDPOINT", "http://127.0.0.1:18080");
    let uid = lookup(&file, &format!("{role}.uid"), &format!("SNAKE_{role_upper}_UID"), role);
    let paste = lookup(
        &file,
        &format!("{role}.paste"),
        &format!("SNAKE_{role_upper}_PASTE"),
        "paste_here",
    );
    let name = lookup(
        &file,
        &format!("{role}.name"),
        &format!("SNAKE_{role_upper}_NAME"),
        role,
    );
    let color_raw = lookup(
        &file,
        &format!("{role}.color"),
        &format!("SNAKE_{role_upper}_COLOR"),
        default_color,
    );
    let color = if valid_color(&color_raw) {
        Some(color_raw)
    } else {
        tracing::warn!(role, color = color_raw, "ignoring invalid bot color");
        None
    };

    BotSettings {
        endpoint,
        uid,
        paste,
        name,
        color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_file_over_fallback() {
        let file = parse_kv("glutton.uid = g-42\nendpoint=http://game:18080\n");
        assert_eq!(
            lookup(&file, "glutton.uid", "SNAKE_TEST_UNSET_UID", "glutton"),
            "g-42"
        );
        assert_eq!(
            lookup(&file, "endpoint", "SNAKE_TEST_UNSET_ENDPOINT", "x"),
            "http://game:18080"
        );
        assert_eq!(
            lookup(&file, "missing", "SNAKE_TEST_UNSET_MISSING", "fallback"),
            "fallback"
        );
    }
}
