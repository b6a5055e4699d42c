//! Server configuration, assembled once in `main` and passed down through
//! constructors. Values come from an optional `key=value` config file with
//! environment-variable (`SNAKE_*`) fallbacks.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub game: GameConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub leaderboard: LeaderboardConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_url: String,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub map_width: i32,
    pub map_height: i32,
    pub round_time_ms: u64,
    pub initial_snake_length: usize,
    pub invincible_rounds: u32,
    pub food_density: f64,
    pub safe_spawn_radius: i32,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub status_per_minute: u32,
    pub login_per_hour: u32,
    pub join_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub verification_enabled: bool,
    pub paste_base_url: String,
    pub verification_text: String,
}

#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    pub season_id: String,
    pub max_entries: i64,
    pub refresh_interval_rounds: u32,
    pub cache_ttl_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 18080,
            database_url: "sqlite://./data/snake.db".to_string(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_width: 50,
            map_height: 50,
            round_time_ms: 1000,
            initial_snake_length: 3,
            invincible_rounds: 5,
            food_density: 0.05,
            safe_spawn_radius: 5,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            status_per_minute: 60,
            login_per_hour: 10,
            join_per_minute: 5,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verification_enabled: false,
            paste_base_url: "https://www.luogu.com.cn/paste".to_string(),
            verification_text: "SnakeGameVerification2026".to_string(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            season_id: "all_time".to_string(),
            max_entries: 200,
            refresh_interval_rounds: 5,
            cache_ttl_seconds: 5,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Resolution order per key: config file, then `SNAKE_*` env var, then
    /// the built-in default.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match config_path {
            Some(path) => load_kv_file(path)?,
            None => HashMap::new(),
        };
        let source = Source { file };

        let server = ServerConfig::default();
        let game = GameConfig::default();
        let rate_limit = RateLimitConfig::default();
        let auth = AuthConfig::default();
        let leaderboard = LeaderboardConfig::default();
        let metrics = MetricsConfig::default();

        Ok(Self {
            server: ServerConfig {
                bind_address: source.get("bind_address", "SNAKE_BIND_ADDRESS", server.bind_address),
                port: source.parse("port", "SNAKE_PORT", server.port),
                database_url: source.get("database_url", "SNAKE_DATABASE_URL", server.database_url),
            },
            game: GameConfig {
                map_width: source.parse("map_width", "SNAKE_MAP_WIDTH", game.map_width),
                map_height: source.parse("map_height", "SNAKE_MAP_HEIGHT", game.map_height),
                round_time_ms: source.parse("round_time_ms", "SNAKE_ROUND_TIME_MS", game.round_time_ms),
                initial_snake_length: source.parse(
                    "initial_snake_length",
                    "SNAKE_INITIAL_LENGTH",
                    game.initial_snake_length,
                ),
                invincible_rounds: source.parse(
                    "invincible_rounds",
                    "SNAKE_INVINCIBLE_ROUNDS",
                    game.invincible_rounds,
                ),
                food_density: source.parse("food_density", "SNAKE_FOOD_DENSITY", game.food_density),
                safe_spawn_radius: source.parse(
                    "safe_spawn_radius",
                    "SNAKE_SAFE_SPAWN_RADIUS",
                    game.safe_spawn_radius,
                ),
            },
            rate_limit: RateLimitConfig {
                enabled: source.parse("rate_limit_enabled", "SNAKE_RATE_LIMIT_ENABLED", rate_limit.enabled),
                status_per_minute: source.parse(
                    "status_per_minute",
                    "SNAKE_STATUS_PER_MINUTE",
                    rate_limit.status_per_minute,
                ),
                login_per_hour: source.parse(
                    "login_per_hour",
                    "SNAKE_LOGIN_PER_HOUR",
                    rate_limit.login_per_hour,
                ),
                join_per_minute: source.parse(
                    "join_per_minute",
                    "SNAKE_JOIN_PER_MINUTE",
                    rate_limit.join_per_minute,
                ),
            },
            auth: AuthConfig {
                verification_enabled: source.parse(
                    "verification_enabled",
                    "SNAKE_VERIFICATION_ENABLED",
                    auth.verification_enabled,
                ),
                paste_base_url: source.get("paste_base_url", "SNAKE_PASTE_BASE_URL", auth.paste_base_url),
                verification_text: source.get(
                    "verification_text",
                    "SNAKE_VERIFICATION_TEXT",
                    auth.verification_text,
                ),
            },
            leaderboard: LeaderboardConfig {
                season_id: source.get("season_id", "SNAKE_SEASON_ID", leaderboard.season_id),
                max_entries: source.parse(
                    "leaderboard_max_entries",
                    "SNAKE_LEADERBOARD_MAX_ENTRIES",
                    leaderboard.max_entries,
                ),
                refresh_interval_rounds: leaderboard.refresh_interval_rounds,
                cache_ttl_seconds: leaderboard.cache_ttl_seconds,
            },
            metrics: MetricsConfig {
                enabled: source.parse("metrics_enabled", "SNAKE_METRICS_ENABLED", metrics.enabled),
            },
        })
    }
}

struct Source {
    file: HashMap<String, String>,
}

impl Source {
    fn raw(&self, key: &str, env_key: &str) -> Option<String> {
        if let Some(value) = self.file.get(key) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
        env::var(env_key).ok().filter(|value| !value.is_empty())
    }

    fn get(&self, key: &str, env_key: &str, fallback: String) -> String {
        self.raw(key, env_key).unwrap_or(fallback)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, env_key: &str, fallback: T) -> T {
        match self.raw(key, env_key) {
            Some(value) => match value.trim().parse() {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!(key, value, "unparseable config value, using default");
                    fallback
                }
            },
            None => fallback,
        }
    }
}

/// Parse a `key=value` file: blank lines and `#` comments are skipped,
/// whitespace around keys and values is trimmed.
pub fn load_kv_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let contents = fs::read_to_string(path)
        .map_err(|error| anyhow::anyhow!("failed to read {}: {error}", path.display()))?;
    Ok(parse_kv(&contents))
}

pub fn parse_kv(contents: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !key.is_empty() {
            result.insert(key.to_string(), value.trim().to_string());
        }
    }
    result
}

impl GameConfig {
    /// Target food count for replenishment: floor(W * H * density).
    pub fn food_target(&self) -> usize {
        ((self.map_width as f64) * (self.map_height as f64) * self.food_density).floor() as usize
    }
}
