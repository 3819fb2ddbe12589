use crate::error::ConfigError;
use crate::types::SessionIdentity;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sample_rate: default_sample_rate(),
            chunk_ms: default_chunk_ms(),
        }
    }
}

impl GeneralConfig {
    /// Frames per captured chunk.
    pub fn chunk_size(&self) -> usize {
        (self.sample_rate as usize * self.chunk_ms as usize) / 1000
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            session_id: None,
            language_code: default_language_code(),
            credentials_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Engine-specific tables, keyed by engine name (e.g. `[service.scripted]`).
    #[serde(flatten)]
    pub engines: toml::Table,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            join_timeout_ms: default_join_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            engines: toml::Table::new(),
        }
    }
}

impl ServiceConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GameConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_arena_size")]
    pub width: f64,

    #[serde(default = "default_arena_size")]
    pub height: f64,

    #[serde(default = "default_speed")]
    pub speed: f64,

    #[serde(default = "default_speed_step")]
    pub speed_step: f64,

    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: default_arena_size(),
            height: default_arena_size(),
            speed: default_speed(),
            speed_step: default_speed_step(),
            max_speed: default_max_speed(),
        }
    }
}

impl GameConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_chunk_ms() -> u32 {
    200
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_project_id() -> String {
    "voiceactivatedgame".to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_engine() -> String {
    "scripted".to_string()
}

fn default_join_timeout_ms() -> u64 {
    1000
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_fps() -> u32 {
    60
}

fn default_arena_size() -> f64 {
    800.0
}

fn default_speed() -> f64 {
    2.0
}

fn default_speed_step() -> f64 {
    5.0
}

fn default_max_speed() -> f64 {
    40.0
}

/// Interpolate `${VAR}` patterns with environment variable values.
/// Comment lines are left alone so documented-but-unset variables do not fail the load.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut lines = Vec::new();
    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }
        let mut result = line.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let var_name = &cap[1];
            let val = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result = result.replace(&cap[0], &val);
        }
        lines.push(result);
    }
    Ok(lines.join("\n"))
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.general.sample_rate == 0 {
            return Err(ConfigError::InvalidValue(
                "general.sample_rate must be positive".to_string(),
            ));
        }
        if self.general.chunk_size() == 0 {
            return Err(ConfigError::InvalidValue(
                "general.chunk_ms is too small for the sample rate".to_string(),
            ));
        }
        if self.game.fps == 0 {
            return Err(ConfigError::InvalidValue(
                "game.fps must be positive".to_string(),
            ));
        }
        if self.session.project_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "session.project_id must not be empty".to_string(),
            ));
        }
        if self.session.language_code.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "session.language_code must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_identity(&self) -> SessionIdentity {
        SessionIdentity::new(
            &self.session.project_id,
            self.session.session_id.as_deref(),
            &self.session.language_code,
            self.general.sample_rate,
            self.general.chunk_size(),
        )
    }

    /// Configuration handed to the selected engine's `initialize`: its own
    /// `[service.<engine>]` table plus the credentials path, when set.
    pub fn engine_config(&self) -> toml::Value {
        let mut table = self
            .service
            .engines
            .get(&self.service.engine)
            .and_then(|v| v.as_table())
            .cloned()
            .unwrap_or_default();

        if let Some(ref path) = self.session.credentials_path {
            table.insert(
                "credentials_path".to_string(),
                toml::Value::String(path.display().to_string()),
            );
        }
        toml::Value::Table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_valid_toml() {
        let toml_str = r#"
[general]
log_level = "debug"
sample_rate = 8000
chunk_ms = 100

[audio]
device_name = "USB Microphone"

[session]
project_id = "my-agent"
session_id = "player-1"
language_code = "en-GB"

[service]
engine = "null"
join_timeout_ms = 250
retry_backoff_ms = 50

[game]
fps = 30
speed = 3
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.sample_rate, 8000);
        assert_eq!(config.general.chunk_size(), 800);
        assert_eq!(config.audio.device_name, "USB Microphone");
        assert_eq!(config.session.project_id, "my-agent");
        assert_eq!(config.session.session_id.as_deref(), Some("player-1"));
        assert_eq!(config.session.language_code, "en-GB");
        assert_eq!(config.service.engine, "null");
        assert_eq!(config.service.join_timeout(), Duration::from_millis(250));
        assert_eq!(config.service.retry_backoff(), Duration::from_millis(50));
        assert_eq!(config.game.fps, 30);
        assert_eq!(config.game.speed, 3.0);
    }

    #[test]
    fn test_config_default_values() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.sample_rate, 16000);
        assert_eq!(config.general.chunk_size(), 3200);
        assert_eq!(config.audio.device_name, "default");
        assert_eq!(config.session.project_id, "voiceactivatedgame");
        assert!(config.session.session_id.is_none());
        assert_eq!(config.session.language_code, "en-US");
        assert!(config.session.credentials_path.is_none());
        assert_eq!(config.service.engine, "scripted");
        assert_eq!(config.service.join_timeout_ms, 1000);
        assert_eq!(config.game.fps, 60);
        assert_eq!(config.game.width, 800.0);
        assert_eq!(config.game.speed, 2.0);
        assert_eq!(config.game.speed_step, 5.0);
    }

    #[test]
    fn test_config_env_var_interpolation() {
        std::env::set_var("VOXGAME_TEST_KEYS", "/tmp/keys.json");
        let toml_str = r#"
[session]
credentials_path = "${VOXGAME_TEST_KEYS}"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.session.credentials_path,
            Some(PathBuf::from("/tmp/keys.json"))
        );
        std::env::remove_var("VOXGAME_TEST_KEYS");
    }

    #[test]
    fn test_config_missing_env_var_error() {
        let toml_str = r#"
[session]
credentials_path = "${DEFINITELY_DOES_NOT_EXIST_12345}"
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_DOES_NOT_EXIST_12345"));
    }

    #[test]
    fn test_config_commented_env_var_ignored() {
        let toml_str = r#"
[session]
# credentials_path = "${DEFINITELY_DOES_NOT_EXIST_12345}"
project_id = "game"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.session.project_id, "game");
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let result = AppConfig::from_toml_str("this is not valid toml [[[");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_config_rejects_zero_sample_rate() {
        let result = AppConfig::from_toml_str("[general]\nsample_rate = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_config_rejects_zero_fps() {
        let result = AppConfig::from_toml_str("[game]\nfps = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_config_rejects_empty_project() {
        let result = AppConfig::from_toml_str("[session]\nproject_id = \"  \"\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = std::env::temp_dir().join("voxgame_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
[general]
log_level = "warn"

[session]
project_id = "file-agent"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.session.project_id, "file-agent");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_load_from_file_not_found() {
        let result = AppConfig::load_from_file(Path::new("/nonexistent/path.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read config file"));
    }

    #[test]
    fn test_engine_config_selects_engine_table() {
        let toml_str = r#"
[service]
engine = "scripted"

[service.scripted]
chunks_per_utterance = 4
utterances = [{ transcript = "go up", intent = "Move_Up" }]

[service.other]
ignored = true
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        let engine = config.engine_config();
        assert_eq!(
            engine.get("chunks_per_utterance").and_then(|v| v.as_integer()),
            Some(4)
        );
        assert!(engine.get("ignored").is_none());
        assert!(engine.get("credentials_path").is_none());
    }

    #[test]
    fn test_engine_config_includes_credentials() {
        let toml_str = r#"
[session]
credentials_path = "keys.json"

[service]
engine = "null"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        let engine = config.engine_config();
        assert_eq!(
            engine.get("credentials_path").and_then(|v| v.as_str()),
            Some("keys.json")
        );
    }

    #[test]
    fn test_session_identity_from_config() {
        let config = AppConfig::from_toml_str(
            "[session]\nproject_id = \"p\"\nsession_id = \"s\"\n",
        )
        .unwrap();
        let identity = config.session_identity();
        assert_eq!(identity.session_path(), "projects/p/agent/sessions/s");
        assert_eq!(identity.sample_rate, 16000);
        assert_eq!(identity.chunk_size, 3200);
    }

    #[test]
    fn test_frame_interval() {
        let config = AppConfig::from_toml_str("[game]\nfps = 50\n").unwrap();
        assert_eq!(config.game.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            AppConfig::from_toml_str(include_str!("../../../config.example.toml")).unwrap();
        assert_eq!(config.service.engine, "scripted");
        let engine = config.engine_config();
        let utterances = engine.get("utterances").and_then(|v| v.as_array()).unwrap();
        assert_eq!(utterances.len(), 8);
        assert_eq!(config.game.max_speed, 40.0);
    }
}
