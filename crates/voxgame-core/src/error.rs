use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("stream error: {0}")]
    StreamError(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("intent service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("intent service not found: {0}")]
    ServiceNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error("audio capture failed: {0}")]
    Audio(#[from] AudioError),
}

impl ServiceError {
    /// Transport failures cost one utterance; everything else is a bug or a
    /// misconfiguration and must reach the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}
