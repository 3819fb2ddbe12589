pub mod config;
pub mod error;
pub mod game_types;
pub mod types;

pub use config::AppConfig;
pub use error::{AudioError, ConfigError, ServiceError};
pub use game_types::{GameCommand, WorkerState};
pub use types::{
    AudioChunk, AudioEncoding, InputAudioConfig, Intent, QueryResult, RecognitionEvent,
    SessionIdentity, StreamingRequest, StreamingResponse, UtteranceResult,
};
