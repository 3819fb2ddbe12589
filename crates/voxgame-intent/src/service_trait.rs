use async_trait::async_trait;
use tokio::sync::mpsc;
use voxgame_core::{ServiceError, StreamingRequest, StreamingResponse};

/// Request half of a streaming exchange, as seen by the service.
pub type RequestStream = mpsc::Receiver<StreamingRequest>;

/// Response half of a streaming exchange. The exchange is over when the
/// channel closes; an `Err` item ends it early.
pub type ResponseStream = mpsc::Receiver<Result<StreamingResponse, ServiceError>>;

/// Responses buffered per exchange before the service waits on the reader.
pub const RESPONSE_BUFFER: usize = 16;

/// A streaming intent-detection back-end.
///
/// Each call to [`streaming_detect_intent`](Self::streaming_detect_intent)
/// opens one bidirectional exchange. The first request is always a
/// [`StreamingRequest::Config`]; audio follows until the caller drops its
/// sender.
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Registry name (e.g. `"null"`, `"scripted"`).
    fn name(&self) -> &str;
    /// One-time setup from the engine's config table. Credentials arrive
    /// here as `credentials_path`, never through the process environment.
    async fn initialize(&mut self, config: toml::Value) -> Result<(), ServiceError>;
    /// Open an exchange fed by `requests`.
    async fn streaming_detect_intent(
        &self,
        requests: RequestStream,
    ) -> Result<ResponseStream, ServiceError>;
    async fn shutdown(&self) -> Result<(), ServiceError>;
}

/// Consume the opening request of an exchange, rejecting anything but a
/// config message. `Ok(false)` means the client hung up before sending one.
pub(crate) async fn expect_config(requests: &mut RequestStream) -> Result<bool, ServiceError> {
    match requests.recv().await {
        Some(request) if request.is_config() => Ok(true),
        Some(_) => Err(ServiceError::Protocol(
            "first request of an exchange must carry the session config".to_string(),
        )),
        None => Ok(false),
    }
}
