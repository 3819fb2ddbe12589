use crate::service_trait::{expect_config, IntentService, RequestStream, ResponseStream, RESPONSE_BUFFER};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use voxgame_core::{ServiceError, StreamingRequest};

/// Swallows audio and never recognizes anything. Useful for checking the
/// capture path without a network back-end.
pub struct NullService {
    exchanges: AtomicUsize,
    audio_requests: Arc<AtomicUsize>,
}

impl NullService {
    pub fn new() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            audio_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::Relaxed)
    }

    pub fn audio_requests(&self) -> usize {
        self.audio_requests.load(Ordering::Relaxed)
    }
}

impl Default for NullService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentService for NullService {
    fn name(&self) -> &str {
        "null"
    }

    async fn initialize(&mut self, _config: toml::Value) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn streaming_detect_intent(
        &self,
        mut requests: RequestStream,
    ) -> Result<ResponseStream, ServiceError> {
        let exchange = self.exchanges.fetch_add(1, Ordering::Relaxed) + 1;
        let audio_requests = Arc::clone(&self.audio_requests);
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

        tokio::spawn(async move {
            match expect_config(&mut requests).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
            let mut bytes = 0usize;
            while let Some(request) = requests.recv().await {
                if let StreamingRequest::Audio(chunk) = request {
                    bytes += chunk.len();
                    audio_requests.fetch_add(1, Ordering::Relaxed);
                }
            }
            tracing::trace!("NullService exchange #{exchange} closed after {bytes} bytes");
        });

        Ok(rx)
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
