use crate::service_trait::{expect_config, IntentService, RequestStream, ResponseStream, RESPONSE_BUFFER};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use voxgame_core::{Intent, QueryResult, ServiceError, StreamingRequest, StreamingResponse};

/// One step of a scripted exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedEvent {
    /// Wait until this many audio requests have arrived in the exchange.
    AwaitAudio(usize),
    Respond(StreamingResponse),
    /// End the exchange with a transport error.
    Fail(String),
    /// End the exchange with a protocol error.
    Reject(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedUtterance {
    pub transcript: String,
    #[serde(default)]
    pub intent: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptedConfig {
    #[serde(default = "default_chunks_per_utterance")]
    chunks_per_utterance: usize,

    #[serde(default)]
    utterances: Vec<ScriptedUtterance>,
}

fn default_chunks_per_utterance() -> usize {
    10
}

/// The game's own vocabulary, used when no utterances are configured.
fn default_utterances() -> Vec<ScriptedUtterance> {
    [
        ("go right", "Move_Right"),
        ("go down", "Move_Down"),
        ("stop", "Stop"),
        ("speed up", "Speed_Up"),
        ("go left", "Move_Left"),
        ("go up", "Move_Up"),
        ("slow down", "Slow_Down"),
        ("stop", "Stop"),
    ]
    .into_iter()
    .map(|(transcript, intent)| ScriptedUtterance {
        transcript: transcript.to_string(),
        intent: intent.to_string(),
    })
    .collect()
}

/// The script a single spoken utterance produces: an interim transcript,
/// the query result, then the utterance boundary.
pub fn utterance_script(utterance: &ScriptedUtterance, after_chunks: usize) -> Vec<ScriptedEvent> {
    vec![
        ScriptedEvent::AwaitAudio(after_chunks),
        ScriptedEvent::Respond(StreamingResponse::transcript(&utterance.transcript, false)),
        ScriptedEvent::Respond(StreamingResponse::query(QueryResult {
            query_text: utterance.transcript.clone(),
            language_code: String::new(),
            intent: Intent {
                display_name: utterance.intent.clone(),
                confidence: if utterance.intent.is_empty() { 0.0 } else { 1.0 },
            },
            fulfillment_text: String::new(),
        })),
        ScriptedEvent::Respond(StreamingResponse::end_of_utterance()),
    ]
}

/// Plays back canned responses, one script per exchange, cycling. Drives
/// the game without a network back-end and stands in for one in tests.
pub struct ScriptedService {
    scripts: Mutex<Vec<Vec<ScriptedEvent>>>,
    exchanges: AtomicUsize,
    audio_requests: Arc<AtomicUsize>,
    audio_after_boundary: Arc<AtomicUsize>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::with_scripts(Vec::new())
    }

    pub fn with_scripts(scripts: Vec<Vec<ScriptedEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            exchanges: AtomicUsize::new(0),
            audio_requests: Arc::new(AtomicUsize::new(0)),
            audio_after_boundary: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn audio_requests(&self) -> usize {
        self.audio_requests.load(Ordering::SeqCst)
    }

    /// Audio requests that arrived after an utterance boundary was sent.
    pub fn audio_after_boundary(&self) -> usize {
        self.audio_after_boundary.load(Ordering::SeqCst)
    }

    fn script_for(&self, exchange: usize) -> Vec<ScriptedEvent> {
        let scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        if scripts.is_empty() {
            return Vec::new();
        }
        scripts[exchange % scripts.len()].clone()
    }
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

struct ExchangeCounters {
    audio_requests: Arc<AtomicUsize>,
    audio_after_boundary: Arc<AtomicUsize>,
    audio_seen: usize,
    boundary_sent: bool,
}

impl ExchangeCounters {
    /// Read one request. `Ok(false)` once the client has hung up.
    async fn next(&mut self, requests: &mut RequestStream) -> Result<bool, ServiceError> {
        match requests.recv().await {
            Some(StreamingRequest::Audio(_)) => {
                self.audio_seen += 1;
                self.audio_requests.fetch_add(1, Ordering::SeqCst);
                if self.boundary_sent {
                    self.audio_after_boundary.fetch_add(1, Ordering::SeqCst);
                }
                Ok(true)
            }
            Some(StreamingRequest::Config { .. }) => Err(ServiceError::Protocol(
                "config sent twice in one exchange".to_string(),
            )),
            None => Ok(false),
        }
    }
}

async fn play_script(
    script: Vec<ScriptedEvent>,
    mut requests: RequestStream,
    tx: mpsc::Sender<Result<StreamingResponse, ServiceError>>,
    mut counters: ExchangeCounters,
) -> Result<(), ServiceError> {
    if !expect_config(&mut requests).await? {
        return Ok(());
    }

    for event in script {
        match event {
            ScriptedEvent::AwaitAudio(n) => {
                while counters.audio_seen < n {
                    if !counters.next(&mut requests).await? {
                        return Ok(());
                    }
                }
            }
            ScriptedEvent::Respond(response) => {
                if response.is_end_of_utterance() {
                    counters.boundary_sent = true;
                }
                if tx.send(Ok(response)).await.is_err() {
                    return Ok(());
                }
            }
            ScriptedEvent::Fail(msg) => return Err(ServiceError::Transport(msg)),
            ScriptedEvent::Reject(msg) => return Err(ServiceError::Protocol(msg)),
        }
    }

    // Hold the exchange open until the client half-closes.
    while counters.next(&mut requests).await? {}
    Ok(())
}

#[async_trait]
impl IntentService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), ServiceError> {
        let parsed: ScriptedConfig = config
            .try_into()
            .map_err(|e| ServiceError::InitializationFailed(format!("scripted config: {e}")))?;

        let utterances = if parsed.utterances.is_empty() {
            default_utterances()
        } else {
            parsed.utterances
        };
        let scripts: Vec<_> = utterances
            .iter()
            .map(|u| utterance_script(u, parsed.chunks_per_utterance))
            .collect();

        tracing::info!(
            utterances = scripts.len(),
            chunks_per_utterance = parsed.chunks_per_utterance,
            "ScriptedService initialized"
        );
        *self.scripts.lock().unwrap_or_else(PoisonError::into_inner) = scripts;
        Ok(())
    }

    async fn streaming_detect_intent(
        &self,
        requests: RequestStream,
    ) -> Result<ResponseStream, ServiceError> {
        let exchange = self.exchanges.fetch_add(1, Ordering::SeqCst);
        let script = self.script_for(exchange);
        let counters = ExchangeCounters {
            audio_requests: Arc::clone(&self.audio_requests),
            audio_after_boundary: Arc::clone(&self.audio_after_boundary),
            audio_seen: 0,
            boundary_sent: false,
        };
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

        tokio::spawn(async move {
            let errors = tx.clone();
            if let Err(e) = play_script(script, requests, tx, counters).await {
                tracing::debug!("scripted exchange #{exchange} ended with error: {e}");
                let _ = errors.send(Err(e)).await;
            }
        });

        Ok(rx)
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
