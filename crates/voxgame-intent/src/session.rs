use crate::service_trait::IntentService;
use crate::status::WorkerStatus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use voxgame_audio::Chunks;
use voxgame_core::{
    AudioChunk, QueryResult, RecognitionEvent, ServiceError, SessionIdentity, StreamingRequest,
    StreamingResponse, UtteranceResult, WorkerState,
};

/// Requests queued toward the service. With one slot, at most one audio
/// request is in flight when the service signals the utterance boundary.
const REQUEST_BUFFER: usize = 1;

/// Coalesced chunks read ahead of the exchange.
const READ_AHEAD: usize = 1;

/// How long an exchange waits for its audio reader to wind down.
const READER_GRACE: Duration = Duration::from_millis(500);

// ── UtteranceTracker ──────────────────────────────────────────

/// Timing and tentative result for one exchange.
#[derive(Debug, Default)]
pub struct UtteranceTracker {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    cached: Option<QueryResult>,
}

impl UtteranceTracker {
    /// Record one response received at `now`. Returns `true` for the first
    /// response of the exchange.
    pub fn observe(&mut self, response: &StreamingResponse, now: DateTime<Utc>) -> bool {
        let first = self.start_time.is_none();
        if first {
            self.start_time = Some(now);
        }
        if let Some(result) = response.intent_result() {
            self.cached = Some(result.clone());
        }
        if response.is_end_of_utterance() && self.end_time.is_none() {
            self.end_time = Some(now);
        }
        first
    }

    pub fn has_boundary(&self) -> bool {
        self.end_time.is_some()
    }

    /// The utterance, if any intent was recognized. Missing timestamps are
    /// filled with `now`.
    pub fn finish(self, now: DateTime<Utc>) -> Option<UtteranceResult> {
        let raw_result = self.cached?;
        let start_time = self.start_time.unwrap_or(now);
        let end_time = self.end_time.unwrap_or(now).max(start_time);
        Some(UtteranceResult {
            start_time,
            end_time,
            raw_result,
        })
    }
}

// ── RecognitionSession ────────────────────────────────────────

/// Runs one single-utterance exchange per [`run_once`](Self::run_once)
/// call against an [`IntentService`], reusing the same identity each time.
pub struct RecognitionSession {
    service: Arc<dyn IntentService>,
    identity: SessionIdentity,
    cancel: watch::Sender<bool>,
    status: Option<WorkerStatus>,
}

impl RecognitionSession {
    pub fn open(service: Arc<dyn IntentService>, identity: SessionIdentity) -> Self {
        let (cancel, _) = watch::channel(false);
        tracing::debug!(
            service = service.name(),
            session = %identity.session_path(),
            "recognition session opened"
        );
        Self {
            service,
            identity,
            cancel,
            status: None,
        }
    }

    /// Report `Recognizing` through `status` once a response arrives.
    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Abort the running exchange and make future ones return immediately.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    fn config_request(&self) -> StreamingRequest {
        StreamingRequest::Config {
            session: self.identity.session_path(),
            audio_config: self.identity.audio_config(),
            single_utterance: true,
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn cooldown(&self, duration: Duration) {
        let mut cancelled = self.cancel.subscribe();
        if *cancelled.borrow_and_update() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancelled.changed() => {}
        }
    }

    /// Stream `audio` to the service until the exchange closes and return
    /// the recognized utterance, if any.
    ///
    /// Audio forwarding stops at the service's end-of-utterance signal, and
    /// the queue `audio` reads from is paused. Responses are always handled
    /// before the next audio request is sent. Transport errors end the
    /// exchange but still return the cached result; any other error is
    /// returned.
    pub async fn run_once(&self, audio: Chunks) -> Result<Option<UtteranceResult>, ServiceError> {
        let mut cancelled = self.cancel.subscribe();
        if *cancelled.borrow_and_update() {
            return Ok(None);
        }

        let queue = audio.queue().clone();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);
        request_tx
            .send(self.config_request())
            .await
            .map_err(|_| ServiceError::Protocol("request stream closed before config".into()))?;

        let mut responses = match self.service.streaming_detect_intent(request_rx).await {
            Ok(responses) => responses,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "could not open recognition exchange");
                queue.pause();
                return Ok(None);
            }
            Err(e) => {
                queue.pause();
                return Err(e);
            }
        };

        let (audio_tx, mut audio_rx) = mpsc::channel(READ_AHEAD);
        let reader = spawn_reader(audio, audio_tx);

        // `None` once the request half is closed.
        let mut requests = Some(request_tx);
        let mut pending: Option<AudioChunk> = None;
        let mut sent = 0usize;
        let mut tracker = UtteranceTracker::default();

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancelled.changed() => {
                    tracing::debug!("recognition exchange cancelled");
                    break Ok(());
                }
                message = responses.recv() => match message {
                    Some(Ok(response)) => {
                        if tracker.observe(&response, Utc::now()) {
                            if let Some(ref status) = self.status {
                                status.set(WorkerState::Recognizing);
                            }
                        }
                        if let Some(RecognitionEvent::Transcript { ref text, is_final }) = response.recognition {
                            tracing::debug!(transcript = %text, is_final, "partial transcript");
                        }
                        if response.is_end_of_utterance() && requests.is_some() {
                            tracing::debug!(sent, "end of single utterance");
                            requests = None;
                            pending = None;
                            queue.pause();
                        }
                    }
                    Some(Err(e)) if e.is_recoverable() => {
                        tracing::warn!(error = %e, "recognition exchange dropped");
                        break Ok(());
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
                permit = reserve(requests.clone()), if pending.is_some() => {
                    match (permit, pending.take()) {
                        (Some(permit), Some(chunk)) => {
                            permit.send(StreamingRequest::Audio(chunk));
                            sent += 1;
                        }
                        // the service stopped reading requests
                        _ => requests = None,
                    }
                }
                chunk = audio_rx.recv(), if pending.is_none() && requests.is_some() => match chunk {
                    Some(chunk) => pending = Some(chunk),
                    None => {
                        tracing::trace!(sent, "audio ended, half-closing exchange");
                        requests = None;
                    }
                },
            }
        };

        drop(audio_rx);
        queue.pause();
        if tokio::time::timeout(READER_GRACE, reader).await.is_err() {
            tracing::warn!("audio reader still busy after exchange closed");
        }
        outcome?;

        Ok(tracker.finish(Utc::now()))
    }
}

async fn reserve(
    requests: Option<mpsc::Sender<StreamingRequest>>,
) -> Option<mpsc::OwnedPermit<StreamingRequest>> {
    requests?.reserve_owned().await.ok()
}

/// Read audio on a blocking thread, since [`Chunks`] blocks between
/// captures. Ends when the sequence does or the exchange stops listening.
fn spawn_reader(audio: Chunks, chunks: mpsc::Sender<AudioChunk>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        for chunk in audio {
            if chunks.blocking_send(chunk).is_err() {
                break;
            }
        }
    })
}
