use crate::mailbox::Mailbox;
use crate::session::RecognitionSession;
use crate::status::WorkerStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use voxgame_audio::ChunkQueue;
use voxgame_core::config::ServiceConfig;
use voxgame_core::{ServiceError, UtteranceResult, WorkerState};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// How long `stop()` waits for the thread before detaching it.
    pub join_timeout: Duration,
    /// Pause after an exchange that produced nothing quickly.
    pub retry_backoff: Duration,
}

impl WorkerOptions {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            join_timeout: config.join_timeout(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// State shared with the worker thread.
struct WorkerContext {
    session: Arc<RecognitionSession>,
    queue: ChunkQueue,
    mailbox: Arc<Mailbox<UtteranceResult>>,
    status: WorkerStatus,
    running: Arc<AtomicBool>,
    retry_backoff: Duration,
}

impl WorkerContext {
    async fn run(&self) -> Result<(), ServiceError> {
        while self.running.load(Ordering::SeqCst) {
            self.status.set(WorkerState::Listening);
            self.queue.resume();
            let began = Instant::now();
            let outcome = self.session.run_once(self.queue.chunks()).await;
            self.queue.pause();

            match outcome {
                Ok(Some(result)) => {
                    tracing::info!(
                        intent = result.intent_name(),
                        transcript = result.transcript(),
                        "utterance recognized"
                    );
                    self.status.set(WorkerState::Publishing);
                    if self.mailbox.publish(result).is_err() {
                        tracing::debug!("mailbox closed, dropping result");
                        break;
                    }
                }
                Ok(None) => {
                    if began.elapsed() < self.retry_backoff && !self.queue.is_closed() {
                        self.session.cooldown(self.retry_backoff).await;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "recognition failed, stopping worker");
                    return Err(e);
                }
            }

            if self.queue.is_closed() {
                return match self.queue.failure() {
                    Some(e) => {
                        tracing::error!(error = %e, "audio capture failed, stopping worker");
                        Err(e.into())
                    }
                    None => Ok(()),
                };
            }
        }
        Ok(())
    }
}

/// Drives a [`RecognitionSession`] on a dedicated thread and hands each
/// recognized utterance to the foreground through a one-slot mailbox.
pub struct IntentWorker {
    session: Arc<RecognitionSession>,
    queue: ChunkQueue,
    options: WorkerOptions,
    mailbox: Arc<Mailbox<UtteranceResult>>,
    status: WorkerStatus,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), ServiceError>>>,
    started: bool,
}

impl IntentWorker {
    pub fn new(session: RecognitionSession, queue: ChunkQueue, options: WorkerOptions) -> Self {
        let status = WorkerStatus::new();
        Self {
            session: Arc::new(session.with_status(status.clone())),
            queue,
            options,
            mailbox: Arc::new(Mailbox::new()),
            status,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            started: false,
        }
    }

    /// Spawn the worker thread. Calling it again is a no-op.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.running.store(true, Ordering::SeqCst);

        let ctx = WorkerContext {
            session: Arc::clone(&self.session),
            queue: self.queue.clone(),
            mailbox: Arc::clone(&self.mailbox),
            status: self.status.clone(),
            running: Arc::clone(&self.running),
            retry_backoff: self.options.retry_backoff,
        };

        let thread = std::thread::Builder::new()
            .name("intent-worker".into())
            .spawn(move || {
                let result = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => {
                        let result = rt.block_on(ctx.run());
                        rt.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
                        result
                    }
                    Err(e) => Err(ServiceError::Worker(format!("failed to build runtime: {e}"))),
                };
                // Nobody reads the queue from here on.
                ctx.queue.close();
                ctx.status.set(WorkerState::Stopped);
                result
            })
            .map_err(|e| ServiceError::Worker(format!("failed to spawn worker thread: {e}")))?;

        tracing::info!(service = self.session.service_name(), "intent worker started");
        self.thread = Some(thread);
        Ok(())
    }

    /// Take the pending result, if any. Never blocks.
    pub fn poll(&self) -> Option<UtteranceResult> {
        self.mailbox.try_take()
    }

    /// Start the worker on first use, then behave like [`poll`](Self::poll).
    pub fn request(&mut self) -> Result<Option<UtteranceResult>, ServiceError> {
        self.start()?;
        Ok(self.poll())
    }

    pub fn state(&self) -> WorkerState {
        self.status.get()
    }

    /// Read-only view of the state for other threads (e.g. the game loop).
    pub fn status_handle(&self) -> WorkerStatus {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Shut the worker down. Returns the error that stopped it, if any.
    /// A thread that does not exit within the join timeout is detached.
    pub fn stop(&mut self) -> Result<(), ServiceError> {
        self.running.store(false, Ordering::SeqCst);
        self.queue.close();
        self.session.cancel();
        self.mailbox.close();
        self.status.set(WorkerState::Stopped);

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + self.options.join_timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_ms = self.options.join_timeout.as_millis() as u64,
                    "intent worker did not exit in time, detaching"
                );
                return Ok(());
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        match thread.join() {
            Ok(result) => {
                tracing::info!("intent worker stopped");
                result
            }
            Err(_) => Err(ServiceError::Worker("intent worker panicked".to_string())),
        }
    }
}

impl Drop for IntentWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "intent worker ended with an error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null_service::NullService;
    use voxgame_core::SessionIdentity;

    fn worker() -> IntentWorker {
        let identity = SessionIdentity::new("game", Some("test"), "en-US", 16000, 3200);
        let session = RecognitionSession::open(Arc::new(NullService::new()), identity);
        IntentWorker::new(
            session,
            ChunkQueue::new(),
            WorkerOptions {
                join_timeout: Duration::from_secs(2),
                retry_backoff: Duration::from_millis(10),
            },
        )
    }

    #[test]
    fn test_worker_options_from_config() {
        let config = ServiceConfig {
            join_timeout_ms: 250,
            retry_backoff_ms: 40,
            ..Default::default()
        };
        let options = WorkerOptions::from_config(&config);
        assert_eq!(options.join_timeout, Duration::from_millis(250));
        assert_eq!(options.retry_backoff, Duration::from_millis(40));
    }

    #[test]
    fn test_new_worker_is_idle() {
        let worker = worker();
        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(!worker.is_running());
        assert!(worker.poll().is_none());
    }

    #[test]
    fn test_stop_without_start() {
        let mut worker = worker();
        assert!(worker.stop().is_ok());
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_request_starts_lazily() {
        let mut worker = worker();
        assert!(!worker.is_running());
        assert!(worker.request().unwrap().is_none());
        assert!(worker.is_running());
        assert!(worker.stop().is_ok());
        assert!(!worker.is_running());
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_worker_exits_when_queue_closes() {
        let mut worker = worker();
        worker.start().unwrap();
        worker.queue.close();
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.is_running() && Instant::now() < deadline {
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
        assert!(!worker.is_running());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(worker.stop().is_ok());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mut worker = worker();
        worker.start().unwrap();
        worker.start().unwrap();
        assert!(worker.stop().is_ok());
    }
}
