use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use voxgame_core::{AudioChunk, AudioError};

/// Epoch carried by the sentinel `close()` injects; it ends every sequence.
const CLOSED_EPOCH: u64 = u64::MAX;

enum QueueItem {
    Audio(AudioChunk),
    /// End of stream for every `Chunks` created at or before this epoch.
    End(u64),
}

struct Shared {
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Mutex<mpsc::UnboundedReceiver<QueueItem>>,
    active: AtomicBool,
    closed: AtomicBool,
    epoch: AtomicU64,
    failure: Mutex<Option<AudioError>>,
}

impl Shared {
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.active.store(false, Ordering::SeqCst);
        let _ = self.tx.send(QueueItem::End(CLOSED_EPOCH));
        true
    }
}

// ── ChunkQueue ────────────────────────────────────────────────

/// Thread-safe queue of captured PCM chunks, consumed as restartable
/// [`Chunks`] sequences. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ChunkQueue {
    shared: Arc<Shared>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                tx,
                rx: Mutex::new(rx),
                active: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Push half for the capture callback.
    pub fn producer(&self) -> ChunkProducer {
        ChunkProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start a new lazy sequence. A sequence started while the queue is
    /// paused or closed is already exhausted.
    pub fn chunks(&self) -> Chunks {
        let done = !self.is_active() || self.is_closed();
        Chunks {
            queue: self.clone(),
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            done,
        }
    }

    /// End every running sequence at its next step, keeping buffered audio.
    /// Injects one sentinel per active → inactive transition.
    pub fn pause(&self) {
        if self.shared.active.swap(false, Ordering::SeqCst) {
            let epoch = self.shared.epoch.load(Ordering::SeqCst);
            let _ = self.shared.tx.send(QueueItem::End(epoch));
        }
    }

    /// Re-arm the queue so the next `chunks()` call streams again.
    pub fn resume(&self) {
        if self.is_closed() {
            return;
        }
        if !self.shared.active.swap(true, Ordering::SeqCst) {
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Terminal: ends current and future sequences.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// The capture error that closed the queue, if any.
    pub fn failure(&self) -> Option<AudioError> {
        self.shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── ChunkProducer ─────────────────────────────────────────────

/// `push` never blocks; safe to call from a platform audio thread.
#[derive(Clone)]
pub struct ChunkProducer {
    shared: Arc<Shared>,
}

impl ChunkProducer {
    /// Returns `false`, dropping the chunk, once the queue is closed.
    pub fn push(&self, chunk: AudioChunk) -> bool {
        if self.shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.shared.tx.send(QueueItem::Audio(chunk)).is_ok()
    }

    /// Record a capture error and close the queue. Running sequences end
    /// after the audio already buffered; the first error is kept.
    pub fn fail(&self, error: AudioError) {
        {
            let mut failure = self
                .shared
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() && !self.shared.closed.load(Ordering::SeqCst) {
                *failure = Some(error);
            }
        }
        self.shared.close();
    }
}

// ── Chunks ────────────────────────────────────────────────────

/// Blocking iterator over coalesced audio. Each step waits for at least one
/// chunk, then drains everything already buffered into a single buffer.
///
/// Must not be driven from inside an async runtime; use a blocking thread.
pub struct Chunks {
    queue: ChunkQueue,
    epoch: u64,
    done: bool,
}

impl Chunks {
    /// The queue this sequence reads from.
    pub fn queue(&self) -> &ChunkQueue {
        &self.queue
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Non-blocking step: `None` when nothing is buffered or the sequence ended.
    pub fn try_next(&mut self) -> Option<AudioChunk> {
        self.step(false)
    }

    fn ends_here(&self, epoch: u64) -> bool {
        epoch >= self.epoch
    }

    fn step(&mut self, blocking: bool) -> Option<AudioChunk> {
        if self.done {
            return None;
        }
        let shared = Arc::clone(&self.queue.shared);
        let mut rx = shared.rx.lock().unwrap_or_else(PoisonError::into_inner);

        let mut data = loop {
            let item = if blocking {
                rx.blocking_recv()
            } else {
                match rx.try_recv() {
                    Ok(item) => Some(item),
                    Err(mpsc::error::TryRecvError::Empty) => return None,
                    Err(mpsc::error::TryRecvError::Disconnected) => None,
                }
            };
            match item {
                Some(QueueItem::Audio(chunk)) => break chunk,
                Some(QueueItem::End(epoch)) if self.ends_here(epoch) => {
                    self.done = true;
                    return None;
                }
                // stale sentinel from an earlier pause
                Some(QueueItem::End(_)) => continue,
                None => {
                    self.done = true;
                    return None;
                }
            }
        };

        while let Ok(item) = rx.try_recv() {
            match item {
                QueueItem::Audio(chunk) => data.extend_from_slice(&chunk),
                QueueItem::End(epoch) if self.ends_here(epoch) => {
                    self.done = true;
                    break;
                }
                QueueItem::End(_) => {}
            }
        }

        Some(data)
    }
}

impl Iterator for Chunks {
    type Item = AudioChunk;

    fn next(&mut self) -> Option<AudioChunk> {
        self.step(true)
    }
}
