use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use voxgame_core::WorkerState;

/// Shared, lock-free view of a worker's [`WorkerState`]. `Stopped` is terminal.
#[derive(Clone, Default)]
pub struct WorkerStatus {
    state: Arc<AtomicU8>,
}

impl WorkerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set(&self, next: WorkerState) {
        let stopped = WorkerState::Stopped.as_u8();
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != stopped).then_some(next.as_u8())
            });
    }
}
