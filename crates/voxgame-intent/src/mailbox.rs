use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Returned by [`Mailbox::publish`] once the mailbox has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

impl std::fmt::Display for MailboxClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("mailbox closed")
    }
}

impl std::error::Error for MailboxClosed {}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

/// Single-slot rendezvous between one publisher and one reader.
///
/// `publish` does not return until the reader has taken the value, so the
/// publisher can never run more than one result ahead.
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    drained: Condvar,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
            }),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place `value` in the slot and block until it is taken.
    pub fn publish(&self, value: T) -> Result<(), MailboxClosed> {
        let mut slot = self.lock();
        while slot.value.is_some() && !slot.closed {
            slot = self.drained.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        if slot.closed {
            return Err(MailboxClosed);
        }
        slot.value = Some(value);
        while slot.value.is_some() && !slot.closed {
            slot = self.drained.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        // Still in the slot means the mailbox closed before anyone read it.
        match slot.value.take() {
            Some(_) => Err(MailboxClosed),
            None => Ok(()),
        }
    }

    /// Take the waiting value, if any, and release the publisher.
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.lock();
        if slot.closed {
            return None;
        }
        let value = slot.value.take();
        drop(slot);
        if value.is_some() {
            self.drained.notify_all();
        }
        value
    }

    /// Wake a blocked publisher and refuse further values. An unread value
    /// is discarded.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        drop(slot);
        self.drained.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_empty(&self) -> bool {
        let slot = self.lock();
        slot.closed || slot.value.is_none()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
