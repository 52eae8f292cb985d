use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, InterruptHandle};

use dbfs_core::{Error, Result};

/// Cancels the SQLite work of one request from another thread.
///
/// Table handles carrying a token register the interrupt handle of every connection they
/// open. [`CancelToken::cancel`] interrupts the statement currently running on that
/// connection and makes every later step of the request fail with [`Error::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    requested: AtomicBool,
    handle: Mutex<Option<InterruptHandle>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.requested.store(true, Ordering::Release);
        if let Ok(guard) = self.state.handle.lock()
            && let Some(handle) = guard.as_ref()
        {
            handle.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.requested.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn register(&self, conn: &Connection) -> Result<()> {
        if let Ok(mut guard) = self.state.handle.lock() {
            *guard = Some(conn.get_interrupt_handle());
        }
        // A cancel racing with registration may have missed the new handle.
        self.check()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
