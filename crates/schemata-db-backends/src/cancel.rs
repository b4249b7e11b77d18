//! Cancellation of in-flight SQLite calls.
//!
//! Each backend call owns a [`CallToken`] shared between the async caller and
//! the blocking worker. The token moves through
//! `Pending -> Running -> Done`, or to `Cancelled` when the caller gives up
//! (timeout or dropped future):
//!
//! - a `Pending` call that is cancelled never touches the connection;
//! - a `Running` call is interrupted through the connection's
//!   [`rusqlite::InterruptHandle`], and its transaction rolls back;
//! - a call that reached `Done` has committed, so the caller collects the
//!   real result instead of reporting a timeout.
//!
//! The commit itself happens while the state lock is held, so a cancel can
//! never land between "commit succeeded" and "state is Done".

use schemata_core::{SchemataError, SchemataResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Queued, waiting for the connection.
    Pending,
    /// Holding the connection and executing statements.
    Running,
    /// Abandoned by the caller.
    Cancelled,
    /// Finished (committed, for write batches).
    Done,
}

/// What a cancel request achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The call will not produce a result.
    Cancelled,
    /// The call had already finished; its result stands.
    AlreadyDone,
}

/// Shared cancellation state for one call.
#[derive(Clone)]
pub struct CallToken {
    state: Arc<Mutex<CallState>>,
    interrupt: Arc<rusqlite::InterruptHandle>,
}

impl std::fmt::Debug for CallToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallToken")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CallToken {
    /// Creates a pending token bound to a connection's interrupt handle.
    pub fn new(interrupt: Arc<rusqlite::InterruptHandle>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CallState::Pending)),
            interrupt,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current state.
    pub fn state(&self) -> CallState {
        *self.lock()
    }

    /// Marks the call as running. Must be called while holding the
    /// connection, so an interrupt can only hit this call's statements.
    ///
    /// # Errors
    ///
    /// Returns [`SchemataError::Cancelled`] if the caller already gave up.
    pub fn start(&self) -> SchemataResult<()> {
        let mut state = self.lock();
        match *state {
            CallState::Pending => {
                *state = CallState::Running;
                Ok(())
            }
            _ => Err(SchemataError::Cancelled),
        }
    }

    /// Checks between statements whether the call was cancelled.
    ///
    /// SQLite clears a pending interrupt when the next statement starts, so
    /// the worker must poll this before every statement of a batch.
    ///
    /// # Errors
    ///
    /// Returns [`SchemataError::Cancelled`] once the call is cancelled.
    pub fn checkpoint(&self) -> SchemataResult<()> {
        match *self.lock() {
            CallState::Cancelled => Err(SchemataError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Runs `commit` unless the call was cancelled, then marks it done.
    ///
    /// # Errors
    ///
    /// Returns [`SchemataError::Cancelled`] if the call was cancelled before
    /// committing, or whatever `commit` returns.
    pub fn finish<T>(&self, commit: impl FnOnce() -> SchemataResult<T>) -> SchemataResult<T> {
        let mut state = self.lock();
        if *state == CallState::Cancelled {
            return Err(SchemataError::Cancelled);
        }
        let out = commit();
        *state = CallState::Done;
        out
    }

    /// Cancels the call, interrupting it if it is running.
    pub fn cancel(&self) -> CancelOutcome {
        let mut state = self.lock();
        match *state {
            CallState::Done => CancelOutcome::AlreadyDone,
            CallState::Cancelled => CancelOutcome::Cancelled,
            CallState::Pending => {
                *state = CallState::Cancelled;
                CancelOutcome::Cancelled
            }
            CallState::Running => {
                *state = CallState::Cancelled;
                self.interrupt.interrupt();
                CancelOutcome::Cancelled
            }
        }
    }

    /// Returns a guard that cancels the call if dropped while armed.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

/// Cancels its call when the owning future is dropped mid-flight.
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CallToken>,
}

impl CancelOnDrop {
    /// Disarms the guard once the caller has an outcome.
    pub fn disarm(&mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if token.cancel() == CancelOutcome::Cancelled {
                tracing::warn!("backend call abandoned by caller; cancelled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> CallToken {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        CallToken::new(Arc::new(conn.get_interrupt_handle()))
    }

    #[test]
    fn test_pending_cancel_prevents_start() {
        let t = token();
        assert_eq!(t.cancel(), CancelOutcome::Cancelled);
        assert!(matches!(t.start(), Err(SchemataError::Cancelled)));
        assert_eq!(t.state(), CallState::Cancelled);
    }

    #[test]
    fn test_running_cancel_fails_checkpoint_and_finish() {
        let t = token();
        t.start().unwrap();
        assert!(t.checkpoint().is_ok());
        assert_eq!(t.cancel(), CancelOutcome::Cancelled);
        assert!(t.checkpoint().is_err());
        let committed = t.finish(|| Ok(1));
        assert!(matches!(committed, Err(SchemataError::Cancelled)));
    }

    #[test]
    fn test_done_cannot_be_cancelled() {
        let t = token();
        t.start().unwrap();
        assert_eq!(t.finish(|| Ok(7)).unwrap(), 7);
        assert_eq!(t.state(), CallState::Done);
        assert_eq!(t.cancel(), CancelOutcome::AlreadyDone);
    }

    #[test]
    fn test_drop_guard_cancels_unless_disarmed() {
        let t = token();
        drop(t.cancel_on_drop());
        assert_eq!(t.state(), CallState::Cancelled);

        let t = token();
        let mut guard = t.cancel_on_drop();
        guard.disarm();
        drop(guard);
        assert_eq!(t.state(), CallState::Pending);
    }
}
