//! Signal handling and run cancellation (SIGINT/SIGTERM)
//!
//! On the first signal the shared [`SignalState`] is marked cancelled; the
//! reconciler notices at its next checkpoint and aborts without writing.
//! A second signal exits immediately. Nothing is ever half-written either
//! way, since the index is only persisted after reconciliation completes.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for cancelled runs
pub const EXIT_CODE_CANCELLED: i32 = 130;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    /// First signal received (cancellation initiated)
    cancel_requested: AtomicBool,
    /// Signal count (for tracking double-SIGINT)
    signal_count: AtomicU8,
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: cancel at the next checkpoint
    InitiateCancellation,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Get the number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Handle a signal and return the action to take
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.cancel_requested.store(true, Ordering::SeqCst);
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Cheap, cloneable handle used by the reconciler to poll for cancellation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<SignalState>,
}

impl CancelToken {
    /// A token that is never cancelled unless [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation programmatically
    pub fn cancel(&self) {
        self.state.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancel_requested()
    }
}

/// Installs the process-wide Ctrl-C / SIGTERM handler
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    /// Token observing this handler's state
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Arc::clone(&self.state),
        }
    }

    /// Install the signal handlers. Must be called once at program startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || {
            if on_signal(&state) == SignalAction::ImmediateExit {
                std::process::exit(EXIT_CODE_CANCELLED);
            }
        })
    }
}

/// Record one signal and report it; the caller performs any exit
fn on_signal(state: &SignalState) -> SignalAction {
    let action = state.handle_signal();
    match action {
        SignalAction::InitiateCancellation => {
            tracing::warn!("received interrupt, aborting run without writing the index");
        }
        SignalAction::ImmediateExit => {
            eprintln!("\nReceived second interrupt, exiting immediately...");
        }
        SignalAction::Ignore => {
            tracing::debug!(signals = state.signal_count(), "interrupt ignored, exit already pending");
        }
    }
    action
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
