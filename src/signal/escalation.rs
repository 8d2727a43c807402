//! Repeated termination signal detection
//!
//! A second SIGINT/SIGQUIT/SIGTERM means the first one was never acted
//! upon: the main loop is stuck and the process must die.

use std::sync::atomic::{AtomicU32, Ordering};

use libc::c_int;

/// Termination-class signals seen before the process gives up
pub const ESCALATION_LIMIT: u32 = 2;

/// What the signal handler must do after registering a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Relay the signal
    Proceed,
    /// Abort the process
    Abort,
}

/// Lock-free counter, safe to use from signal context
#[derive(Debug, Default)]
pub struct EscalationCounter {
    count: AtomicU32,
}

impl EscalationCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Whether `signal` asks the process to terminate
    pub fn is_termination(signal: c_int) -> bool {
        matches!(signal, libc::SIGINT | libc::SIGQUIT | libc::SIGTERM)
    }

    /// Count `signal` and decide whether to keep going
    pub fn register(&self, signal: c_int) -> Escalation {
        if !Self::is_termination(signal) {
            return Escalation::Proceed;
        }
        let seen = self.count.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if seen >= ESCALATION_LIMIT {
            Escalation::Abort
        } else {
            Escalation::Proceed
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}
