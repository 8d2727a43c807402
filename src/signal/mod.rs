//! Signal delivery into the main loop
//!
//! ```text
//! signal context                     main loop context
//! trap_signal ── write(c_int) ──> pipe ──> dispatch_signal_event ──> handler
//!      └── EscalationCounter (2nd SIGINT/SIGQUIT/SIGTERM => abort)
//! ```

pub mod escalation;
pub mod relay;
pub mod transport;

pub use escalation::{Escalation, EscalationCounter, ESCALATION_LIMIT};
pub use relay::{
    dispatch_signal_event, init_signal_relay, relay_state, termination_count, watch_conditions,
    RelayState, TRAPPED_SIGNALS,
};
pub use transport::{read_message, write_message, SignalPipe, TransportError, MESSAGE_SIZE};

pub use nix::sys::signal::Signal;
