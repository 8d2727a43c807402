//! Signal relay (self-pipe)
//!
//! Two execution domains share one pipe:
//! - signal context: `trap_signal` counts termination signals and writes the
//!   raw signal number to the pipe. Atomics and write(2)/abort(3) only.
//! - main loop context: the read end is a level-triggered watch that decodes
//!   each message and calls the user supplied handler.
//!
//! The relay is a process-wide singleton: initialize once, before any
//! trapped signal can be expected.

use std::os::fd::{AsRawFd, BorrowedFd, IntoRawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use libc::c_int;
use nix::poll::PollFlags;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, error, info, warn};

use super::escalation::{Escalation, EscalationCounter};
use super::transport::{read_message, write_message, SignalPipe};
use crate::error::{AppError, Result};
use crate::event_loop::{MainLoop, WatchAction, WatchId};

/// Signals redirected into the relay
pub const TRAPPED_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGHUP,
];

/// Conditions the read end is armed for
pub fn watch_conditions() -> PollFlags {
    PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL
}

/// Lifecycle of the process-wide relay
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Uninitialized = 0,
    TransportReady = 1,
    SignalsTrapped = 2,
    Running = 3,
}

impl RelayState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::TransportReady,
            2 => Self::SignalsTrapped,
            3 => Self::Running,
            _ => Self::Uninitialized,
        }
    }
}

/// State shared with signal context
struct RelayShared {
    claimed: AtomicBool,
    state: AtomicU8,
    write_fd: AtomicI32,
    escalation: EscalationCounter,
}

impl RelayShared {
    const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            state: AtomicU8::new(RelayState::Uninitialized as u8),
            write_fd: AtomicI32::new(-1),
            escalation: EscalationCounter::new(),
        }
    }

    fn set_state(&self, state: RelayState) {
        self.state.store(state as u8, Ordering::SeqCst);
        debug!(?state, "Signal relay state changed");
    }
}

static RELAY: RelayShared = RelayShared::new();

/// Current state of the process-wide relay
pub fn relay_state() -> RelayState {
    RelayState::from_u8(RELAY.state.load(Ordering::SeqCst))
}

/// Number of termination signals received so far
pub fn termination_count() -> u32 {
    RELAY.escalation.count()
}

extern "C" fn trap_signal(signal: c_int) {
    // The disposition is installed without SA_RESETHAND, so the handler
    // stays armed for the next delivery of the same signal.
    if RELAY.escalation.register(signal) == Escalation::Abort {
        // SAFETY: abort(3) is async-signal-safe.
        unsafe { libc::abort() }
    }

    let fd = RELAY.write_fd.load(Ordering::SeqCst);
    if write_message(fd, signal).is_err() {
        // SAFETY: abort(3) is async-signal-safe.
        unsafe { libc::abort() }
    }
}

/// Loop-side handling of one wake-up on the relay read end
///
/// A short or failed read means the relay is corrupt and the process
/// aborts. Error, hangup or invalid conditions disable the watch for good.
pub fn dispatch_signal_event<F>(
    fd: BorrowedFd<'_>,
    revents: PollFlags,
    handler: &mut F,
) -> WatchAction
where
    F: FnMut(Signal) + ?Sized,
{
    if revents.contains(PollFlags::POLLIN) {
        match read_message(fd) {
            Ok(raw) => match Signal::try_from(raw) {
                Ok(signal) => {
                    debug!(signal = signal.as_str(), "Relaying signal");
                    handler(signal);
                }
                Err(_) => warn!(signal = raw, "Ignoring unknown signal number from relay"),
            },
            Err(e) => {
                error!(critical = true, "Signal relay corrupted: {}", e);
                std::process::abort();
            }
        }
    }

    if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
        error!(
            critical = true,
            ?revents,
            "Signal relay watch failed, signals will no longer be handled"
        );
        return WatchAction::Remove;
    }

    WatchAction::Continue
}

/// Point `signals` at `trap_signal`
///
/// All or nothing: if one installation fails, the dispositions already
/// replaced are put back before the error is returned.
fn install_handlers(signals: &[Signal]) -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(trap_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    let mut previous = Vec::with_capacity(signals.len());
    for &signal in signals {
        // SAFETY: trap_signal only touches atomics and calls write(2)/abort(3).
        match unsafe { sigaction(signal, &action) } {
            Ok(old) => previous.push((signal, old)),
            Err(e) => {
                restore_handlers(&previous);
                return Err(AppError::Signal(format!(
                    "failed to trap {}: {}",
                    signal.as_str(),
                    e
                )));
            }
        }
    }
    Ok(())
}

fn restore_handlers(previous: &[(Signal, SigAction)]) {
    for (signal, old) in previous.iter().rev() {
        // SAFETY: reinstalls a disposition that was active before.
        if let Err(e) = unsafe { sigaction(*signal, old) } {
            warn!("Failed to restore handler for {}: {}", signal.as_str(), e);
        }
    }
}

/// Return the relay to `Uninitialized` so initialization can be retried
fn reset_relay() {
    RELAY.write_fd.store(-1, Ordering::SeqCst);
    RELAY.set_state(RelayState::Uninitialized);
    RELAY.claimed.store(false, Ordering::SeqCst);
}

/// Set up the process-wide signal relay
///
/// Creates the pipe, registers its read end with `main_loop` and traps
/// SIGINT, SIGQUIT, SIGTERM and SIGHUP. `handler` runs on the main loop,
/// once per delivered signal.
///
/// Fails if the relay was already initialized, the pipe cannot be created
/// or a handler cannot be installed; the caller decides whether to carry on
/// without it. On failure no disposition is left pointing at the relay and
/// initialization may be retried.
pub fn init_signal_relay<F>(main_loop: &mut MainLoop, handler: F) -> Result<WatchId>
where
    F: FnMut(Signal) + 'static,
{
    init_relay_for(&TRAPPED_SIGNALS, main_loop, handler)
}

fn init_relay_for<F>(signals: &[Signal], main_loop: &mut MainLoop, handler: F) -> Result<WatchId>
where
    F: FnMut(Signal) + 'static,
{
    if RELAY
        .claimed
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(AppError::Signal("already initialized".to_string()));
    }

    let pipe = match SignalPipe::new() {
        Ok(pipe) => pipe,
        Err(e) => {
            error!("Failed to create signal pipe: {}", e);
            reset_relay();
            return Err(e);
        }
    };
    let (read, write) = pipe.into_parts();

    RELAY.write_fd.store(write.as_raw_fd(), Ordering::SeqCst);
    RELAY.set_state(RelayState::TransportReady);

    let mut handler = handler;
    let watch = main_loop.add_watch(read, watch_conditions(), move |fd, revents| {
        dispatch_signal_event(fd, revents, &mut handler)
    });

    if let Err(e) = install_handlers(signals) {
        error!("Failed to install signal handlers: {}", e);
        // No handler points at the pipe any more, both ends can go
        reset_relay();
        main_loop.remove_watch(watch);
        drop(write);
        return Err(e);
    }
    RELAY.set_state(RelayState::SignalsTrapped);

    // The write end lives for the rest of the process
    let _ = write.into_raw_fd();

    RELAY.set_state(RelayState::Running);
    info!("Signal relay running");
    Ok(watch)
}
