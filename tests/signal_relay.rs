//! Process-wide signal relay, exercised with real signals.
//!
//! Only SIGHUP is raised: it never escalates, so the test process survives.
//! Everything runs in a single test because the relay can only be
//! initialized once per process.

use std::cell::RefCell;
use std::rc::Rc;

use nix::sys::signal::raise;
use usb_moded::event_loop::MainLoop;
use usb_moded::signal::{init_signal_relay, relay_state, termination_count, RelayState, Signal};
use usb_moded::AppError;

#[test]
fn test_raised_signals_reach_main_loop_handler() {
    assert_eq!(relay_state(), RelayState::Uninitialized);

    let mut main_loop = MainLoop::new();
    let received = Rc::new(RefCell::new(Vec::new()));

    let sink = received.clone();
    let watch = init_signal_relay(&mut main_loop, move |signal| sink.borrow_mut().push(signal))
        .expect("relay should initialize");
    assert_eq!(relay_state(), RelayState::Running);
    assert!(main_loop.has_watch(watch));

    // Nothing pending yet
    assert_eq!(main_loop.iterate(Some(0)).unwrap(), 0);

    raise(Signal::SIGHUP).unwrap();
    raise(Signal::SIGHUP).unwrap();

    // One message per wake-up; both are drained in order
    assert_eq!(main_loop.iterate(Some(1000)).unwrap(), 1);
    assert_eq!(main_loop.iterate(Some(1000)).unwrap(), 1);
    assert_eq!(main_loop.iterate(Some(0)).unwrap(), 0);
    assert_eq!(*received.borrow(), vec![Signal::SIGHUP, Signal::SIGHUP]);

    // SIGHUP does not count towards escalation
    assert_eq!(termination_count(), 0);

    // A second relay is refused
    let mut other_loop = MainLoop::new();
    let err = init_signal_relay(&mut other_loop, |_| {}).unwrap_err();
    assert!(matches!(err, AppError::Signal(_)));
    assert_eq!(other_loop.watch_count(), 0);
}
