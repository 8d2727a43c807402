//! Single-threaded poll(2) main loop
//!
//! Watches are level-triggered: a descriptor that stays readable is reported
//! again on every iteration until drained. Error, hangup and invalid
//! conditions are always reported, whatever the watch asked for.

use std::cell::Cell;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::rc::Rc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, trace, warn};

use crate::error::{AppError, Result};

/// Identifier of a registered watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

/// What to do with a watch after its callback ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Continue,
    Remove,
}

type WatchCallback = Box<dyn FnMut(BorrowedFd<'_>, PollFlags) -> WatchAction>;

struct Watch {
    id: WatchId,
    fd: OwnedFd,
    conditions: PollFlags,
    callback: WatchCallback,
}

/// Handle used to stop a running loop from inside a callback
#[derive(Debug, Clone)]
pub struct QuitHandle(Rc<Cell<bool>>);

impl QuitHandle {
    pub fn quit(&self) {
        self.0.set(true);
    }

    pub fn is_quit(&self) -> bool {
        self.0.get()
    }
}

/// Main loop owning the descriptors it watches
pub struct MainLoop {
    watches: Vec<Watch>,
    next_id: u64,
    quit: Rc<Cell<bool>>,
}

impl MainLoop {
    pub fn new() -> Self {
        Self {
            watches: Vec::new(),
            next_id: 1,
            quit: Rc::new(Cell::new(false)),
        }
    }

    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle(self.quit.clone())
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn has_watch(&self, id: WatchId) -> bool {
        self.watches.iter().any(|w| w.id == id)
    }

    /// Watch `fd` for `conditions`; the loop takes ownership of the descriptor
    pub fn add_watch<F>(&mut self, fd: OwnedFd, conditions: PollFlags, callback: F) -> WatchId
    where
        F: FnMut(BorrowedFd<'_>, PollFlags) -> WatchAction + 'static,
    {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.watches.push(Watch {
            id,
            fd,
            conditions,
            callback: Box::new(callback),
        });
        debug!(watch = id.0, ?conditions, "Watch added");
        id
    }

    /// Stop watching and close the descriptor
    pub fn remove_watch(&mut self, id: WatchId) -> bool {
        let before = self.watches.len();
        self.watches.retain(|w| w.id != id);
        let removed = self.watches.len() != before;
        if removed {
            debug!(watch = id.0, "Watch removed");
        }
        removed
    }

    /// Poll once and dispatch ready watches
    ///
    /// `timeout_ms` of `None` blocks until something is ready. Returns the
    /// number of callbacks invoked; an interrupted poll dispatches nothing.
    pub fn iterate(&mut self, timeout_ms: Option<u16>) -> Result<usize> {
        if self.watches.is_empty() {
            return Ok(0);
        }

        let timeout = timeout_ms.map_or(PollTimeout::NONE, PollTimeout::from);
        let revents: Vec<PollFlags> = {
            let mut fds: Vec<PollFd<'_>> = self
                .watches
                .iter()
                .map(|w| PollFd::new(w.fd.as_fd(), w.conditions))
                .collect();

            match poll(&mut fds, timeout) {
                Ok(0) => return Ok(0),
                Ok(_) => {}
                Err(Errno::EINTR) => {
                    trace!("poll interrupted");
                    return Ok(0);
                }
                Err(e) => return Err(AppError::EventLoop(format!("poll failed: {}", e))),
            }

            fds.iter()
                .map(|p| p.revents().unwrap_or(PollFlags::empty()))
                .collect()
        };

        let mut dispatched = 0;
        let mut finished = Vec::new();
        for (watch, revents) in self.watches.iter_mut().zip(revents) {
            if revents.is_empty() {
                continue;
            }
            dispatched += 1;
            if (watch.callback)(watch.fd.as_fd(), revents) == WatchAction::Remove {
                finished.push(watch.id);
            }
        }

        for id in finished {
            self.remove_watch(id);
        }

        Ok(dispatched)
    }

    /// Run until quit is requested or nothing is left to watch
    pub fn run(&mut self) -> Result<()> {
        self.quit.set(false);
        while !self.quit.get() {
            if self.watches.is_empty() {
                warn!("Main loop has no watches left, stopping");
                break;
            }
            self.iterate(None)?;
        }
        Ok(())
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}
