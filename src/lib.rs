//! usb-moded - USB gadget mode daemon core
//!
//! This crate provides the mode catalog (discovery, parsing and validation
//! of mode description files) and the signal relay that feeds OS signals
//! into the daemon's single-threaded main loop.

pub mod config;
pub mod error;
pub mod event_loop;
pub mod modes;
pub mod signal;

pub use error::{AppError, Result};
