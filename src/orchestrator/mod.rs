//! Application-level orchestration.
//!
//! This module owns the assistant's lifecycle and the command dispatcher.
//! Voice and hotkey sources only send `Command`s; everything they trigger
//! runs here, one command at a time.

mod dispatcher;
mod lifecycle;

pub use dispatcher::{run_dispatcher, Assistant};
pub use lifecycle::Lifecycle;
