//! Environment lockdown: fullscreen and focus discipline, shortcut
//! suppression, and session termination.

pub mod keys;
pub mod machine;
pub mod state;

pub use keys::{BlockedInput, KeyPolicy};
pub use machine::{Disposition, LockdownMachine, LockdownTimings, Notification};
pub use state::{LockdownPhase, LockdownState};
