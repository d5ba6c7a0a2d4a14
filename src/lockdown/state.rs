//! Lockdown phase and the state the UI renders from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockdownPhase {
    #[default]
    Inactive,
    Active,
    ViolationShown,
    /// Terminal
    Terminated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LockdownState {
    pub phase: LockdownPhase,
    pub is_fullscreen: bool,
    /// Shared strike count, mirrored from the ledger
    pub violation_count: u32,
    pub show_violation_overlay: bool,
    pub violation_message: String,
    pub terminated: bool,
}

impl LockdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn show_violation(&mut self, message: &str) {
        self.phase = LockdownPhase::ViolationShown;
        self.show_violation_overlay = true;
        self.violation_message = message.to_string();
    }

    pub(crate) fn clear_violation(&mut self) {
        self.phase = LockdownPhase::Active;
        self.show_violation_overlay = false;
        self.violation_message.clear();
    }

    pub(crate) fn lock(&mut self, message: &str) {
        self.phase = LockdownPhase::Terminated;
        self.terminated = true;
        self.show_violation_overlay = true;
        self.violation_message = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_transitions() {
        let mut state = LockdownState::new();
        state.phase = LockdownPhase::Active;
        state.show_violation("Tab switch detected");
        assert_eq!(state.phase, LockdownPhase::ViolationShown);
        assert!(state.show_violation_overlay);

        state.clear_violation();
        assert_eq!(state.phase, LockdownPhase::Active);
        assert!(!state.show_violation_overlay);
        assert!(state.violation_message.is_empty());
    }

    #[test]
    fn test_lock_is_terminal_flagged() {
        let mut state = LockdownState::new();
        state.lock("Session locked");
        assert!(state.terminated);
        assert_eq!(state.phase, LockdownPhase::Terminated);
    }
}
