//! Lock/hold state machine of the focus signal

use focuskit_core::LockState;
use std::time::Duration;
use tokio::time::Instant;

/// Default time a lost signal is held before unlocking
pub const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(2);

/// A change of lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTransition {
    /// Previous state
    pub from: LockState,
    /// New state
    pub to: LockState,
}

/// Three-state lock machine driven by per-frame validity and a hold timer
///
/// Time is passed in explicitly so the caller decides how the hold deadline
/// is waited on.
#[derive(Debug, Clone)]
pub struct LockTracker {
    state: LockState,
    hold_timeout: Duration,
    deadline: Option<Instant>,
}

impl LockTracker {
    /// Create an unlocked tracker
    pub fn new(hold_timeout: Duration) -> Self {
        Self {
            state: LockState::Unlocked,
            hold_timeout,
            deadline: None,
        }
    }

    /// Current state
    pub fn state(&self) -> LockState {
        self.state
    }

    /// When the hold expires, if a hold is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hold duration
    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    /// Feed the validity of one processed frame
    pub fn observe(&mut self, valid: bool, now: Instant) -> Option<LockTransition> {
        if valid {
            self.deadline = None;
            self.transition(LockState::Locked)
        } else if self.state == LockState::Locked {
            self.deadline = Some(now + self.hold_timeout);
            self.transition(LockState::Hold)
        } else {
            None
        }
    }

    /// Unlock if the hold deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<LockTransition> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.transition(LockState::Unlocked)
            }
            _ => None,
        }
    }

    fn transition(&mut self, to: LockState) -> Option<LockTransition> {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        tracing::debug!(%from, %to, "Lock state changed");
        Some(LockTransition { from, to })
    }
}

impl Default for LockTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_TIMEOUT)
    }
}
