//! # Contingency Latch
//!
//! ```text
//! NORMAL ──(Φ < threshold)──► WARNING
//!    │                           │
//!    └──(quorum / governance)──► SEALED ──(governance reset)──► NORMAL
//! ```
//!
//! Automatic transitions only move up. `WARNING` holds until a governance
//! reset, like `SEALED`.

use serde::{Deserialize, Serialize};
use shared_types::{ContingencyState, UnixMillis};

/// A level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ContingencyState,
    pub to: ContingencyState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContingencyLatch {
    state: ContingencyState,
    reason: Option<String>,
    changed_at: Option<UnixMillis>,
}

impl ContingencyLatch {
    /// Latch resumed from persisted state.
    #[must_use]
    pub fn restore(state: ContingencyState, reason: Option<String>) -> Self {
        Self {
            state,
            reason,
            changed_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ContingencyState {
        self.state
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn changed_at(&self) -> Option<UnixMillis> {
        self.changed_at
    }

    /// Apply the score rule. Only `NORMAL → WARNING` can happen here.
    pub fn observe_phi(&mut self, phi: f64, threshold: f64, now: UnixMillis) -> Option<Transition> {
        if self.state == ContingencyState::Normal && phi < threshold {
            let reason = format!("phi {phi:.3} below {threshold:.2}");
            return self.move_to(ContingencyState::Warning, reason, now);
        }
        None
    }

    /// Hard trigger. Idempotent once sealed.
    pub fn seal(&mut self, reason: impl Into<String>, now: UnixMillis) -> Option<Transition> {
        if self.state == ContingencyState::Sealed {
            return None;
        }
        self.move_to(ContingencyState::Sealed, reason.into(), now)
    }

    /// Governance reset, the only way down.
    pub fn reset(&mut self, reason: impl Into<String>, now: UnixMillis) -> Option<Transition> {
        if self.state == ContingencyState::Normal {
            return None;
        }
        self.move_to(ContingencyState::Normal, reason.into(), now)
    }

    fn move_to(
        &mut self,
        to: ContingencyState,
        reason: String,
        now: UnixMillis,
    ) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        self.reason = Some(reason);
        self.changed_at = Some(now);
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: UnixMillis = UnixMillis::new(1);

    #[test]
    fn test_warning_is_idempotent_and_latched() {
        let mut latch = ContingencyLatch::default();
        assert_eq!(
            latch.observe_phi(0.6, 0.7, T),
            Some(Transition {
                from: ContingencyState::Normal,
                to: ContingencyState::Warning
            })
        );
        assert_eq!(latch.observe_phi(0.5, 0.7, T), None);
        assert_eq!(latch.observe_phi(1.0, 0.7, T), None);
        assert_eq!(latch.state(), ContingencyState::Warning);
    }

    #[test]
    fn test_sealed_ignores_score() {
        let mut latch = ContingencyLatch::default();
        assert!(latch.seal("quorum", T).is_some());
        assert!(latch.seal("again", T).is_none());
        assert_eq!(latch.observe_phi(1.0, 0.7, T), None);
        assert_eq!(latch.state(), ContingencyState::Sealed);
        assert_eq!(latch.reason(), Some("quorum"));
    }

    #[test]
    fn test_reset_returns_to_normal() {
        let mut latch = ContingencyLatch::restore(ContingencyState::Sealed, None);
        let transition = latch.reset("cleared", T).unwrap();
        assert_eq!(transition.from, ContingencyState::Sealed);
        assert_eq!(latch.state(), ContingencyState::Normal);
        assert!(latch.reset("noop", T).is_none());
    }
}
