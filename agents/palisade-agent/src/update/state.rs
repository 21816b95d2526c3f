//! Update State Machine
//!
//! Tracks the phase of an update attempt and validates every transition, so
//! an illegal jump (e.g. applying a payload that was never verified) is a
//! programming error surfaced in logs rather than silent corruption.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Phases of the update pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No attempt in progress
    Idle,
    /// Querying the control plane for an available build
    Checking,
    /// Remote version is not newer; attempt over
    NoUpdate,
    /// The check itself failed; attempt over
    CheckFailed,
    /// A newer build was advertised
    UpdateAvailable,
    /// Streaming the payload to a staging location
    Downloading,
    DownloadFailed,
    Downloaded,
    /// Validating byte count and SHA-256 against the descriptor
    Verifying,
    VerifyFailed,
    Verified,
    /// Backup current executable, then replace it
    Applying,
    ApplyFailed,
    Applied,
    /// Post-apply self test
    HealthChecking,
    HealthCheckFailed,
    HealthCheckPassed,
    /// Restoring the backup over the current executable
    RollingBack,
    RollbackFailed,
    RollbackSucceeded,
    /// Spawning the new process image
    Restarting,
}

impl UpdatePhase {
    /// Whether this phase ends the current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdatePhase::NoUpdate
                | UpdatePhase::CheckFailed
                | UpdatePhase::DownloadFailed
                | UpdatePhase::VerifyFailed
                | UpdatePhase::ApplyFailed
                | UpdatePhase::RollbackFailed
                | UpdatePhase::RollbackSucceeded
                | UpdatePhase::Restarting
        )
    }
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "Idle",
            UpdatePhase::Checking => "Checking",
            UpdatePhase::NoUpdate => "NoUpdate",
            UpdatePhase::CheckFailed => "CheckFailed",
            UpdatePhase::UpdateAvailable => "UpdateAvailable",
            UpdatePhase::Downloading => "Downloading",
            UpdatePhase::DownloadFailed => "DownloadFailed",
            UpdatePhase::Downloaded => "Downloaded",
            UpdatePhase::Verifying => "Verifying",
            UpdatePhase::VerifyFailed => "VerifyFailed",
            UpdatePhase::Verified => "Verified",
            UpdatePhase::Applying => "Applying",
            UpdatePhase::ApplyFailed => "ApplyFailed",
            UpdatePhase::Applied => "Applied",
            UpdatePhase::HealthChecking => "HealthChecking",
            UpdatePhase::HealthCheckFailed => "HealthCheckFailed",
            UpdatePhase::HealthCheckPassed => "HealthCheckPassed",
            UpdatePhase::RollingBack => "RollingBack",
            UpdatePhase::RollbackFailed => "RollbackFailed",
            UpdatePhase::RollbackSucceeded => "RollbackSucceeded",
            UpdatePhase::Restarting => "Restarting",
        };
        write!(f, "{}", name)
    }
}

/// One recorded phase transition
#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub from: UpdatePhase,
    pub to: UpdatePhase,
    pub timestamp: DateTime<Utc>,
}

struct StateInner {
    current: UpdatePhase,
    transitions: Vec<PhaseTransition>,
}

/// Thread-safe tracker for the update pipeline phase
#[derive(Clone)]
pub struct UpdateStateMachine {
    inner: Arc<RwLock<StateInner>>,
}

impl UpdateStateMachine {
    /// Create a new state machine starting in Idle
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StateInner {
                current: UpdatePhase::Idle,
                transitions: Vec::new(),
            })),
        }
    }

    /// Get the current phase
    pub fn current(&self) -> UpdatePhase {
        self.inner.read().current
    }

    /// Transition to a new phase; returns false and logs if invalid
    pub fn transition_to(&self, to: UpdatePhase) -> bool {
        let mut inner = self.inner.write();

        if !Self::is_valid_transition(inner.current, to) {
            tracing::warn!(
                from = %inner.current,
                to = %to,
                "Invalid update phase transition ignored"
            );
            return false;
        }

        let from = inner.current;
        inner.current = to;
        inner.transitions.push(PhaseTransition {
            from,
            to,
            timestamp: Utc::now(),
        });

        // Keep only the last 100 transitions
        if inner.transitions.len() > 100 {
            inner.transitions.remove(0);
        }

        tracing::debug!(from = %from, to = %to, "Update phase transition");
        true
    }

    fn is_valid_transition(from: UpdatePhase, to: UpdatePhase) -> bool {
        use UpdatePhase::*;

        // A new attempt may start from Idle or any terminal phase
        if to == Checking {
            return from == Idle || from.is_terminal();
        }

        matches!(
            (from, to),
            (Checking, NoUpdate)
                | (Checking, CheckFailed)
                | (Checking, UpdateAvailable)
                | (UpdateAvailable, Downloading)
                | (Downloading, DownloadFailed)
                | (Downloading, Downloaded)
                | (Downloaded, Verifying)
                | (Verifying, VerifyFailed)
                | (Verifying, Verified)
                | (Verified, Applying)
                | (Applying, ApplyFailed)
                | (Applying, Applied)
                | (Applied, HealthChecking)
                | (HealthChecking, HealthCheckFailed)
                | (HealthChecking, HealthCheckPassed)
                | (HealthCheckFailed, RollingBack)
                | (RollingBack, RollbackFailed)
                | (RollingBack, RollbackSucceeded)
                | (HealthCheckPassed, Restarting)
        )
    }

    /// Get recent transitions, newest first
    pub fn recent_transitions(&self, count: usize) -> Vec<PhaseTransition> {
        let inner = self.inner.read();
        inner.transitions.iter().rev().take(count).cloned().collect()
    }
}

impl Default for UpdateStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UpdatePhase::*;

    #[test]
    fn test_initial_phase_is_idle() {
        let machine = UpdateStateMachine::new();
        assert_eq!(machine.current(), Idle);
    }

    #[test]
    fn test_happy_path_to_restart() {
        let machine = UpdateStateMachine::new();
        for phase in [
            Checking,
            UpdateAvailable,
            Downloading,
            Downloaded,
            Verifying,
            Verified,
            Applying,
            Applied,
            HealthChecking,
            HealthCheckPassed,
            Restarting,
        ] {
            assert!(machine.transition_to(phase), "rejected {}", phase);
        }
        assert_eq!(machine.current(), Restarting);
    }

    #[test]
    fn test_rollback_path() {
        let machine = UpdateStateMachine::new();
        for phase in [
            Checking,
            UpdateAvailable,
            Downloading,
            Downloaded,
            Verifying,
            Verified,
            Applying,
            Applied,
            HealthChecking,
            HealthCheckFailed,
            RollingBack,
            RollbackSucceeded,
        ] {
            assert!(machine.transition_to(phase), "rejected {}", phase);
        }
        assert!(machine.current().is_terminal());
    }

    #[test]
    fn test_invalid_jump_rejected() {
        let machine = UpdateStateMachine::new();
        assert!(!machine.transition_to(Applying));
        assert_eq!(machine.current(), Idle);

        machine.transition_to(Checking);
        assert!(!machine.transition_to(Downloaded));
        assert_eq!(machine.current(), Checking);
    }

    #[test]
    fn test_new_attempt_after_terminal_phase() {
        let machine = UpdateStateMachine::new();
        machine.transition_to(Checking);
        machine.transition_to(NoUpdate);
        assert!(machine.transition_to(Checking));
    }

    #[test]
    fn test_transitions_recorded() {
        let machine = UpdateStateMachine::new();
        machine.transition_to(Checking);
        machine.transition_to(NoUpdate);

        let recent = machine.recent_transitions(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].to, NoUpdate);
        assert_eq!(recent[1].from, Idle);
    }
}
