//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a placement saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,

    /// Steps are being executed.
    Running,

    /// A step failed and reserved stock is being given back.
    Compensating,

    /// Order persisted and cart cleared (terminal).
    Completed,

    /// Compensation finished after a failure (terminal). Releases that could
    /// not be applied are still tracked and retried by the recovery sweep.
    Failed,
}

impl SagaState {
    pub fn can_run(&self) -> bool {
        matches!(self, SagaState::NotStarted)
    }

    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Running)
    }

    /// Interrupted mid-flight; the recovery sweep must roll it forward or back.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, SagaState::Running | SagaState::Compensating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(SagaState::default(), SagaState::NotStarted);
    }

    #[test]
    fn test_can_compensate_only_while_running() {
        assert!(!SagaState::NotStarted.can_compensate());
        assert!(SagaState::Running.can_compensate());
        assert!(!SagaState::Compensating.can_compensate());
        assert!(!SagaState::Completed.can_compensate());
        assert!(!SagaState::Failed.can_compensate());
    }

    #[test]
    fn test_recovery_targets_in_flight_states() {
        assert!(SagaState::Running.needs_recovery());
        assert!(SagaState::Compensating.needs_recovery());
        assert!(!SagaState::Completed.needs_recovery());
        assert!(!SagaState::Failed.needs_recovery());
        assert!(!SagaState::NotStarted.needs_recovery());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SagaState::Running.is_terminal());
        assert!(!SagaState::Compensating.is_terminal());
        assert!(SagaState::Completed.is_terminal());
        assert!(SagaState::Failed.is_terminal());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&SagaState::Compensating).unwrap();
        assert_eq!(json, "\"Compensating\"");
        let back: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SagaState::Compensating);
    }
}
