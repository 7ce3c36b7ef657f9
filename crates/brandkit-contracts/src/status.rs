use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse progress of a campaign run as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Idle,
    Analyzing,
    Generating,
    Completed,
    Error,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Analyzing => "analyzing",
            PipelineStatus::Generating => "generating",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Error)
    }

    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        match (self, next) {
            (current, Error) => current != Error,
            (Idle, Analyzing) | (Analyzing, Generating) | (Generating, Completed) => true,
            (Completed, Idle) | (Error, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StatusTracker {
    current: PipelineStatus,
    error: Option<String>,
    history: Vec<PipelineStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            current: PipelineStatus::Idle,
            error: None,
            history: vec![PipelineStatus::Idle],
        }
    }

    pub fn current(&self) -> PipelineStatus {
        self.current
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn history(&self) -> &[PipelineStatus] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineStatus) -> Result<PipelineStatus, String> {
        if next == PipelineStatus::Error {
            return Err("Use fail() to enter the error state.".to_string());
        }
        if !self.current.can_transition_to(next) {
            return Err(format!(
                "Illegal status transition {} -> {}.",
                self.current, next
            ));
        }
        let previous = self.current;
        if next == PipelineStatus::Idle {
            self.error = None;
        }
        self.current = next;
        self.history.push(next);
        Ok(previous)
    }

    /// Enters `error` from wherever the run is. A second failure only
    /// replaces the message.
    pub fn fail(&mut self, message: impl Into<String>) -> PipelineStatus {
        let previous = self.current;
        self.error = Some(message.into());
        if self.current != PipelineStatus::Error {
            self.current = PipelineStatus::Error;
            self.history.push(PipelineStatus::Error);
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineStatus, StatusTracker};

    #[test]
    fn happy_path_walks_forward_only() {
        let mut tracker = StatusTracker::new();
        assert_eq!(tracker.current(), PipelineStatus::Idle);
        tracker.advance(PipelineStatus::Analyzing).unwrap();
        tracker.advance(PipelineStatus::Generating).unwrap();
        tracker.advance(PipelineStatus::Completed).unwrap();
        assert_eq!(
            tracker.history(),
            &[
                PipelineStatus::Idle,
                PipelineStatus::Analyzing,
                PipelineStatus::Generating,
                PipelineStatus::Completed,
            ]
        );
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn skipping_or_reversing_states_is_rejected() {
        let mut tracker = StatusTracker::new();
        assert!(tracker.advance(PipelineStatus::Generating).is_err());
        assert!(tracker.advance(PipelineStatus::Completed).is_err());
        tracker.advance(PipelineStatus::Analyzing).unwrap();
        assert!(tracker.advance(PipelineStatus::Idle).is_err());
        assert!(tracker.advance(PipelineStatus::Analyzing).is_err());
        assert_eq!(tracker.current(), PipelineStatus::Analyzing);
    }

    #[test]
    fn error_is_reachable_from_every_state() {
        for target in [
            PipelineStatus::Idle,
            PipelineStatus::Analyzing,
            PipelineStatus::Generating,
            PipelineStatus::Completed,
        ] {
            assert!(target.can_transition_to(PipelineStatus::Error));
        }
        assert!(!PipelineStatus::Error.can_transition_to(PipelineStatus::Error));

        let mut tracker = StatusTracker::new();
        tracker.advance(PipelineStatus::Analyzing).unwrap();
        assert_eq!(tracker.fail("upload unreadable"), PipelineStatus::Analyzing);
        tracker.fail("second failure");
        assert_eq!(tracker.current(), PipelineStatus::Error);
        assert_eq!(tracker.error(), Some("second failure"));
        assert_eq!(
            tracker
                .history()
                .iter()
                .filter(|status| **status == PipelineStatus::Error)
                .count(),
            1
        );
    }

    #[test]
    fn reset_from_terminal_state_clears_error() {
        let mut tracker = StatusTracker::new();
        tracker.fail("boom");
        assert!(tracker.advance(PipelineStatus::Error).is_err());
        tracker.advance(PipelineStatus::Idle).unwrap();
        assert_eq!(tracker.current(), PipelineStatus::Idle);
        assert!(tracker.error().is_none());
    }
}
