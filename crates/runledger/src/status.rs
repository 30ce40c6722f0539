//! Run and segment status model.
//!
//! Segments move `PENDING -> RUNNING -> {DONE | FAILED}` or
//! `PENDING -> SKIPPED`. A FAILED segment re-enters RUNNING only through an
//! approved retry. Run status is never stored independently of its segments:
//! it is re-derived with [`RunStatus::derive`] whenever a segment changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status string that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} status '{value}'")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of work a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentType {
    /// Document-level header metadata.
    Header,
    /// A chunk of list rows.
    ListChunk,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Header => "HEADER",
            SegmentType::ListChunk => "LIST_CHUNK",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEADER" => Ok(SegmentType::Header),
            "LIST_CHUNK" => Ok(SegmentType::ListChunk),
            other => Err(StatusParseError {
                kind: "segment type",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a single extraction segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl SegmentStatus {
    pub const ALL: [SegmentStatus; 5] = [
        SegmentStatus::Pending,
        SegmentStatus::Running,
        SegmentStatus::Done,
        SegmentStatus::Failed,
        SegmentStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "PENDING",
            SegmentStatus::Running => "RUNNING",
            SegmentStatus::Done => "DONE",
            SegmentStatus::Failed => "FAILED",
            SegmentStatus::Skipped => "SKIPPED",
        }
    }

    /// Human-readable badge label.
    pub fn label(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "Pending",
            SegmentStatus::Running => "Running",
            SegmentStatus::Done => "Done",
            SegmentStatus::Failed => "Failed",
            SegmentStatus::Skipped => "Skipped",
        }
    }

    /// Terminal for the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentStatus::Done | SegmentStatus::Failed | SegmentStatus::Skipped
        )
    }

    /// Still waiting for or undergoing extraction.
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is an edge of the segment state machine.
    ///
    /// `FAILED -> RUNNING` is listed here but must additionally be approved
    /// by the retry policy; the ledger only takes that edge on retry.
    pub fn can_transition_to(&self, next: SegmentStatus) -> bool {
        use SegmentStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Running, Done)
                | (Running, Failed)
                | (Failed, Running)
        )
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusParseError {
                kind: "segment",
                value: s.to_string(),
            })
    }
}

/// Status of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Failed,
        RunStatus::Partial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Partial => "PARTIAL",
        }
    }

    /// Human-readable badge label.
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::Partial => "Partial",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Partial
        )
    }

    /// PENDING or RUNNING; views containing such runs keep polling.
    pub fn is_non_terminal(&self) -> bool {
        !self.is_terminal()
    }

    /// Derives the run status from its segments.
    ///
    /// `fatal` marks a run-level failure that happened before any segment
    /// executed and always wins. `started` is whether the run ever left
    /// PENDING.
    pub fn derive(segments: &[SegmentStatus], fatal: bool, started: bool) -> RunStatus {
        if fatal {
            return RunStatus::Failed;
        }
        if segments.is_empty() {
            return RunStatus::Pending;
        }

        let mut done = 0usize;
        let mut failed = 0usize;
        let mut pending = 0usize;
        let mut running = 0usize;
        for status in segments {
            match status {
                SegmentStatus::Pending => pending += 1,
                SegmentStatus::Running => running += 1,
                SegmentStatus::Done => done += 1,
                SegmentStatus::Failed => failed += 1,
                SegmentStatus::Skipped => {}
            }
        }

        if pending + running > 0 {
            if running == 0 && !started && pending == segments.len() {
                return RunStatus::Pending;
            }
            return RunStatus::Running;
        }

        match (done, failed) {
            (_, 0) => RunStatus::Completed,
            (0, _) => RunStatus::Failed,
            _ => RunStatus::Partial,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusParseError {
                kind: "run",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SegmentStatus::*;

    #[test]
    fn test_segment_transitions() {
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Done));
        assert!(Running.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Running));

        assert!(!Pending.can_transition_to(Done));
        assert!(!Running.can_transition_to(Skipped));
        assert!(!Done.can_transition_to(Running));
        assert!(!Skipped.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Done));
    }

    #[test]
    fn test_terminal_sets() {
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Skipped.is_terminal());
        assert!(Pending.is_in_flight());
        assert!(Running.is_in_flight());

        assert!(RunStatus::Pending.is_non_terminal());
        assert!(RunStatus::Running.is_non_terminal());
        assert!(RunStatus::Partial.is_terminal());
    }

    #[test]
    fn test_derive_pending_until_started() {
        assert_eq!(
            RunStatus::derive(&[Pending, Pending], false, false),
            RunStatus::Pending
        );
        assert_eq!(
            RunStatus::derive(&[Pending, Pending], false, true),
            RunStatus::Running
        );
    }

    #[test]
    fn test_derive_running_while_any_in_flight() {
        assert_eq!(
            RunStatus::derive(&[Done, Running, Failed], false, true),
            RunStatus::Running
        );
        assert_eq!(
            RunStatus::derive(&[Done, Pending], false, true),
            RunStatus::Running
        );
    }

    #[test]
    fn test_derive_completed() {
        assert_eq!(
            RunStatus::derive(&[Done, Done, Done, Done], false, true),
            RunStatus::Completed
        );
        assert_eq!(
            RunStatus::derive(&[Done, Skipped], false, true),
            RunStatus::Completed
        );
    }

    #[test]
    fn test_derive_partial_mix() {
        assert_eq!(
            RunStatus::derive(&[Done, Done, Failed], false, true),
            RunStatus::Partial
        );
        assert_eq!(
            RunStatus::derive(&[Done, Failed, Skipped], false, true),
            RunStatus::Partial
        );
    }

    #[test]
    fn test_derive_failed() {
        assert_eq!(
            RunStatus::derive(&[Failed, Failed], false, true),
            RunStatus::Failed
        );
        assert_eq!(
            RunStatus::derive(&[Failed, Skipped, Skipped], false, true),
            RunStatus::Failed
        );
        assert_eq!(
            RunStatus::derive(&[Skipped, Skipped], true, false),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_parse_round_trip_and_unknown() {
        for status in SegmentStatus::ALL {
            assert_eq!(status.as_str().parse::<SegmentStatus>(), Ok(status));
        }
        for status in RunStatus::ALL {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
        }

        let err = "ARCHIVED".parse::<RunStatus>().unwrap_err();
        assert_eq!(err.value, "ARCHIVED");
        assert!(err.to_string().contains("Unknown run status"));
        assert!("done".parse::<SegmentStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&SegmentType::ListChunk).unwrap(), "\"LIST_CHUNK\"");
        let status: SegmentStatus = serde_json::from_str("\"SKIPPED\"").unwrap();
        assert_eq!(status, Skipped);
        assert!(serde_json::from_str::<RunStatus>("\"UNKNOWN\"").is_err());
    }
}
