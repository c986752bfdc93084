//! # Scan Session State Machine
//!
//! Tracks one reconciliation pass with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Paginating → BatchDiffing ─┬─→ BatchCommitting → BatchEmitting ─┬─→ Paginating
//!                         ↑         ├─→ Paginating (batch unchanged)     └─→ Done
//!                         │         └─→ Done
//!                         └── (next page)
//!
//! any non-terminal state ──→ Aborted
//! ```
//!
//! A transition that is not in the diagram returns
//! [`SyncError::InvalidStateTransition`]; the engine treats that as a bug and
//! aborts the session.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Phase of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Fetching the next page from the source
    Paginating,
    /// Comparing page items against stored modification times
    BatchDiffing,
    /// Writing changed items in one transaction
    BatchCommitting,
    /// Updating the folder index and notifying the sink
    BatchEmitting,
    /// Source exhausted
    Done,
    /// Stopped by an error or a cancellation request
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Paginating => "paginating",
            SessionState::BatchDiffing => "batch_diffing",
            SessionState::BatchCommitting => "batch_committing",
            SessionState::BatchEmitting => "batch_emitting",
            SessionState::Done => "done",
            SessionState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }

    /// Whether `to` may follow `self`
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        use SessionState::*;

        match (*self, to) {
            (Idle, Paginating) => true,
            (Paginating, BatchDiffing) => true,
            (BatchDiffing, BatchCommitting | Paginating | Done) => true,
            (BatchCommitting, BatchEmitting) => true,
            (BatchEmitting, Paginating | Done) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scan Session
// ============================================================================

/// One reconciliation pass
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: SessionId,
    state: SessionState,
    batch: u64,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Idle,
            batch: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 1-based number of the page being processed, 0 before the first fetch
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Move to `to`
    ///
    /// Entering `BatchDiffing` starts a new batch.
    ///
    /// # Errors
    ///
    /// `SyncError::InvalidStateTransition` if `to` may not follow the current state.
    pub fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("Cannot transition from {} to {}", self.state, to),
            });
        }

        if to == SessionState::BatchDiffing {
            self.batch += 1;
        }
        self.state = to;
        Ok(())
    }

    /// Move to `Aborted` unless the session already ended
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Aborted;
        }
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_batch_cycle() {
        let mut session = ScanSession::new();
        assert_eq!(session.state(), SessionState::Idle);

        session.transition(SessionState::Paginating).unwrap();
        session.transition(SessionState::BatchDiffing).unwrap();
        session.transition(SessionState::BatchCommitting).unwrap();
        session.transition(SessionState::BatchEmitting).unwrap();
        session.transition(SessionState::Paginating).unwrap();
        session.transition(SessionState::BatchDiffing).unwrap();
        session.transition(SessionState::Done).unwrap();

        assert_eq!(session.batch(), 2);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn test_unchanged_batch_skips_commit() {
        let mut session = ScanSession::new();
        session.transition(SessionState::Paginating).unwrap();
        session.transition(SessionState::BatchDiffing).unwrap();
        session.transition(SessionState::Paginating).unwrap();
        assert_eq!(session.state(), SessionState::Paginating);
    }

    #[test]
    fn test_emit_cannot_precede_commit() {
        let mut session = ScanSession::new();
        session.transition(SessionState::Paginating).unwrap();
        session.transition(SessionState::BatchDiffing).unwrap();

        let result = session.transition(SessionState::BatchEmitting);
        assert!(matches!(
            result,
            Err(SyncError::InvalidStateTransition { .. })
        ));
        assert_eq!(session.state(), SessionState::BatchDiffing);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = ScanSession::new();
        session.abort();
        assert_eq!(session.state(), SessionState::Aborted);

        assert!(session.transition(SessionState::Paginating).is_err());
        assert!(session.transition(SessionState::Aborted).is_err());
        assert!(!SessionState::Done.can_transition_to(SessionState::Aborted));
    }

    #[test]
    fn test_abort_from_any_active_state() {
        for state in [
            SessionState::Idle,
            SessionState::Paginating,
            SessionState::BatchDiffing,
            SessionState::BatchCommitting,
            SessionState::BatchEmitting,
        ] {
            assert!(state.can_transition_to(SessionState::Aborted), "{}", state);
        }
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
