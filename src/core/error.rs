//! Error types returned by the engine's boundary operations.
//!
//! Every variant except `Records` is recoverable by the caller and is meant to
//! be translated into a user-facing message; the engine never panics on them.

use thiserror::Error;

use crate::combat::types::{ParticipantId, SessionId};
use crate::records::RecordError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{participant} already has an active session ({existing})")]
    DuplicateSession {
        participant: ParticipantId,
        existing: SessionId,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("target {target} is unavailable: {reason}")]
    TargetUnavailable {
        target: ParticipantId,
        reason: TargetUnavailableReason,
    },

    #[error("rewards for session {0} were already applied")]
    RewardAlreadyApplied(SessionId),

    #[error(transparent)]
    Records(#[from] RecordError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUnavailableReason {
    SelfTarget,
    Shielded { until: i64 },
}

impl std::fmt::Display for TargetUnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetUnavailableReason::SelfTarget => write!(f, "cannot target yourself"),
            TargetUnavailableReason::Shielded { until } => {
                write!(f, "shielded until {}", until)
            }
        }
    }
}

impl EngineError {
    pub fn invalid_action(reason: impl Into<String>) -> Self {
        EngineError::InvalidAction(reason.into())
    }

    /// True for the errors a caller can fix by changing its request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Records(_))
    }
}
