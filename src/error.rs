use crate::db::LedgerError;
use crate::models::{CandidateId, Grade};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons a ballot is refused before it reaches the ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BallotError {
    #[error("voter id is empty")]
    EmptyVoterId,
    #[error("no grade given for candidate {0}")]
    MissingCandidate(CandidateId),
    #[error("unknown candidate {0}")]
    UnknownCandidate(CandidateId),
    #[error("grade {grade} for candidate {candidate} is outside {min}..={max}")]
    GradeOutOfRange {
        candidate: CandidateId,
        grade: Grade,
        min: Grade,
        max: Grade,
    },
    #[error("malformed ballot: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid ballot: {0}")]
    InvalidBallot(#[from] BallotError),
    #[error("voter {voter_id} has already voted")]
    DuplicateVote { voter_id: String },
    #[error("voting closed at {closes_at}")]
    SessionClosed { closes_at: DateTime<Utc> },
    #[error("vote ledger unavailable: {0}")]
    LedgerUnavailable(#[from] LedgerError),
}

impl SubmitError {
    /// Whether the caller may retry the same submission later.
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmitError::LedgerUnavailable(_))
    }
}
