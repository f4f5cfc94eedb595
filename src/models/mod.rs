use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single rating on the session's grade scale.
pub type Grade = i32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CandidateId::new(id),
            name: name.into(),
        }
    }
}

/// Inclusive grade range, fixed before voting opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeScale {
    pub min: Grade,
    pub max: Grade,
}

impl GradeScale {
    pub fn contains(&self, grade: Grade) -> bool {
        (self.min..=self.max).contains(&grade)
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self { min: 0, max: 5 }
    }
}

/// One voter's committed rating of every candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub ballot_id: Uuid,
    pub voter_id: String,
    pub grades: BTreeMap<CandidateId, Grade>,
    pub submitted_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(voter_id: String, grades: BTreeMap<CandidateId, Grade>) -> Self {
        Self {
            ballot_id: Uuid::new_v4(),
            voter_id,
            grades,
            submitted_at: Utc::now(),
        }
    }
}

/// One row of the ranked results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: CandidateId,
    pub name: String,
    /// `None` when the candidate has no grades yet.
    pub median: Option<Grade>,
    pub rank: usize,
    pub ballots: usize,
    pub grade_counts: BTreeMap<Grade, usize>,
}
