use crate::config::SessionConfig;
use crate::error::BallotError;
use crate::models::{CandidateId, Grade};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Checks that `grades` rates every session candidate exactly once, on scale.
/// Returns the grades in canonical order ready to be stored.
pub fn validate_ballot(
    session: &SessionConfig,
    voter_id: &str,
    grades: &HashMap<CandidateId, Grade>,
) -> Result<BTreeMap<CandidateId, Grade>, BallotError> {
    if voter_id.trim().is_empty() {
        return Err(BallotError::EmptyVoterId);
    }

    let sorted: BTreeMap<CandidateId, Grade> =
        grades.iter().map(|(id, grade)| (id.clone(), *grade)).collect();

    if let Some(unknown) = sorted
        .keys()
        .find(|id| !session.candidates.iter().any(|c| &c.id == *id))
    {
        return Err(BallotError::UnknownCandidate(unknown.clone()));
    }

    for candidate in &session.candidates {
        let grade = sorted
            .get(&candidate.id)
            .ok_or_else(|| BallotError::MissingCandidate(candidate.id.clone()))?;

        if !session.scale.contains(*grade) {
            return Err(BallotError::GradeOutOfRange {
                candidate: candidate.id.clone(),
                grade: *grade,
                min: session.scale.min,
                max: session.scale.max,
            });
        }
    }

    Ok(sorted)
}

/// Reads a `{"candidate": grade, ...}` object from an untyped request body.
pub fn parse_grades(value: &Value) -> Result<HashMap<CandidateId, Grade>, BallotError> {
    let object = value
        .as_object()
        .ok_or_else(|| BallotError::Malformed("grades must be an object".to_string()))?;

    object
        .iter()
        .map(|(id, raw)| {
            let grade = raw
                .as_i64()
                .and_then(|g| Grade::try_from(g).ok())
                .ok_or_else(|| {
                    BallotError::Malformed(format!("grade for {id} is not an integer: {raw}"))
                })?;
            Ok((CandidateId::from(id.as_str()), grade))
        })
        .collect()
}
