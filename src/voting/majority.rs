//! Majority judgment ranking.
//!
//! Candidates are ordered by the lower median of their grades. Equal medians
//! are broken by repeatedly dropping one median grade from each tally and
//! comparing the new medians. Candidates whose grades run out without a
//! difference share a rank and are listed by ascending id.

use crate::models::{Ballot, Candidate, CandidateId, CandidateResult, Grade};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

struct Tally<'a> {
    candidate: &'a Candidate,
    /// Sorted ascending.
    grades: Vec<Grade>,
    /// Medians in tie-break removal order; compared lexicographically.
    merit: Vec<Grade>,
}

pub fn calculate_results(candidates: &[Candidate], ballots: &[Ballot]) -> Vec<CandidateResult> {
    debug!(
        "Aggregating {} ballot(s) over {} candidate(s)",
        ballots.len(),
        candidates.len()
    );

    let mut tallies = build_tallies(candidates, ballots);

    // A tally that runs out first is a strict prefix and sorts lower.
    tallies.sort_by(|a, b| b.merit.cmp(&a.merit).then_with(|| a.candidate.id.cmp(&b.candidate.id)));

    let mut results: Vec<CandidateResult> = Vec::with_capacity(tallies.len());
    for (i, tally) in tallies.iter().enumerate() {
        let rank = match i.checked_sub(1).map(|prev| &tallies[prev]) {
            Some(prev) if prev.merit == tally.merit => results[i - 1].rank,
            _ => i + 1,
        };

        let mut grade_counts = BTreeMap::new();
        for grade in &tally.grades {
            *grade_counts.entry(*grade).or_insert(0) += 1;
        }

        results.push(CandidateResult {
            candidate_id: tally.candidate.id.clone(),
            name: tally.candidate.name.clone(),
            median: lower_median(&tally.grades),
            rank,
            ballots: tally.grades.len(),
            grade_counts,
        });
    }

    results
}

fn build_tallies<'a>(candidates: &'a [Candidate], ballots: &[Ballot]) -> Vec<Tally<'a>> {
    let mut grades: HashMap<&CandidateId, Vec<Grade>> = candidates
        .iter()
        .map(|c| (&c.id, Vec::with_capacity(ballots.len())))
        .collect();

    for ballot in ballots {
        for (candidate_id, grade) in &ballot.grades {
            match grades.get_mut(candidate_id) {
                Some(tally) => tally.push(*grade),
                None => warn!(
                    "Ignoring grade for unknown candidate {} on ballot {}",
                    candidate_id, ballot.ballot_id
                ),
            }
        }
    }

    candidates
        .iter()
        .map(|candidate| {
            let mut sorted = grades.remove(&candidate.id).unwrap_or_default();
            sorted.sort_unstable();
            let merit = median_sequence(&sorted);
            Tally {
                candidate,
                grades: sorted,
                merit,
            }
        })
        .collect()
}

/// Lower of the two central values for even-sized tallies.
pub fn lower_median(sorted: &[Grade]) -> Option<Grade> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[(sorted.len() - 1) / 2])
}

/// The medians seen while repeatedly removing the lower median from a sorted
/// tally until it is empty.
///
/// The removed grades always form a contiguous block around the first median,
/// so the next median is the nearest untaken grade on the heavier side.
pub fn median_sequence(sorted: &[Grade]) -> Vec<Grade> {
    let n = sorted.len();
    let mut sequence = Vec::with_capacity(n);
    if n == 0 {
        return sequence;
    }

    let first = (n - 1) / 2;
    sequence.push(sorted[first]);

    // Untaken grades are sorted[..lo] and sorted[hi..]; the upper side never
    // holds more than one grade over the lower side.
    let mut lo = first;
    let mut hi = first + 1;
    while sequence.len() < n {
        if lo >= n - hi {
            lo -= 1;
            sequence.push(sorted[lo]);
        } else {
            sequence.push(sorted[hi]);
            hi += 1;
        }
    }

    sequence
}
