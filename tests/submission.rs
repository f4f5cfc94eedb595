//! End-to-end tests for ballot submission and results through `VoteService`.

use async_trait::async_trait;
use cardinal_vote::{
    Ballot, BallotError, Candidate, CandidateId, Grade, GradeScale, LedgerError, MemoryLedger,
    SessionConfig, SqliteLedger, SubmitError, VoteLedger, VoteService,
};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

fn session() -> SessionConfig {
    SessionConfig::new(
        vec![
            Candidate::new("a", "Alpha"),
            Candidate::new("b", "Bravo"),
            Candidate::new("c", "Charlie"),
        ],
        GradeScale { min: 0, max: 5 },
    )
    .unwrap()
}

fn grades(a: Grade, b: Grade, c: Grade) -> HashMap<CandidateId, Grade> {
    HashMap::from([
        (CandidateId::from("a"), a),
        (CandidateId::from("b"), b),
        (CandidateId::from("c"), c),
    ])
}

async fn sqlite_service() -> VoteService {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    VoteService::new(session(), Arc::new(ledger))
}

/// Ledger whose storage is down.
struct UnavailableLedger;

#[async_trait]
impl VoteLedger for UnavailableLedger {
    async fn insert_if_absent(&self, _ballot: &Ballot) -> Result<bool, LedgerError> {
        Err(LedgerError::Unavailable(sqlx::Error::PoolTimedOut))
    }

    async fn all_ballots(&self) -> Result<Vec<Ballot>, LedgerError> {
        Err(LedgerError::Unavailable(sqlx::Error::PoolTimedOut))
    }

    async fn get(&self, _voter_id: &str) -> Result<Option<Ballot>, LedgerError> {
        Err(LedgerError::Unavailable(sqlx::Error::PoolTimedOut))
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        Err(LedgerError::Unavailable(sqlx::Error::PoolTimedOut))
    }
}

async fn race_same_voter(service: Arc<VoteService>, racers: usize) {
    let handles: Vec<_> = (0..racers)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let grade = (i % 6) as Grade;
                service.submit("contested", &grades(grade, grade, grade)).await
            })
        })
        .collect();

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.voter_id, "contested");
                accepted += 1;
            }
            Err(SubmitError::DuplicateVote { voter_id }) => {
                assert_eq!(voter_id, "contested");
                duplicates += 1;
            }
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, racers - 1);
    assert_eq!(service.ballot_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_voter_sqlite() {
    race_same_voter(Arc::new(sqlite_service().await), 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_mixed_voters_file_ledger() {
    let dir = std::env::temp_dir().join(format!("cardinal-vote-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let db_url = format!("sqlite://{}", dir.join("ledger.db").display());

    let ledger = SqliteLedger::connect(&db_url).await.unwrap();
    let service = Arc::new(VoteService::new(session(), Arc::new(ledger)));

    let submitters: Vec<_> = (0..64)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let voter = if i % 2 == 0 {
                    "contested".to_string()
                } else {
                    format!("voter-{i}")
                };
                let grade = (i % 6) as Grade;
                (voter.clone(), service.submit(&voter, &grades(grade, 5 - grade, 3)).await)
            })
        })
        .collect();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.results().await.map(|r| r.len()) })
        })
        .collect();

    let mut contested_accepted = 0;
    let mut contested_duplicates = 0;
    let mut others_accepted = 0;
    for handle in submitters {
        match handle.await.unwrap() {
            (voter, Ok(_)) if voter == "contested" => contested_accepted += 1,
            (voter, Err(SubmitError::DuplicateVote { .. })) if voter == "contested" => {
                contested_duplicates += 1
            }
            (_, Ok(_)) => others_accepted += 1,
            (voter, Err(e)) => panic!("unexpected outcome for {voter}: {e}"),
        }
    }
    for handle in readers {
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }

    assert_eq!(contested_accepted, 1);
    assert_eq!(contested_duplicates, 31);
    assert_eq!(others_accepted, 32);
    assert_eq!(service.ballot_count().await.unwrap(), 33);

    let results = service.results().await.unwrap();
    assert!(results.iter().all(|r| r.ballots == 33));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_voter_memory() {
    let service = VoteService::new(session(), Arc::new(MemoryLedger::new()));
    race_same_voter(Arc::new(service), 64).await;
}

#[tokio::test]
async fn test_scenario_ranking() {
    let service = sqlite_service().await;
    service.submit("v1", &grades(5, 3, 1)).await.unwrap();
    service.submit("v2", &grades(4, 3, 2)).await.unwrap();
    service.submit("v3", &grades(1, 3, 5)).await.unwrap();

    let results = service.results().await.unwrap();
    let ranking: Vec<_> = results
        .iter()
        .map(|r| (r.candidate_id.as_str(), r.median, r.rank))
        .collect();

    assert_eq!(
        ranking,
        vec![("a", Some(4), 1), ("b", Some(3), 2), ("c", Some(2), 3)]
    );
    assert_eq!(results[0].name, "Alpha");
}

#[tokio::test]
async fn test_empty_ledger_ties_all_candidates() {
    let service = sqlite_service().await;

    let results = service.results().await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.rank == 1 && r.median.is_none()));
    assert_eq!(service.ballot_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_ballots_never_reach_ledger() {
    let service = sqlite_service().await;

    let mut missing = grades(1, 1, 1);
    missing.remove(&CandidateId::from("c"));
    let mut unknown = grades(1, 1, 1);
    unknown.insert(CandidateId::from("zulu"), 3);

    let cases = [
        ("v1", missing, BallotError::MissingCandidate(CandidateId::from("c"))),
        ("v2", unknown, BallotError::UnknownCandidate(CandidateId::from("zulu"))),
        (
            "v3",
            grades(1, 9, 1),
            BallotError::GradeOutOfRange {
                candidate: CandidateId::from("b"),
                grade: 9,
                min: 0,
                max: 5,
            },
        ),
        ("", grades(1, 1, 1), BallotError::EmptyVoterId),
    ];

    for (voter, ballot, expected) in cases {
        match service.submit(voter, &ballot).await {
            Err(SubmitError::InvalidBallot(reason)) => assert_eq!(reason, expected),
            other => panic!("expected InvalidBallot for {voter:?}, got {other:?}"),
        }
    }

    assert_eq!(service.ballot_count().await.unwrap(), 0);
    assert!(service.ballot_for("v1").await.unwrap().is_none());

    // A rejected voter can still vote once the ballot is corrected.
    service.submit("v1", &grades(1, 1, 1)).await.unwrap();
    assert_eq!(service.ballot_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_resubmission_is_duplicate_and_keeps_first_ballot() {
    let service = sqlite_service().await;

    let receipt = service.submit("v1", &grades(5, 0, 0)).await.unwrap();
    let err = service.submit("v1", &grades(0, 5, 5)).await.unwrap_err();

    assert!(matches!(err, SubmitError::DuplicateVote { .. }));
    assert!(!err.is_transient());

    let stored = service.ballot_for("v1").await.unwrap().unwrap();
    assert_eq!(stored.ballot_id, receipt.ballot_id);
    assert_eq!(stored.grades[&CandidateId::from("a")], 5);
}

#[tokio::test]
async fn test_results_follow_each_accepted_ballot() {
    let service = sqlite_service().await;

    assert!(service.results().await.unwrap()[0].median.is_none());

    service.submit("v1", &grades(2, 4, 0)).await.unwrap();
    let results = service.results().await.unwrap();
    assert_eq!(results[0].candidate_id.as_str(), "b");
    assert_eq!(results[0].median, Some(4));
    assert_eq!(results[0].ballots, 1);

    // A refused ballot must not change the cached results.
    service.submit("v1", &grades(5, 0, 0)).await.unwrap_err();
    let unchanged = service.results().await.unwrap();
    assert!(Arc::ptr_eq(&results, &unchanged));

    service.submit("v2", &grades(5, 0, 5)).await.unwrap();
    service.submit("v3", &grades(5, 0, 5)).await.unwrap();
    let results = service.results().await.unwrap();
    let ranking: Vec<_> = results
        .iter()
        .map(|r| (r.candidate_id.as_str(), r.median, r.rank))
        .collect();
    assert_eq!(
        ranking,
        vec![("a", Some(5), 1), ("c", Some(5), 2), ("b", Some(0), 3)]
    );
}

#[tokio::test]
async fn test_ledger_outage_is_reported() {
    let service = VoteService::new(session(), Arc::new(UnavailableLedger));

    let err = service.submit("v1", &grades(1, 2, 3)).await.unwrap_err();
    assert!(matches!(err, SubmitError::LedgerUnavailable(_)));
    assert!(err.is_transient());

    assert!(service.results().await.is_err());
    assert!(service.ballot_count().await.is_err());
}

#[tokio::test]
async fn test_invalid_ballot_checked_before_ledger() {
    let service = VoteService::new(session(), Arc::new(UnavailableLedger));

    let err = service.submit("v1", &grades(1, 2, 42)).await.unwrap_err();
    assert!(matches!(err, SubmitError::InvalidBallot(_)));
}

#[tokio::test]
async fn test_closed_session_refuses_ballots() {
    let mut closed = session();
    closed.closes_at = Some(Utc::now() - Duration::minutes(1));
    let service = VoteService::new(closed, Arc::new(MemoryLedger::new()));

    let err = service.submit("v1", &grades(1, 2, 3)).await.unwrap_err();
    assert!(matches!(err, SubmitError::SessionClosed { .. }));
    assert_eq!(service.ballot_count().await.unwrap(), 0);

    let mut open = session();
    open.closes_at = Some(Utc::now() + Duration::hours(1));
    let service = VoteService::new(open, Arc::new(MemoryLedger::new()));
    service.submit("v1", &grades(1, 2, 3)).await.unwrap();
}
