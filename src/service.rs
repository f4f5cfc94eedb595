use crate::cache::{Results, ResultsCache};
use crate::config::SessionConfig;
use crate::db::{LedgerError, VoteLedger};
use crate::error::SubmitError;
use crate::models::{Ballot, CandidateId, Grade};
use crate::voting::validate_ballot;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Receipt for a committed ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub voter_id: String,
    pub ballot_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

/// Entry point for the web layer: the only way ballots reach the ledger.
pub struct VoteService {
    session: SessionConfig,
    ledger: Arc<dyn VoteLedger>,
    cache: ResultsCache,
}

impl VoteService {
    pub fn new(session: SessionConfig, ledger: Arc<dyn VoteLedger>) -> Self {
        let cache = ResultsCache::new(Arc::clone(&ledger), session.candidates.clone());
        Self {
            session,
            ledger,
            cache,
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub async fn submit(
        &self,
        voter_id: &str,
        grades: &HashMap<CandidateId, Grade>,
    ) -> Result<Accepted, SubmitError> {
        if let Some(closes_at) = self.session.closes_at {
            if self.session.is_closed_at(Utc::now()) {
                warn!("Rejected ballot from {}: voting closed at {}", voter_id, closes_at);
                return Err(SubmitError::SessionClosed { closes_at });
            }
        }

        let grades = validate_ballot(&self.session, voter_id, grades).map_err(|e| {
            warn!("Rejected invalid ballot from {:?}: {}", voter_id, e);
            e
        })?;

        let ballot = Ballot::new(voter_id.to_string(), grades);

        let inserted = self.ledger.insert_if_absent(&ballot).await.map_err(|e| {
            error!("Failed to commit ballot for {}: {}", voter_id, e);
            e
        })?;

        if !inserted {
            warn!("Duplicate ballot from {}", voter_id);
            return Err(SubmitError::DuplicateVote {
                voter_id: voter_id.to_string(),
            });
        }

        self.cache.invalidate().await;
        info!("Accepted ballot {} from {}", ballot.ballot_id, voter_id);

        Ok(Accepted {
            voter_id: ballot.voter_id,
            ballot_id: ballot.ballot_id,
            submitted_at: ballot.submitted_at,
        })
    }

    pub async fn results(&self) -> Result<Results, LedgerError> {
        self.cache.get().await.map_err(|e| {
            error!("Failed to compute results: {}", e);
            e
        })
    }

    pub async fn ballot_count(&self) -> Result<usize, LedgerError> {
        self.ledger.count().await
    }

    /// The committed ballot for `voter_id`, if any.
    pub async fn ballot_for(&self, voter_id: &str) -> Result<Option<Ballot>, LedgerError> {
        self.ledger.get(voter_id).await
    }
}
