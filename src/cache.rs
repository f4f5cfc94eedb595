use crate::db::{LedgerError, VoteLedger};
use crate::models::{Candidate, CandidateResult};
use crate::voting::calculate_results;
use log::debug;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type Results = Arc<[CandidateResult]>;

enum CacheState {
    Stale,
    Fresh(Results),
}

struct Slot {
    // Bumped on every invalidation. A recompute is only installed if no
    // invalidation happened since it started reading the ledger.
    generation: u64,
    state: CacheState,
}

/// Memoizes the ranked results until the ledger changes.
pub struct ResultsCache {
    ledger: Arc<dyn VoteLedger>,
    candidates: Vec<Candidate>,
    slot: RwLock<Slot>,
}

impl ResultsCache {
    pub fn new(ledger: Arc<dyn VoteLedger>, candidates: Vec<Candidate>) -> Self {
        Self {
            ledger,
            candidates,
            slot: RwLock::new(Slot {
                generation: 0,
                state: CacheState::Stale,
            }),
        }
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = CacheState::Stale;
        debug!("Results cache invalidated (generation {})", slot.generation);
    }

    pub async fn is_fresh(&self) -> bool {
        matches!(self.slot.read().await.state, CacheState::Fresh(_))
    }

    pub async fn get(&self) -> Result<Results, LedgerError> {
        let generation = {
            let slot = self.slot.read().await;
            if let CacheState::Fresh(results) = &slot.state {
                return Ok(Arc::clone(results));
            }
            slot.generation
        };

        let ballots = self.ledger.all_ballots().await?;
        let results: Results = calculate_results(&self.candidates, &ballots).into();

        let mut slot = self.slot.write().await;
        if slot.generation == generation {
            slot.state = CacheState::Fresh(Arc::clone(&results));
            debug!("Results cache refreshed from {} ballot(s)", ballots.len());
        } else {
            debug!("Results recomputed during invalidation; not caching");
        }

        Ok(results)
    }
}
