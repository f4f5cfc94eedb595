use super::{LedgerError, VoteLedger};
use crate::models::Ballot;
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local ledger for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryLedger {
    ballots: RwLock<HashMap<String, Ballot>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteLedger for MemoryLedger {
    async fn insert_if_absent(&self, ballot: &Ballot) -> Result<bool, LedgerError> {
        let mut ballots = self.ballots.write().await;
        match ballots.entry(ballot.voter_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(ballot.clone());
                Ok(true)
            }
        }
    }

    async fn all_ballots(&self) -> Result<Vec<Ballot>, LedgerError> {
        Ok(self.ballots.read().await.values().cloned().collect())
    }

    async fn get(&self, voter_id: &str) -> Result<Option<Ballot>, LedgerError> {
        Ok(self.ballots.read().await.get(voter_id).cloned())
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        Ok(self.ballots.read().await.len())
    }
}
