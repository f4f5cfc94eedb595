mod memory;
mod sqlite;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use crate::models::Ballot;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

/// Durable store holding at most one ballot per voter.
///
/// Implementations own write arbitration: `insert_if_absent` must be a single
/// atomic conditional insert so that concurrent submissions for the same voter
/// resolve to exactly one winner.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Returns `true` iff this call stored the ballot.
    async fn insert_if_absent(&self, ballot: &Ballot) -> Result<bool, LedgerError>;

    /// Consistent snapshot of every committed ballot, in no particular order.
    async fn all_ballots(&self) -> Result<Vec<Ballot>, LedgerError>;

    async fn get(&self, voter_id: &str) -> Result<Option<Ballot>, LedgerError>;

    async fn count(&self) -> Result<usize, LedgerError>;
}
