//! Cardinal voting core: one-shot ballot ingestion over a uniqueness-enforcing
//! ledger, and majority judgment results behind an invalidating cache.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod voting;

pub use config::SessionConfig;
pub use db::{LedgerError, MemoryLedger, SqliteLedger, VoteLedger};
pub use error::{BallotError, SubmitError};
pub use models::{Ballot, Candidate, CandidateId, CandidateResult, Grade, GradeScale};
pub use service::{Accepted, VoteService};
