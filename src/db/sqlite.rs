use super::{LedgerError, VoteLedger};
use crate::models::{Ballot, CandidateId, Grade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_BALLOTS: &str = r#"
    SELECT b.voter_id, b.ballot_id, b.submitted_at, g.candidate_id, g.grade
    FROM ballots b
    LEFT JOIN ballot_grades g ON g.voter_id = b.voter_id
"#;

pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub async fn connect(db_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        info!("Opened vote ledger at {}", db_url);

        Ok(Self { pool })
    }

    /// Private in-memory database. Pinned to one connection, since every
    /// SQLite connection to `:memory:` opens its own empty database.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                voter_id TEXT PRIMARY KEY,
                ballot_id TEXT NOT NULL,
                submitted_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballot_grades (
                voter_id TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                grade INTEGER NOT NULL,
                PRIMARY KEY (voter_id, candidate_id),
                FOREIGN KEY (voter_id) REFERENCES ballots(voter_id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl VoteLedger for SqliteLedger {
    async fn insert_if_absent(&self, ballot: &Ballot) -> Result<bool, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // The primary key on voter_id arbitrates concurrent writers.
        let inserted = sqlx::query(
            r#"
            INSERT INTO ballots (voter_id, ballot_id, submitted_at)
            VALUES (?, ?, ?)
            ON CONFLICT(voter_id) DO NOTHING
            "#,
        )
        .bind(&ballot.voter_id)
        .bind(ballot.ballot_id.to_string())
        .bind(ballot.submitted_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (candidate_id, grade) in &ballot.grades {
            sqlx::query(
                r#"
                INSERT INTO ballot_grades (voter_id, candidate_id, grade)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&ballot.voter_id)
            .bind(candidate_id.as_str())
            .bind(*grade)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn all_ballots(&self) -> Result<Vec<Ballot>, LedgerError> {
        // A single statement reads from one snapshot.
        let rows = sqlx::query(SELECT_BALLOTS).fetch_all(&self.pool).await?;
        collect_ballots(rows)
    }

    async fn get(&self, voter_id: &str) -> Result<Option<Ballot>, LedgerError> {
        let query = format!("{SELECT_BALLOTS} WHERE b.voter_id = ?");
        let rows = sqlx::query(&query)
            .bind(voter_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(collect_ballots(rows)?.into_iter().next())
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM ballots")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        usize::try_from(count).map_err(|_| LedgerError::Corrupt(format!("negative count {count}")))
    }
}

// Folds one row per (ballot, grade) back into ballots.
fn collect_ballots(rows: Vec<SqliteRow>) -> Result<Vec<Ballot>, LedgerError> {
    let mut ballots: BTreeMap<String, Ballot> = BTreeMap::new();

    for row in rows {
        let voter_id: String = row.try_get("voter_id")?;

        if !ballots.contains_key(&voter_id) {
            let ballot_id: String = row.try_get("ballot_id")?;
            let submitted_at: String = row.try_get("submitted_at")?;

            let ballot_id = Uuid::parse_str(&ballot_id)
                .map_err(|e| LedgerError::Corrupt(format!("ballot_id for {voter_id}: {e}")))?;
            let submitted_at = DateTime::parse_from_rfc3339(&submitted_at)
                .map_err(|e| LedgerError::Corrupt(format!("submitted_at for {voter_id}: {e}")))?
                .with_timezone(&Utc);

            ballots.insert(
                voter_id.clone(),
                Ballot {
                    ballot_id,
                    voter_id: voter_id.clone(),
                    grades: BTreeMap::new(),
                    submitted_at,
                },
            );
        }

        let candidate_id: Option<String> = row.try_get("candidate_id")?;
        let grade: Option<Grade> = row.try_get("grade")?;

        if let (Some(candidate_id), Some(grade), Some(ballot)) =
            (candidate_id, grade, ballots.get_mut(&voter_id))
        {
            ballot.grades.insert(CandidateId(candidate_id), grade);
        }
    }

    Ok(ballots.into_values().collect())
}
