use cardinal_vote::config::{self, SessionConfig};
use cardinal_vote::voting::parse_grades;
use cardinal_vote::{SqliteLedger, SubmitError, VoteService};
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

#[derive(Debug, Deserialize)]
struct BallotRequest {
    voter_id: String,
    grades: serde_json::Value,
}

#[tokio::main]
async fn main() {
    // .env first, so RUST_LOG from it reaches the logger
    dotenvy::dotenv().ok();
    env_logger::init();

    let session = match SessionConfig::from_env() {
        Ok(session) => session,
        Err(e) => {
            error!("Invalid voting session configuration: {}", e);
            return;
        }
    };

    let db_url = config::database_url();
    let ledger = match SqliteLedger::connect(&db_url).await {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            error!("Failed to open vote ledger: {}", e);
            return;
        }
    };

    let service = Arc::new(VoteService::new(session, ledger));
    let session = service.session();
    info!(
        "Session {:?}: {} candidate(s), grades {}..={}",
        session.title,
        session.candidates.len(),
        session.scale.min,
        session.scale.max
    );

    // One JSON ballot request per line; each is submitted concurrently.
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut handles = Vec::new();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read ballot input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: BallotRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Skipping malformed ballot request: {}", e);
                continue;
            }
        };

        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let grades = match parse_grades(&request.grades) {
                Ok(grades) => grades,
                Err(e) => {
                    warn!("Rejected ballot from {:?}: {}", request.voter_id, e);
                    return;
                }
            };
            match service.submit(&request.voter_id, &grades).await {
                Ok(_) => {}
                Err(SubmitError::LedgerUnavailable(e)) => {
                    error!("Ballot from {} not recorded, retry later: {}", request.voter_id, e)
                }
                // Already logged by the service.
                Err(_) => {}
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Ballot task failed: {}", e);
        }
    }

    match service.ballot_count().await {
        Ok(count) => info!("{} ballot(s) recorded", count),
        Err(e) => error!("Failed to count ballots: {}", e),
    }

    match service.results().await {
        Ok(results) => match serde_json::to_string_pretty(&*results) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize results: {}", e),
        },
        Err(e) => error!("Failed to compute results: {}", e),
    }
}
