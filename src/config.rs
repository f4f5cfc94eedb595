use crate::models::{Candidate, Grade, GradeScale};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::env;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:cardinal_vote.db";
const DEFAULT_TITLE: &str = "Vote";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("no candidates configured")]
    NoCandidates,
    #[error("candidate id {0:?} is listed more than once")]
    DuplicateCandidate(String),
    #[error("grade scale is empty: min {min} > max {max}")]
    EmptyScale { min: Grade, max: Grade },
}

/// Immutable parameters of one voting session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub title: String,
    pub candidates: Vec<Candidate>,
    pub scale: GradeScale,
    pub closes_at: Option<DateTime<Utc>>,
}

impl SessionConfig {
    pub fn new(candidates: Vec<Candidate>, scale: GradeScale) -> Result<Self, ConfigError> {
        if candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        if scale.min > scale.max {
            return Err(ConfigError::EmptyScale {
                min: scale.min,
                max: scale.max,
            });
        }

        let mut seen = HashSet::new();
        for candidate in &candidates {
            if candidate.id.as_str().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "VOTE_CANDIDATES",
                    value: candidate.name.clone(),
                });
            }
            if !seen.insert(candidate.id.clone()) {
                return Err(ConfigError::DuplicateCandidate(candidate.id.to_string()));
            }
        }

        Ok(Self {
            title: DEFAULT_TITLE.to_string(),
            candidates,
            scale,
            closes_at: None,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup("VOTE_CANDIDATES").ok_or(ConfigError::Missing("VOTE_CANDIDATES"))?;
        let candidates = parse_candidates(&raw)?;

        let scale = GradeScale {
            min: parse_grade(&lookup, "VOTE_GRADE_MIN", GradeScale::default().min)?,
            max: parse_grade(&lookup, "VOTE_GRADE_MAX", GradeScale::default().max)?,
        };

        let mut config = Self::new(candidates, scale)?;

        if let Some(title) = lookup("VOTE_TITLE").filter(|t| !t.trim().is_empty()) {
            config.title = title.trim().to_string();
        }

        if let Some(closes_at) = lookup("VOTE_CLOSES_AT") {
            let parsed = DateTime::parse_from_rfc3339(closes_at.trim()).map_err(|_| {
                ConfigError::Invalid {
                    key: "VOTE_CLOSES_AT",
                    value: closes_at.clone(),
                }
            })?;
            config.closes_at = Some(parsed.with_timezone(&Utc));
        }

        Ok(config)
    }

    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.closes_at.is_some_and(|closes_at| now >= closes_at)
    }
}

pub fn database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

// "a:Alice, b:Bob, c" -> [(a, Alice), (b, Bob), (c, c)]
fn parse_candidates(raw: &str) -> Result<Vec<Candidate>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, name) = match entry.split_once(':') {
                Some((id, name)) => (id.trim(), name.trim()),
                None => (entry, entry),
            };
            if id.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "VOTE_CANDIDATES",
                    value: entry.to_string(),
                });
            }
            let name = if name.is_empty() { id } else { name };
            Ok(Candidate::new(id, name))
        })
        .collect()
}

fn parse_grade<F>(lookup: &F, key: &'static str, default: Grade) -> Result<Grade, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
