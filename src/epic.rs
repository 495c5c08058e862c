//! Epic ingestion
//!
//! An epic is the raw feature request. It is fingerprinted and mined for
//! cheap keyword hints once, then never touched again by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::patterns::{self, has_any_term};

/// Above this many characters collaborators get slow and expensive
pub const EPIC_WARN_CHARS: usize = 100_000;

/// Immutable raw request plus extracted hints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    pub id: String,
    pub text: String,
    /// SHA-256 of the text, hex encoded
    pub content_hash: String,
    pub goals: Vec<String>,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub created_at: DateTime<Utc>,
}

const GOAL_TERMS: &[&str] = &[
    "goal",
    "objective",
    "want to",
    "need to",
    "so that",
    "in order to",
    "enable",
    "allow",
    "build",
    "create",
];

const CONSTRAINT_TERMS: &[&str] = &[
    "must",
    "cannot",
    "can't",
    "should not",
    "only",
    "limit",
    "deadline",
    "budget",
    "comply",
    "compliance",
    "no more than",
    "at most",
];

const ACCEPTANCE_TERMS: &[&str] = &[
    "acceptance",
    "criteria",
    "done when",
    "verify",
    "should be able to",
    "given",
];

impl Epic {
    /// Ingest raw text with the default size warning threshold
    pub fn ingest(text: &str) -> Self {
        Self::ingest_with_limit(text, EPIC_WARN_CHARS)
    }

    pub fn ingest_with_limit(text: &str, warn_chars: usize) -> Self {
        let chars = text.chars().count();
        if chars > warn_chars {
            tracing::warn!(chars, limit = warn_chars, "Epic text is unusually large");
        }

        let mut goals = Vec::new();
        let mut constraints = Vec::new();
        let mut acceptance_criteria = Vec::new();

        for statement in patterns::split_statements(text) {
            let lower = statement.to_lowercase();
            if has_any_term(&lower, ACCEPTANCE_TERMS) || patterns::CONDITION_RE.is_match(statement) {
                acceptance_criteria.push(statement.to_string());
            } else if has_any_term(&lower, CONSTRAINT_TERMS) {
                constraints.push(statement.to_string());
            } else if has_any_term(&lower, GOAL_TERMS) {
                goals.push(statement.to_string());
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            content_hash: hex::encode(Sha256::digest(text.as_bytes())),
            goals,
            constraints,
            acceptance_criteria,
            created_at: Utc::now(),
        }
    }

    /// True when the stored text still matches its fingerprint
    pub fn verify(&self) -> bool {
        hex::encode(Sha256::digest(self.text.as_bytes())) == self.content_hash
    }
}
