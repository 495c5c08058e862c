//! Premise/Contradiction Ledger
//!
//! Socratic elenchus: record what the requester committed to, record where
//! those commitments collide, and refuse to move on until the collisions
//! are resolved.
//!
//! The ledger does not detect contradictions itself. They arrive from the
//! caller (structured input) or from the semantic reviewer. The ledger
//! owns storage, referential integrity, resolution bookkeeping and the
//! challenge question.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::types::{Contradiction, Premise, PremiseType, Severity};

/// Confidence given to premises the caller states explicitly
pub const DEFAULT_PREMISE_CONFIDENCE: f64 = 0.8;

/// Outcome of a resolution attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved,
    /// Already resolved earlier; the first resolution is kept
    AlreadyResolved,
}

/// Append-only premises and contradictions for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PremiseLedger {
    pub session_id: String,
    pub premises: Vec<Premise>,
    pub contradictions: Vec<Contradiction>,
}

/// Snapshot for round output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElenchusSummary {
    pub premises: Vec<Premise>,
    pub contradictions: Vec<Contradiction>,
    pub unresolved_critical: usize,
    pub aporia_reached: bool,
}

impl PremiseLedger {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            premises: Vec::new(),
            contradictions: Vec::new(),
        }
    }

    /// Record a premise extracted from an answer
    pub fn add_premise(
        &mut self,
        statement: &str,
        premise_type: PremiseType,
        confidence: f64,
        answer_id: &str,
    ) -> &Premise {
        self.add_premise_with_id(Uuid::new_v4().to_string(), statement, premise_type, confidence, answer_id)
    }

    /// Same as `add_premise` with a caller-chosen id. Uniqueness is the
    /// caller's job (requests are validated before they reach here).
    pub fn add_premise_with_id(
        &mut self,
        id: String,
        statement: &str,
        premise_type: PremiseType,
        confidence: f64,
        answer_id: &str,
    ) -> &Premise {
        self.premises.push(Premise {
            id,
            statement: statement.trim().to_string(),
            premise_type,
            confidence: confidence.clamp(0.0, 1.0),
            answer_id: answer_id.to_string(),
        });
        &self.premises[self.premises.len() - 1]
    }

    pub fn premise(&self, id: &str) -> Option<&Premise> {
        self.premises.iter().find(|p| p.id == id)
    }

    pub fn contradiction(&self, id: &str) -> Option<&Contradiction> {
        self.contradictions.iter().find(|c| c.id == id)
    }

    /// Check a contradiction could be recorded, without recording it
    pub fn validate_contradiction(&self, premise_ids: &[String]) -> Result<(), LedgerError> {
        let mut distinct: Vec<&str> = Vec::new();
        for id in premise_ids {
            if !distinct.contains(&id.as_str()) {
                distinct.push(id);
            }
        }
        if distinct.len() < 2 {
            return Err(LedgerError::TooFewPremises(distinct.len()));
        }
        if let Some(unknown) = distinct.iter().find(|id| self.premise(id).is_none()) {
            return Err(LedgerError::UnknownPremise(unknown.to_string()));
        }
        Ok(())
    }

    /// Record a contradiction over at least two distinct, known premises
    pub fn record_contradiction(
        &mut self,
        premise_ids: &[String],
        description: &str,
        severity: Severity,
    ) -> Result<&Contradiction, LedgerError> {
        self.validate_contradiction(premise_ids)?;

        let mut ids: Vec<String> = Vec::new();
        for id in premise_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        self.contradictions.push(Contradiction {
            id: Uuid::new_v4().to_string(),
            premise_ids: ids,
            description: description.trim().to_string(),
            severity,
            resolved: false,
            resolution: None,
            detected_at: Utc::now(),
            resolved_at: None,
        });
        tracing::info!(
            session = %self.session_id,
            severity = ?severity,
            "Contradiction recorded"
        );
        Ok(&self.contradictions[self.contradictions.len() - 1])
    }

    /// True when any contradiction, resolved or not, links exactly these premises
    pub fn has_contradiction_over(&self, premise_ids: &[String]) -> bool {
        self.contradictions.iter().any(|c| {
            premise_ids.iter().all(|id| c.premise_ids.contains(id))
                && c.premise_ids.iter().all(|id| premise_ids.contains(id))
        })
    }

    /// Resolve a contradiction. A second resolution is a no-op.
    pub fn resolve(
        &mut self,
        contradiction_id: &str,
        resolution: &str,
    ) -> Result<ResolveOutcome, LedgerError> {
        let contradiction = self
            .contradictions
            .iter_mut()
            .find(|c| c.id == contradiction_id)
            .ok_or_else(|| LedgerError::UnknownContradiction(contradiction_id.to_string()))?;

        if contradiction.resolved {
            tracing::debug!(
                id = contradiction_id,
                "Contradiction already resolved, keeping first resolution"
            );
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        contradiction.resolved = true;
        contradiction.resolution = Some(resolution.to_string());
        contradiction.resolved_at = Some(Utc::now());
        Ok(ResolveOutcome::Resolved)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Contradiction> {
        self.contradictions.iter().filter(|c| !c.resolved)
    }

    pub fn unresolved_critical(&self) -> usize {
        self.contradictions.iter().filter(|c| c.is_unresolved_critical()).count()
    }

    /// Blocked until every critical contradiction is resolved
    pub fn aporia_reached(&self) -> bool {
        self.unresolved_critical() > 0
    }

    /// Confront the requester with the first unresolved contradiction
    /// (insertion order, no severity ranking)
    pub fn challenge_question(&self) -> Option<String> {
        let contradiction = self.unresolved().next()?;

        let linked: Vec<&Premise> = contradiction
            .premise_ids
            .iter()
            .filter_map(|id| self.premise(id))
            .take(2)
            .collect();

        let description = contradiction.description.trim_end_matches('.');
        Some(match linked.as_slice() {
            [first, second] => format!(
                "You said \"{}\" AND \"{}\". {}. These cannot both be true. Which is ESSENTIAL, or how do they work together?",
                first.statement, second.statement, description
            ),
            _ => format!(
                "Contradiction detected: {}. How should this be resolved?",
                description
            ),
        })
    }

    pub fn summary(&self) -> ElenchusSummary {
        ElenchusSummary {
            premises: self.premises.clone(),
            contradictions: self.contradictions.clone(),
            unresolved_critical: self.unresolved_critical(),
            aporia_reached: self.aporia_reached(),
        }
    }
}
