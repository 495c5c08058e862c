//! Core types for the elenchus interrogation engine
//!
//! The vocabulary shared by every stage of the loop:
//! - What is being asked about (areas, questions, answers)
//! - What has been committed to (premises, contradictions)
//! - Where the session stands (status, rounds, blockers)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::epic::Epic;

/// A coverage area a requirement can speak to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Scope,
    Success,
    Constraint,
    Risk,
    Technical,
    Stakeholder,
}

impl Area {
    /// Every area, in canonical order
    pub const ALL: [Area; 6] = [
        Area::Scope,
        Area::Success,
        Area::Constraint,
        Area::Risk,
        Area::Technical,
        Area::Stakeholder,
    ];

    /// Areas that must be covered before a spec can be written
    pub const REQUIRED: [Area; 4] = [Area::Scope, Area::Success, Area::Constraint, Area::Risk];

    /// Areas that feed the coverage score
    pub const SCORED: [Area; 5] = [
        Area::Scope,
        Area::Success,
        Area::Constraint,
        Area::Risk,
        Area::Technical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Area::Scope => "scope",
            Area::Success => "success",
            Area::Constraint => "constraint",
            Area::Risk => "risk",
            Area::Technical => "technical",
            Area::Stakeholder => "stakeholder",
        }
    }

    pub fn is_required(&self) -> bool {
        Area::REQUIRED.contains(self)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How thoroughly an area is addressed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CoverageLevel {
    Absent,
    Mentioned,
    Detailed,
}

/// Interrogation strategy selected from the tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Start from first principles - problem, actors, verification
    Comprehensive,
    /// Fill specific gaps
    Targeted,
    /// Confirm and stress-test what is there
    Validation,
    /// Nearly complete - only sanity checks
    Minimal,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Comprehensive => "comprehensive",
            Strategy::Targeted => "targeted",
            Strategy::Validation => "validation",
            Strategy::Minimal => "minimal",
        }
    }
}

/// Question priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// Contradiction / signal severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Kind of logical commitment a premise represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PremiseType {
    Capability,
    Constraint,
    Requirement,
    Assumption,
    Preference,
}

impl PremiseType {
    pub fn name(&self) -> &'static str {
        match self {
            PremiseType::Capability => "capability",
            PremiseType::Constraint => "constraint",
            PremiseType::Requirement => "requirement",
            PremiseType::Assumption => "assumption",
            PremiseType::Preference => "preference",
        }
    }
}

/// A question put to the requester
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub area: Area,
    pub priority: Priority,
    pub text: String,
    /// The gap or heuristic that produced this question
    pub rationale: String,
}

impl Question {
    pub fn new(area: Area, priority: Priority, text: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            area,
            priority,
            text: text.into(),
            rationale: rationale.into(),
        }
    }
}

/// An answer to a question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub area: Area,
    pub question: String,
    pub text: String,
    /// Optional 1-5 quality score
    pub score: Option<u8>,
    pub round: u32,
    pub answered_at: DateTime<Utc>,
}

/// An atomic logical commitment extracted from an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Premise {
    pub id: String,
    pub statement: String,
    #[serde(rename = "type")]
    pub premise_type: PremiseType,
    pub confidence: f64,
    pub answer_id: String,
}

/// A recorded incompatibility between two or more premises
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contradiction {
    pub id: String,
    pub premise_ids: Vec<String>,
    pub description: String,
    pub severity: Severity,
    pub resolved: bool,
    pub resolution: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Contradiction {
    pub fn is_unresolved_critical(&self) -> bool {
        !self.resolved && self.severity == Severity::Critical
    }
}

/// A finding from an external reviewer that must be addressed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub addressed: bool,
}

/// Lifecycle of an interrogation session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Complete,
}

/// Scores recorded for one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub round: u32,
    pub tier: u8,
    pub clarity_score: u32,
    pub average_score: Option<f64>,
    pub ready: bool,
}

/// An interrogation session - owned by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterrogationSession {
    pub id: String,
    pub epic: Epic,
    pub round: u32,
    pub status: SessionStatus,
    pub initial_tier: u8,
    pub answers: Vec<Answer>,
    pub asked: Vec<Question>,
    pub signals: Vec<Signal>,
    pub scores: Vec<RoundScore>,
    pub blockers: Vec<String>,
    pub ready_for_spec: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterrogationSession {
    /// Create a new session at round 1
    pub fn new(epic: Epic, initial_tier: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            epic,
            round: 1,
            status: SessionStatus::Pending,
            initial_tier,
            answers: Vec::new(),
            asked: Vec::new(),
            signals: Vec::new(),
            scores: Vec::new(),
            blockers: Vec::new(),
            ready_for_spec: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Epic text plus every answer so far, for re-assessment
    pub fn combined_text(&self) -> String {
        let mut text = self.epic.text.clone();
        for answer in &self.answers {
            text.push('\n');
            text.push_str(&answer.text);
        }
        text
    }

    /// Insert or replace a signal by id
    pub fn upsert_signal(&mut self, signal: Signal) {
        match self.signals.iter_mut().find(|s| s.id == signal.id) {
            Some(existing) => *existing = signal,
            None => self.signals.push(signal),
        }
    }

    pub fn unaddressed_critical_signals(&self) -> usize {
        self.signals
            .iter()
            .filter(|s| !s.addressed && s.severity == Severity::Critical)
            .count()
    }
}
