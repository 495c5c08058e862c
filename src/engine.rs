//! The interrogation engine
//!
//! Ties the stages together, one call per round:
//! 1. Validate the request (nothing is mutated on failure)
//! 2. Record answers, premises, signals, contradictions, resolutions
//! 3. Re-assess epic + answers, extract facts
//! 4. Optionally merge semantic reviewer additions
//! 5. Select next questions, run the readiness gate, persist
//!
//! Callers must serialize submissions per session id.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::elenchus::{ElenchusSummary, PremiseLedger, ResolveOutcome, DEFAULT_PREMISE_CONFIDENCE};
use crate::epic::Epic;
use crate::error::EngineError;
use crate::facts::{self, FactCounts};
use crate::patterns;
use crate::questions::{self, QuestionContext};
use crate::readiness::{self, Coverage, GateInput, Readiness};
use crate::request::{ResolutionInput, RoundRequest};
use crate::semantic::{self, Additions, Augmentation};
use crate::specificity::{self, QualityAssessment};
use crate::store::{Evaluation, SessionStore};
use crate::types::{Answer, InterrogationSession, Question, SessionStatus, Signal};

/// Result of starting a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutput {
    pub session_id: String,
    pub round: u32,
    pub status: SessionStatus,
    pub assessment: QualityAssessment,
    pub goals: Vec<String>,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub questions: Vec<Question>,
    pub signals: Vec<Signal>,
    pub warnings: Vec<String>,
}

/// Answer quality for the session so far
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub average_score: Option<f64>,
    pub total_answered: usize,
    pub low_quality_count: usize,
    pub issues: Vec<String>,
}

/// Result of one submitted round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutput {
    pub session_id: String,
    pub round: u32,
    pub tier_assessment: QualityAssessment,
    pub extracted_facts: FactCounts,
    pub quality: QualityReport,
    pub coverage: Coverage,
    pub elenchus: ElenchusSummary,
    pub suggested_questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_question: Option<String>,
    pub ready_for_spec: bool,
    pub blockers: Vec<String>,
    pub clarity_score: u32,
    pub next_step: String,
    pub semantic: bool,
    pub warnings: Vec<String>,
}

/// Outcome for one resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub contradiction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ResolveOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutput {
    pub session_id: String,
    pub results: Vec<ResolutionResult>,
    pub elenchus: ElenchusSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_question: Option<String>,
    pub ready_for_spec: bool,
    pub blockers: Vec<String>,
}

/// Stored session plus its ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: InterrogationSession,
    pub elenchus: ElenchusSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_question: Option<String>,
    pub evaluations: usize,
}

/// Work in progress between recording a round and finishing it
struct PendingRound {
    session: InterrogationSession,
    ledger: PremiseLedger,
    assessment: QualityAssessment,
    facts: FactCounts,
    issues: Vec<String>,
}

/// The interrogation engine
pub struct InterrogationEngine<'a> {
    store: &'a dyn SessionStore,
    config: &'a EngineConfig,
}

impl<'a> InterrogationEngine<'a> {
    pub fn new(store: &'a dyn SessionStore, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    /// Ingest an epic, assess it, and ask the first round of questions
    pub fn start(&self, epic_text: &str) -> Result<StartOutput, EngineError> {
        let (session, assessment, questions) = self.prepare_start(epic_text);
        self.finish_start(session, assessment, questions, Additions::default())
    }

    /// `start`, plus reviewer signals and questions when available
    pub async fn start_with(
        &self,
        epic_text: &str,
        augmentation: &Augmentation<'_>,
    ) -> Result<StartOutput, EngineError> {
        let (session, assessment, questions) = self.prepare_start(epic_text);
        let additions = augmentation.review_epic(epic_text, &assessment).await;
        self.finish_start(session, assessment, questions, additions)
    }

    fn prepare_start(
        &self,
        epic_text: &str,
    ) -> (InterrogationSession, QualityAssessment, Vec<Question>) {
        let epic = Epic::ingest_with_limit(epic_text, self.config.epic_warn_chars);
        let assessment = specificity::analyze(&epic.text);
        let session = InterrogationSession::new(epic, assessment.tier);

        let questions = questions::select_questions(&QuestionContext {
            tier: assessment.tier,
            assessment: &assessment,
            asked: &[],
            answers: &[],
            epic_text: &session.epic.text,
            has_acceptance_criteria: !session.epic.acceptance_criteria.is_empty(),
        });

        (session, assessment, questions)
    }

    fn finish_start(
        &self,
        mut session: InterrogationSession,
        assessment: QualityAssessment,
        mut questions: Vec<Question>,
        additions: Additions,
    ) -> Result<StartOutput, EngineError> {
        let mut warnings = Vec::new();
        if session.epic.text.trim().is_empty() {
            warnings.push("epic text is empty".to_string());
        }
        if session.epic.text.chars().count() > self.config.epic_warn_chars {
            warnings.push(format!(
                "epic exceeds {} characters; consider splitting it",
                self.config.epic_warn_chars
            ));
        }

        for signal in additions.signals {
            session.upsert_signal(signal);
        }
        merge_questions(&mut questions, additions.questions, &[]);

        session.asked.extend(questions.iter().cloned());
        session.status = SessionStatus::InProgress;
        session.updated_at = Utc::now();

        self.store.save_session(&session)?;
        self.store.save_ledger(&PremiseLedger::new(session.id.clone()))?;

        tracing::info!(
            session = %session.id,
            tier = assessment.tier,
            strategy = assessment.strategy.name(),
            questions = questions.len(),
            "Interrogation started"
        );

        Ok(StartOutput {
            session_id: session.id.clone(),
            round: session.round,
            status: session.status,
            goals: session.epic.goals.clone(),
            constraints: session.epic.constraints.clone(),
            acceptance_criteria: session.epic.acceptance_criteria.clone(),
            signals: session.signals.clone(),
            assessment,
            questions,
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    /// Submit one round of answers using the deterministic path only
    pub fn submit_round(
        &self,
        session_id: &str,
        request: RoundRequest,
    ) -> Result<RoundOutput, EngineError> {
        let pending = self.record_round(session_id, request)?;
        self.finish_round(pending, Additions::default(), false)
    }

    /// Submit one round, merging reviewer additions when augmented
    pub async fn submit_round_with(
        &self,
        session_id: &str,
        request: RoundRequest,
        augmentation: &Augmentation<'_>,
    ) -> Result<RoundOutput, EngineError> {
        let pending = self.record_round(session_id, request)?;
        let asked = asked_texts(&pending.session);
        let additions = augmentation
            .review_round(
                &pending.session.combined_text(),
                &pending.assessment,
                &pending.ledger,
                &asked,
            )
            .await;
        self.finish_round(pending, additions, augmentation.is_semantic())
    }

    fn load(&self, session_id: &str) -> Result<(InterrogationSession, PremiseLedger), EngineError> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;
        let ledger = self.store.get_ledger(session_id)?;
        Ok((session, ledger))
    }

    /// Validate then apply everything in the request to in-memory copies
    fn record_round(
        &self,
        session_id: &str,
        request: RoundRequest,
    ) -> Result<PendingRound, EngineError> {
        let (mut session, mut ledger) = self.load(session_id)?;
        request.validate(&ledger)?;

        let mut issues = Vec::new();
        let mut facts = FactCounts::default();
        let now = Utc::now();

        for input in request.signals {
            let id = input
                .id
                .unwrap_or_else(|| semantic::signal_id(&input.description));
            session.upsert_signal(Signal {
                id,
                description: input.description.trim().to_string(),
                severity: input.severity,
                addressed: input.addressed,
            });
        }

        for input in request.answers {
            let question_text = input.question.trim().to_string();
            let question_id = session
                .asked
                .iter()
                .find(|q| q.text.eq_ignore_ascii_case(&question_text))
                .map(|q| q.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            // A new answer to the same question supersedes the old one
            session
                .answers
                .retain(|a| !a.question.eq_ignore_ascii_case(&question_text));

            let answer = Answer {
                id: Uuid::new_v4().to_string(),
                question_id,
                area: input.area,
                question: question_text,
                text: input.answer.trim().to_string(),
                score: input.score,
                round: session.round,
                answered_at: now,
            };

            if let Some(score) = answer.score {
                if score < self.config.low_score_threshold {
                    issues.push(format!("Answer to \"{}\" scored {}/5", answer.question, score));
                }
            }
            let (vague, _) = patterns::find_vague_phrases(&answer.text);
            if !vague.is_empty() {
                let quoted = vague
                    .iter()
                    .map(|p| format!("\"{}\"", p))
                    .collect::<Vec<_>>()
                    .join(", ");
                issues.push(format!(
                    "Answer to \"{}\" uses vague language: {}",
                    answer.question, quoted
                ));
            }

            facts.merge(&FactCounts::from_facts(&facts::extract_facts(
                &answer.question,
                &answer.text,
            )));

            for premise in &input.premises {
                let confidence = premise.confidence.unwrap_or(DEFAULT_PREMISE_CONFIDENCE);
                match &premise.id {
                    Some(id) => {
                        ledger.add_premise_with_id(
                            id.trim().to_string(),
                            &premise.statement,
                            premise.premise_type,
                            confidence,
                            &answer.id,
                        );
                    }
                    None => {
                        ledger.add_premise(&premise.statement, premise.premise_type, confidence, &answer.id);
                    }
                }
            }

            session.answers.push(answer);
        }

        for input in &request.contradictions {
            let premise_ids: Vec<String> = input.premise_ids.iter().map(|id| id.trim().to_string()).collect();
            if let Err(e) = ledger.record_contradiction(&premise_ids, &input.description, input.severity) {
                issues.push(format!("Contradiction \"{}\" not recorded: {}", input.description.trim(), e));
            }
        }

        for input in &request.resolutions {
            let outcome = ledger.resolve(&input.contradiction_id, &input.resolution);
            if let Some(issue) = resolution_issue(&input.contradiction_id, outcome) {
                issues.push(issue);
            }
        }

        let assessment = specificity::analyze(&session.combined_text());
        tracing::debug!(
            session = %session.id,
            tier = assessment.tier,
            specificity = assessment.metrics.specificity_score,
            "Re-assessed with answers"
        );

        Ok(PendingRound {
            session,
            ledger,
            assessment,
            facts,
            issues,
        })
    }

    fn finish_round(
        &self,
        pending: PendingRound,
        additions: Additions,
        semantic: bool,
    ) -> Result<RoundOutput, EngineError> {
        let PendingRound {
            mut session,
            mut ledger,
            assessment,
            facts,
            mut issues,
        } = pending;

        let mut warnings = Vec::new();
        if session.round > self.config.max_rounds {
            tracing::warn!(
                session = %session.id,
                round = session.round,
                max_rounds = self.config.max_rounds,
                "Round limit exceeded"
            );
            warnings.push(format!(
                "round {} exceeds the limit of {}",
                session.round, self.config.max_rounds
            ));
        }

        for proposed in &additions.contradictions {
            if ledger.has_contradiction_over(&proposed.premise_ids) {
                continue;
            }
            let recorded = ledger.record_contradiction(
                &proposed.premise_ids,
                &proposed.description,
                proposed.severity,
            );
            if let Err(e) = recorded {
                tracing::debug!("Dropping reviewer contradiction: {}", e);
            }
        }
        for signal in additions.signals {
            session.upsert_signal(signal);
        }

        let asked = asked_texts(&session);
        let mut suggested = questions::select_questions(&QuestionContext {
            tier: assessment.tier,
            assessment: &assessment,
            asked: &asked,
            answers: &session.answers,
            epic_text: &session.epic.text,
            has_acceptance_criteria: !session.epic.acceptance_criteria.is_empty(),
        });
        merge_questions(&mut suggested, additions.questions, &asked);

        let quality = quality_report(&session.answers, self.config.low_score_threshold, &mut issues);
        let coverage = Coverage::from_answers(&session.answers);
        let readiness = self.gate(&session, &ledger, &coverage, assessment.tier);

        readiness::advance(&mut session, assessment.tier, quality.average_score, &readiness);
        let round = session.round;
        session.round += 1;
        session.asked.extend(suggested.iter().cloned());

        let output = RoundOutput {
            session_id: session.id.clone(),
            round,
            tier_assessment: assessment,
            extracted_facts: facts,
            quality,
            coverage,
            elenchus: ledger.summary(),
            suggested_questions: suggested,
            challenge_question: ledger.challenge_question(),
            ready_for_spec: readiness.ready_for_spec,
            blockers: readiness.blockers,
            clarity_score: readiness.clarity_score,
            next_step: readiness.next_step,
            semantic,
            warnings,
        };

        self.store.save_session(&session)?;
        self.store.save_ledger(&ledger)?;
        self.store.save_evaluation(&Evaluation {
            session_id: session.id.clone(),
            round,
            payload: serde_json::to_value(&output)?,
            created_at: Utc::now(),
        })?;

        tracing::info!(
            session = %session.id,
            round,
            tier = output.tier_assessment.tier,
            ready = output.ready_for_spec,
            blockers = output.blockers.len(),
            "Round complete"
        );

        Ok(output)
    }

    fn gate(
        &self,
        session: &InterrogationSession,
        ledger: &PremiseLedger,
        coverage: &Coverage,
        tier: u8,
    ) -> Readiness {
        let low_quality_count = session
            .answers
            .iter()
            .filter(|a| a.score.is_some_and(|s| s < self.config.low_score_threshold))
            .count();

        readiness::evaluate(
            &GateInput {
                coverage,
                tier,
                low_quality_count,
                unresolved_critical: ledger.unresolved_critical(),
                unaddressed_critical_signals: session.unaddressed_critical_signals(),
                total_answers: session.answers.len(),
            },
            self.config,
        )
    }

    // -----------------------------------------------------------------------
    // Resolution and lookup
    // -----------------------------------------------------------------------

    /// Resolve contradictions outside a round and re-run the gate
    pub fn resolve(
        &self,
        session_id: &str,
        resolutions: &[ResolutionInput],
    ) -> Result<ResolveOutput, EngineError> {
        if resolutions.is_empty() {
            return Err(EngineError::InvalidRequest("no resolutions given".to_string()));
        }
        for (i, r) in resolutions.iter().enumerate() {
            if r.resolution.trim().is_empty() {
                return Err(EngineError::InvalidRequest(format!(
                    "resolutions[{}].resolution must not be empty",
                    i
                )));
            }
        }

        let (mut session, mut ledger) = self.load(session_id)?;

        let results: Vec<ResolutionResult> = resolutions
            .iter()
            .map(|r| match ledger.resolve(&r.contradiction_id, &r.resolution) {
                Ok(outcome) => ResolutionResult {
                    contradiction_id: r.contradiction_id.clone(),
                    outcome: Some(outcome),
                    error: None,
                },
                Err(e) => ResolutionResult {
                    contradiction_id: r.contradiction_id.clone(),
                    outcome: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        let tier = session
            .scores
            .last()
            .map(|s| s.tier)
            .unwrap_or(session.initial_tier);
        let coverage = Coverage::from_answers(&session.answers);
        let readiness = self.gate(&session, &ledger, &coverage, tier);

        session.blockers = readiness.blockers.clone();
        session.ready_for_spec = readiness.ready_for_spec;
        if readiness.ready_for_spec {
            session.status = SessionStatus::Complete;
        }
        session.updated_at = Utc::now();

        self.store.save_ledger(&ledger)?;
        self.store.save_session(&session)?;

        tracing::info!(
            session = %session.id,
            unresolved_critical = ledger.unresolved_critical(),
            "Contradictions resolved"
        );

        Ok(ResolveOutput {
            session_id: session.id,
            results,
            elenchus: ledger.summary(),
            challenge_question: ledger.challenge_question(),
            ready_for_spec: readiness.ready_for_spec,
            blockers: readiness.blockers,
        })
    }

    /// Current state of a session
    pub fn session(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let (session, ledger) = self.load(session_id)?;
        let evaluations = self.store.get_evaluations(session_id)?.len();
        Ok(SessionSnapshot {
            session,
            elenchus: ledger.summary(),
            challenge_question: ledger.challenge_question(),
            evaluations,
        })
    }
}

fn asked_texts(session: &InterrogationSession) -> Vec<String> {
    session.asked.iter().map(|q| q.text.clone()).collect()
}

/// Append reviewer questions that are not already queued or asked
fn merge_questions(questions: &mut Vec<Question>, extra: Vec<Question>, asked: &[String]) {
    for question in extra {
        let duplicate = questions.iter().any(|q| q.text.eq_ignore_ascii_case(&question.text))
            || asked.iter().any(|q| q.eq_ignore_ascii_case(&question.text));
        if !duplicate {
            questions.push(question);
        }
    }
}

fn resolution_issue(
    id: &str,
    result: Result<ResolveOutcome, crate::error::LedgerError>,
) -> Option<String> {
    match result {
        Ok(ResolveOutcome::Resolved) => None,
        Ok(ResolveOutcome::AlreadyResolved) => {
            Some(format!("Contradiction {} was already resolved; kept the first resolution", id))
        }
        Err(e) => Some(format!("Resolution not applied: {}", e)),
    }
}

fn quality_report(
    answers: &[Answer],
    low_score_threshold: u8,
    issues: &mut Vec<String>,
) -> QualityReport {
    let scores: Vec<u8> = answers.iter().filter_map(|a| a.score).collect();
    let average_score = if scores.is_empty() {
        None
    } else {
        let sum: u32 = scores.iter().map(|s| *s as u32).sum();
        Some(((sum as f64 / scores.len() as f64) * 100.0).round() / 100.0)
    };

    QualityReport {
        average_score,
        total_answered: answers.len(),
        low_quality_count: scores.iter().filter(|s| **s < low_score_threshold).count(),
        issues: std::mem::take(issues),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerateOptions, TextGenerator};
    use crate::request;
    use crate::store::MemoryStore;
    use crate::types::{Area, Severity};
    use async_trait::async_trait;
    use serde_json::json;

    const EXPORT_EPIC: &str = "Let users export reports.";

    fn round(value: serde_json::Value) -> RoundRequest {
        request::parse(value).unwrap()
    }

    fn export_round() -> RoundRequest {
        round(json!({
            "answers": [
                {
                    "area": "scope",
                    "question": "Who can export?",
                    "answer": "All users can export any report",
                    "score": 4,
                    "premises": [{"id": "p1", "statement": "All users can export", "type": "capability"}]
                },
                {
                    "area": "constraint",
                    "question": "Are there data protection rules?",
                    "answer": "Reports contain PII, which requires access control",
                    "score": 4,
                    "premises": [{"id": "p2", "statement": "PII requires access control", "type": "constraint"}]
                }
            ],
            "contradictions": [
                {"premiseIds": ["p1", "p2"], "description": "Unrestricted export exposes PII", "severity": "critical"}
            ]
        }))
    }

    #[test]
    fn test_start_asks_foundation_questions() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);

        let started = engine
            .start("Build a dashboard. It should be fast and user-friendly.")
            .unwrap();
        assert!(started.assessment.tier <= 2);
        assert_eq!(started.round, 1);
        assert_eq!(started.status, SessionStatus::InProgress);
        assert!(!started.questions.is_empty());
        assert!(started.questions.len() <= 5);

        let snapshot = engine.session(&started.session_id).unwrap();
        assert_eq!(snapshot.session.asked.len(), started.questions.len());
        assert_eq!(snapshot.evaluations, 0);
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);

        let err = engine.submit_round("missing", export_round()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(matches!(engine.session("missing"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_critical_contradiction_blocks_and_challenges() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let output = engine.submit_round(&session_id, export_round()).unwrap();
        assert!(output.tier_assessment.tier < 4);
        assert_eq!(output.elenchus.unresolved_critical, 1);
        assert!(output.elenchus.aporia_reached);
        assert!(!output.ready_for_spec);
        assert!(output
            .blockers
            .contains(&"1 unresolved critical contradiction(s) — must resolve before spec".to_string()));

        let challenge = output.challenge_question.unwrap();
        assert!(challenge.contains("\"All users can export\""));
        assert!(challenge.contains("\"PII requires access control\""));

        // Resolve it
        let contradiction_id = output.elenchus.contradictions[0].id.clone();
        let resolved = engine
            .resolve(
                &session_id,
                &[ResolutionInput {
                    contradiction_id: contradiction_id.clone(),
                    resolution: "Only admins can export PII".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(resolved.results[0].outcome, Some(ResolveOutcome::Resolved));
        assert_eq!(resolved.elenchus.unresolved_critical, 0);
        assert!(resolved.challenge_question.is_none());

        let stored = &resolved.elenchus.contradictions[0];
        assert!(stored.resolved);
        assert_eq!(stored.resolution.as_deref(), Some("Only admins can export PII"));

        // Persisted
        let snapshot = engine.session(&session_id).unwrap();
        assert_eq!(snapshot.elenchus.unresolved_critical, 0);
        assert_eq!(snapshot.evaluations, 1);
    }

    #[test]
    fn test_four_covered_answers_are_ready() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let output = engine
            .submit_round(
                &session_id,
                round(json!({
                    "answers": [
                        {"area": "scope", "question": "What is the core problem?",
                         "answer": "Finance reconciles invoices by hand", "score": 4},
                        {"area": "success", "question": "How will we verify success?",
                         "answer": "Reconciliation takes under 5 minutes", "score": 5},
                        {"area": "constraint", "question": "What limits apply?",
                         "answer": "Must ship by March 31", "score": 4},
                        {"area": "risk", "question": "What could go wrong?",
                         "answer": "Exports over 10,000 rows may time out", "score": 3}
                    ]
                })),
            )
            .unwrap();

        assert_eq!(output.blockers, Vec::<String>::new());
        assert!(output.ready_for_spec);
        assert_eq!(output.clarity_score, 100);
        assert_eq!(output.quality.total_answered, 4);
        assert_eq!(output.quality.low_quality_count, 0);
        assert_eq!(output.quality.average_score, Some(4.0));
        assert!(output.extracted_facts.total > 0);

        let snapshot = engine.session(&session_id).unwrap();
        assert_eq!(snapshot.session.status, SessionStatus::Complete);
        assert_eq!(snapshot.session.round, 2);
        assert_eq!(snapshot.session.scores.len(), 1);
    }

    #[test]
    fn test_invalid_batch_mutates_nothing() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let mut bad = export_round();
        bad.answers[1].score = Some(0);
        let err = engine.submit_round(&session_id, bad).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));

        let snapshot = engine.session(&session_id).unwrap();
        assert!(snapshot.session.answers.is_empty());
        assert_eq!(snapshot.session.round, 1);
        assert!(snapshot.elenchus.premises.is_empty());
    }

    #[test]
    fn test_ledger_failures_become_issues() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let output = engine
            .submit_round(
                &session_id,
                round(json!({
                    "answers": [{"area": "scope", "question": "Who exports?",
                                 "answer": "Everyone, and it should be easy to use", "score": 2}],
                    "contradictions": [{"premiseIds": ["ghost-1", "ghost-2"],
                                        "description": "Ghosts disagree", "severity": "high"}],
                    "resolutions": [{"contradictionId": "nope", "resolution": "whatever"}]
                })),
            )
            .unwrap();

        let issues = &output.quality.issues;
        assert!(issues.iter().any(|i| i.contains("scored 2/5")));
        assert!(issues.iter().any(|i| i.contains("\"easy to use\"")));
        assert!(issues.iter().any(|i| i.contains("Ghosts disagree") && i.contains("Unknown premise")));
        assert!(issues.iter().any(|i| i.contains("Unknown contradiction id: nope")));
        assert!(output.elenchus.contradictions.is_empty());
        assert!(output.blockers.contains(&"1 answer(s) scored below 3".to_string()));
    }

    #[test]
    fn test_reanswer_supersedes_low_score() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let first = engine
            .submit_round(
                &session_id,
                round(json!({"answers": [{"area": "scope", "question": "What is the core problem?",
                                          "answer": "Stuff", "score": 1}]})),
            )
            .unwrap();
        assert_eq!(first.quality.low_quality_count, 1);

        let second = engine
            .submit_round(
                &session_id,
                round(json!({"answers": [{"area": "scope", "question": "what is the core problem?",
                                          "answer": "Finance reconciles invoices by hand", "score": 4}]})),
            )
            .unwrap();
        assert_eq!(second.round, 2);
        assert_eq!(second.quality.total_answered, 1);
        assert_eq!(second.quality.low_quality_count, 0);
    }

    #[test]
    fn test_round_limit_warns_without_halting() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            max_rounds: 1,
            ..EngineConfig::default()
        };
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let answer = |q: &str| {
            round(json!({"answers": [{"area": "risk", "question": q, "answer": "Timeouts on large exports"}]}))
        };

        let first = engine.submit_round(&session_id, answer("Risk one?")).unwrap();
        assert!(first.warnings.is_empty());

        let second = engine.submit_round(&session_id, answer("Risk two?")).unwrap();
        assert_eq!(second.round, 2);
        assert_eq!(second.warnings.len(), 1);
    }

    #[test]
    fn test_critical_signal_blocks_until_addressed() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let output = engine
            .submit_round(
                &session_id,
                round(json!({
                    "answers": [{"area": "scope", "question": "Core problem?", "answer": "Manual exports"}],
                    "signals": [{"id": "sig-1", "description": "No retention policy", "severity": "critical"}]
                })),
            )
            .unwrap();
        assert!(output.blockers.contains(&"1 critical signal(s) not addressed".to_string()));

        let output = engine
            .submit_round(
                &session_id,
                round(json!({
                    "answers": [],
                    "signals": [{"id": "sig-1", "description": "No retention policy", "severity": "critical", "addressed": true}]
                })),
            )
            .unwrap();
        assert!(!output.blockers.iter().any(|b| b.contains("signal")));
        assert_eq!(engine.session(&session_id).unwrap().session.signals.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Semantic path
    // -----------------------------------------------------------------------

    /// Finds a conflict between the first two premises it is shown
    struct ConflictSpotter;

    #[async_trait]
    impl TextGenerator for ConflictSpotter {
        async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
            if prompt.contains("## Premises") {
                Ok(r#"[{"premiseIds": ["p1", "p2"], "description": "Export bypasses access control", "severity": "critical"}]"#.to_string())
            } else {
                Ok(r#"```json
[{"area": "stakeholder", "text": "Who approves access to exported PII?"}]
```"#
                    .to_string())
            }
        }

        fn name(&self) -> &str {
            "conflict-spotter"
        }
    }

    struct Unreachable;

    #[async_trait]
    impl TextGenerator for Unreachable {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
            Err(LlmError::Timeout)
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    fn premises_only_round() -> RoundRequest {
        let mut request = export_round();
        request.contradictions.clear();
        request
    }

    #[test]
    fn test_semantic_additions_are_merged() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let generator = ConflictSpotter;
        let augmentation = Augmentation::SemanticAugmented(&generator);
        let output = tokio_test::block_on(engine.submit_round_with(&session_id, premises_only_round(), &augmentation)).unwrap();

        assert!(output.semantic);
        assert_eq!(output.elenchus.contradictions.len(), 1);
        assert_eq!(output.elenchus.contradictions[0].severity, Severity::Critical);
        assert!(!output.ready_for_spec);
        assert!(output
            .suggested_questions
            .iter()
            .any(|q| q.area == Area::Stakeholder && q.rationale == semantic::SEMANTIC_RATIONALE));
    }

    #[test]
    fn test_resolved_conflict_stays_settled_across_reviewed_rounds() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let session_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let generator = ConflictSpotter;
        let augmentation = Augmentation::SemanticAugmented(&generator);
        let first = tokio_test::block_on(engine.submit_round_with(&session_id, premises_only_round(), &augmentation)).unwrap();
        assert_eq!(first.elenchus.unresolved_critical, 1);

        let contradiction_id = first.elenchus.contradictions[0].id.clone();
        engine
            .resolve(
                &session_id,
                &[ResolutionInput {
                    contradiction_id,
                    resolution: "Only admins can export PII".to_string(),
                }],
            )
            .unwrap();

        // The reviewer keeps reporting the same pair
        let follow_up = round(json!({
            "answers": [{
                "area": "risk",
                "question": "What could go wrong?",
                "answer": "Exports over 10,000 rows may time out",
                "score": 4
            }]
        }));
        let second = tokio_test::block_on(engine.submit_round_with(&session_id, follow_up, &augmentation)).unwrap();

        assert_eq!(second.elenchus.contradictions.len(), 1);
        assert!(second.elenchus.contradictions[0].resolved);
        assert_eq!(second.elenchus.unresolved_critical, 0);
        assert!(!second.elenchus.aporia_reached);
        assert!(second.challenge_question.is_none());
    }

    #[test]
    fn test_unreachable_reviewer_matches_template() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);

        let template_id = engine.start(EXPORT_EPIC).unwrap().session_id;
        let semantic_id = engine.start(EXPORT_EPIC).unwrap().session_id;

        let template = engine.submit_round(&template_id, premises_only_round()).unwrap();

        let generator = Unreachable;
        let augmentation = Augmentation::SemanticAugmented(&generator);
        let degraded = tokio_test::block_on(engine.submit_round_with(&semantic_id, premises_only_round(), &augmentation)).unwrap();

        assert_eq!(degraded.ready_for_spec, template.ready_for_spec);
        assert_eq!(degraded.blockers, template.blockers);
        assert_eq!(degraded.suggested_questions.len(), template.suggested_questions.len());
        assert!(degraded.elenchus.contradictions.is_empty());
    }

    #[test]
    fn test_start_with_reviewer_signals() {
        struct SignalSpotter;

        #[async_trait]
        impl TextGenerator for SignalSpotter {
            async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
                Ok(r#"{"signals": [{"description": "No definition of fast", "severity": "critical"}], "questions": []}"#.to_string())
            }

            fn name(&self) -> &str {
                "signal-spotter"
            }
        }

        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let engine = InterrogationEngine::new(&store, &config);
        let generator = SignalSpotter;
        let augmentation = Augmentation::SemanticAugmented(&generator);

        let started = tokio_test::block_on(engine.start_with("Build a fast dashboard.", &augmentation)).unwrap();
        assert_eq!(started.signals.len(), 1);

        let output = engine
            .submit_round(
                &started.session_id,
                round(json!({"answers": [{"area": "success", "question": "How fast?", "answer": "Under 200ms at p95"}]})),
            )
            .unwrap();
        assert!(output.blockers.contains(&"1 critical signal(s) not addressed".to_string()));
    }
}
