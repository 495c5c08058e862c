//! Readiness Gate
//!
//! Decides whether a session has enough grounded, consistent answers to be
//! handed to a spec writer. Recomputed from scratch every round.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::{Answer, Area, InterrogationSession, RoundScore, SessionStatus};

/// Which areas the answers so far have covered
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub scope: bool,
    pub success: bool,
    pub constraint: bool,
    pub risk: bool,
    pub technical: bool,
    pub stakeholder: bool,
    /// Required areas still uncovered
    pub missing: Vec<Area>,
}

impl Coverage {
    /// An area is covered once any non-empty answer addresses it
    pub fn from_answers(answers: &[Answer]) -> Self {
        let covered = |area: Area| {
            answers
                .iter()
                .any(|a| a.area == area && !a.text.trim().is_empty())
        };

        let mut coverage = Coverage {
            scope: covered(Area::Scope),
            success: covered(Area::Success),
            constraint: covered(Area::Constraint),
            risk: covered(Area::Risk),
            technical: covered(Area::Technical),
            stakeholder: covered(Area::Stakeholder),
            missing: Vec::new(),
        };
        coverage.missing = Area::REQUIRED
            .iter()
            .copied()
            .filter(|a| !coverage.is_covered(*a))
            .collect();
        coverage
    }

    pub fn is_covered(&self, area: Area) -> bool {
        match area {
            Area::Scope => self.scope,
            Area::Success => self.success,
            Area::Constraint => self.constraint,
            Area::Risk => self.risk,
            Area::Technical => self.technical,
            Area::Stakeholder => self.stakeholder,
        }
    }

    pub fn covered_required(&self) -> usize {
        Area::REQUIRED.len() - self.missing.len()
    }
}

/// Everything the gate looks at
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub coverage: &'a Coverage,
    pub tier: u8,
    pub low_quality_count: usize,
    pub unresolved_critical: usize,
    pub unaddressed_critical_signals: usize,
    pub total_answers: usize,
}

/// The gate's verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub ready_for_spec: bool,
    pub blockers: Vec<String>,
    /// Share of the four required areas covered, 0-100
    pub clarity_score: u32,
    pub next_step: String,
}

fn area_list(areas: &[Area]) -> String {
    areas.iter().map(|a| a.name()).collect::<Vec<_>>().join(", ")
}

/// Every blocker that applies, in rule order
pub fn blockers(input: &GateInput) -> Vec<String> {
    let mut blockers = Vec::new();
    let missing = &input.coverage.missing;

    if input.tier >= 3 && !missing.is_empty() {
        blockers.push(format!("missing coverage: {}", area_list(missing)));
    } else if input.tier < 3 && missing.len() > 2 {
        blockers.push(format!("foundation gaps: {}", area_list(missing)));
    }

    if input.low_quality_count > 0 {
        blockers.push(format!("{} answer(s) scored below 3", input.low_quality_count));
    }

    if input.unresolved_critical > 0 {
        blockers.push(format!(
            "{} unresolved critical contradiction(s) — must resolve before spec",
            input.unresolved_critical
        ));
    }

    if input.unaddressed_critical_signals > 0 {
        blockers.push(format!(
            "{} critical signal(s) not addressed",
            input.unaddressed_critical_signals
        ));
    }

    blockers
}

pub fn clarity_score(coverage: &Coverage) -> u32 {
    let ratio = coverage.covered_required() as f64 / Area::REQUIRED.len() as f64;
    (ratio * 100.0).round() as u32
}

/// Run the gate
pub fn evaluate(input: &GateInput, config: &EngineConfig) -> Readiness {
    let blockers = blockers(input);

    let aporia_block = input.unresolved_critical > 0 && !config.tier_bypasses_aporia;
    let ready_for_spec = !aporia_block
        && (input.tier >= 4
            || (blockers.is_empty() && input.total_answers >= config.min_answers_for_ready));

    let next_step = if ready_for_spec {
        "Ready for specification. Hand the session to the spec writer.".to_string()
    } else if input.unresolved_critical > 0 {
        format!(
            "Resolve {} critical contradiction(s) before continuing.",
            input.unresolved_critical
        )
    } else if !input.coverage.missing.is_empty() {
        format!(
            "Answer questions covering: {}.",
            area_list(&input.coverage.missing)
        )
    } else if !blockers.is_empty() {
        "Address the listed blockers and submit another round.".to_string()
    } else {
        format!(
            "Submit more answers ({} of {} so far).",
            input.total_answers, config.min_answers_for_ready
        )
    };

    tracing::debug!(
        tier = input.tier,
        blockers = blockers.len(),
        ready = ready_for_spec,
        "Readiness evaluated"
    );

    Readiness {
        ready_for_spec,
        blockers,
        clarity_score: clarity_score(input.coverage),
        next_step,
    }
}

/// Fold a verdict into the session: scores, blockers, status
pub fn advance(
    session: &mut InterrogationSession,
    tier: u8,
    average_score: Option<f64>,
    readiness: &Readiness,
) {
    session.scores.push(RoundScore {
        round: session.round,
        tier,
        clarity_score: readiness.clarity_score,
        average_score,
        ready: readiness.ready_for_spec,
    });
    session.blockers = readiness.blockers.clone();
    session.ready_for_spec = readiness.ready_for_spec;

    // Complete is terminal
    session.status = match (session.status, readiness.ready_for_spec) {
        (SessionStatus::Complete, _) | (_, true) => SessionStatus::Complete,
        _ => SessionStatus::InProgress,
    };
    session.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epic::Epic;
    use uuid::Uuid;

    fn answer(area: Area, text: &str) -> Answer {
        Answer {
            id: Uuid::new_v4().to_string(),
            question_id: Uuid::new_v4().to_string(),
            area,
            question: format!("About {}?", area),
            text: text.to_string(),
            score: Some(4),
            round: 1,
            answered_at: Utc::now(),
        }
    }

    fn four_required() -> Vec<Answer> {
        vec![
            answer(Area::Scope, "Export invoices as CSV"),
            answer(Area::Success, "Finance can reconcile in under 5 minutes"),
            answer(Area::Constraint, "Must ship by March"),
            answer(Area::Risk, "Large exports may time out"),
        ]
    }

    fn input(coverage: &Coverage, tier: u8, answers: usize) -> GateInput<'_> {
        GateInput {
            coverage,
            tier,
            low_quality_count: 0,
            unresolved_critical: 0,
            unaddressed_critical_signals: 0,
            total_answers: answers,
        }
    }

    #[test]
    fn test_four_required_answers_are_ready() {
        let answers = four_required();
        let coverage = Coverage::from_answers(&answers);
        let result = evaluate(&input(&coverage, 2, answers.len()), &EngineConfig::default());

        assert!(result.blockers.is_empty());
        assert!(result.ready_for_spec);
        assert_eq!(result.clarity_score, 100);
        assert!(coverage.missing.is_empty());
        assert!(!coverage.technical);
    }

    #[test]
    fn test_missing_coverage_vs_foundation_gaps() {
        let answers = vec![answer(Area::Scope, "Export invoices")];
        let coverage = Coverage::from_answers(&answers);
        assert_eq!(coverage.missing, vec![Area::Success, Area::Constraint, Area::Risk]);
        assert_eq!(clarity_score(&coverage), 25);

        let high = blockers(&input(&coverage, 3, 1));
        assert_eq!(high, vec!["missing coverage: success, constraint, risk".to_string()]);

        let low = blockers(&input(&coverage, 2, 1));
        assert_eq!(low, vec!["foundation gaps: success, constraint, risk".to_string()]);

        // Two gaps at a low tier are tolerated
        let two = Coverage::from_answers(&[answer(Area::Scope, "x"), answer(Area::Risk, "y")]);
        assert!(blockers(&input(&two, 1, 2)).is_empty());
    }

    #[test]
    fn test_all_blockers_accumulate() {
        let coverage = Coverage::from_answers(&[]);
        let gate = GateInput {
            coverage: &coverage,
            tier: 3,
            low_quality_count: 2,
            unresolved_critical: 1,
            unaddressed_critical_signals: 3,
            total_answers: 5,
        };
        let result = blockers(&gate);
        assert_eq!(result.len(), 4);
        assert_eq!(result[1], "2 answer(s) scored below 3");
        assert_eq!(result[2], "1 unresolved critical contradiction(s) — must resolve before spec");
        assert_eq!(result[3], "3 critical signal(s) not addressed");
    }

    #[test]
    fn test_critical_contradiction_blocks_below_tier_four() {
        let answers = four_required();
        let coverage = Coverage::from_answers(&answers);
        let mut gate = input(&coverage, 3, answers.len());
        gate.unresolved_critical = 1;

        let result = evaluate(&gate, &EngineConfig::default());
        assert!(!result.ready_for_spec);
        assert!(result.next_step.contains("Resolve 1 critical"));
    }

    #[test]
    fn test_aporia_blocks_high_tier_unless_bypassed() {
        let answers = four_required();
        let coverage = Coverage::from_answers(&answers);
        let mut gate = input(&coverage, 5, answers.len());
        gate.unresolved_critical = 1;

        assert!(!evaluate(&gate, &EngineConfig::default()).ready_for_spec);

        let bypass = EngineConfig {
            tier_bypasses_aporia: true,
            ..EngineConfig::default()
        };
        assert!(evaluate(&gate, &bypass).ready_for_spec);
    }

    #[test]
    fn test_high_tier_ready_without_answers() {
        let coverage = Coverage::from_answers(&[]);
        let result = evaluate(&input(&coverage, 4, 0), &EngineConfig::default());
        assert!(result.ready_for_spec);
        assert!(!result.blockers.is_empty());
    }

    #[test]
    fn test_too_few_answers_not_ready() {
        let answers = four_required();
        let coverage = Coverage::from_answers(&answers);
        let config = EngineConfig {
            min_answers_for_ready: 5,
            ..EngineConfig::default()
        };
        let result = evaluate(&input(&coverage, 2, answers.len()), &config);
        assert!(!result.ready_for_spec);
        assert!(result.next_step.contains("4 of 5"));
    }

    #[test]
    fn test_blank_answer_does_not_cover() {
        let coverage = Coverage::from_answers(&[answer(Area::Scope, "   ")]);
        assert!(!coverage.scope);
    }

    #[test]
    fn test_advance_status() {
        let mut session = InterrogationSession::new(Epic::ingest("Build a dashboard."), 1);
        let not_ready = Readiness {
            ready_for_spec: false,
            blockers: vec!["foundation gaps: scope, success, constraint, risk".to_string()],
            clarity_score: 0,
            next_step: String::new(),
        };
        advance(&mut session, 1, None, &not_ready);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.blockers.len(), 1);

        let ready = Readiness {
            ready_for_spec: true,
            blockers: vec![],
            clarity_score: 100,
            next_step: String::new(),
        };
        advance(&mut session, 3, Some(4.0), &ready);
        assert_eq!(session.status, SessionStatus::Complete);
        assert!(session.ready_for_spec);

        advance(&mut session, 3, Some(2.0), &not_ready);
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.scores.len(), 3);
    }
}
