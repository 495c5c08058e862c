//! Question Strategy Selector
//!
//! A deterministic, tier-banded rule table. Bands are applied in tier
//! order and accumulate; the result is then capped by tier:
//!
//! ```text
//! tier <= 2   foundation   problem, actors, verification      critical
//! tier 2-3    extraction   numbers, performance, limits       high
//! tier 3-4    targeted     risk, security, checklist gaps     high/medium
//! tier >= 4   refinement   edge cases, out of scope           medium
//! tier = 5    validation   anything missing, conflicts        medium
//! fallback    vague phrase quoted verbatim                    medium
//! ```

use crate::patterns;
use crate::specificity::QualityAssessment;
use crate::types::{Answer, Area, CoverageLevel, Priority, Question};

/// Everything the selector looks at
pub struct QuestionContext<'a> {
    pub tier: u8,
    pub assessment: &'a QualityAssessment,
    /// Text of every question already asked in the session
    pub asked: &'a [String],
    pub answers: &'a [Answer],
    pub epic_text: &'a str,
    /// Acceptance criteria hinted at in the epic
    pub has_acceptance_criteria: bool,
}

/// Maximum questions per round for a tier
pub fn question_budget(tier: u8) -> usize {
    match tier {
        0..=2 => 5,
        3 | 4 => 4,
        _ => 3,
    }
}

pub const CORE_PROBLEM_QUESTION: &str =
    "What is the core problem this solves, in one sentence?";
pub const ACTORS_QUESTION: &str =
    "Who are the users or actors involved, and what can each of them do?";
pub const VERIFY_QUESTION: &str =
    "How will you verify this works? Describe one acceptance test as \"when X happens, then Y\".";
pub const QUANTIFY_QUESTION: &str =
    "Which of your qualitative claims can you put a number on? Give a target for each.";
pub const PERFORMANCE_QUESTION: &str =
    "What are the explicit performance targets: response time, throughput, and data volume?";
pub const LIMITS_QUESTION: &str =
    "What hard limits apply: timeline, budget, or compliance requirements?";
pub const RISK_QUESTION: &str =
    "What is the biggest risk to this work, and how will you mitigate it?";
pub const SECURITY_QUESTION: &str =
    "Who is allowed to access this data, and how is it protected?";
pub const EDGE_CASE_QUESTION: &str =
    "What should happen with empty input, at maximum scale, and under concurrent modification?";
pub const OUT_OF_SCOPE_QUESTION: &str = "What is explicitly out of scope for this work?";
pub const MISSING_QUESTION: &str = "Is anything missing from these requirements?";
pub const CONFLICT_QUESTION: &str = "Do any two of these requirements conflict with each other?";

/// Produce ordered, capped candidate questions for the next round
pub fn select_questions(ctx: &QuestionContext<'_>) -> Vec<Question> {
    let tier = ctx.tier.clamp(1, 5);
    let assessment = ctx.assessment;
    let ind = &assessment.indicators;
    let mut out = Candidates::new(ctx.asked);

    // Foundation
    if tier <= 2 {
        if assessment.level(Area::Scope) != CoverageLevel::Detailed {
            out.push(Area::Scope, Priority::Critical, CORE_PROBLEM_QUESTION, "scope is not detailed");
        }
        if !ind.has_actors {
            out.push(Area::Stakeholder, Priority::Critical, ACTORS_QUESTION, "no actors detected");
        }
        if !ind.has_testable_conditions && !ctx.has_acceptance_criteria {
            out.push(Area::Success, Priority::Critical, VERIFY_QUESTION, "no testable condition or acceptance criterion");
        }
    }

    // Extraction
    if (2..=3).contains(&tier) {
        if !ind.has_numbers {
            out.push(Area::Success, Priority::High, QUANTIFY_QUESTION, "no numeric evidence");
        }
        if assessment.metrics.specificity_score < 50 {
            out.push(
                Area::Technical,
                Priority::High,
                PERFORMANCE_QUESTION,
                format!("specificity score {} below 50", assessment.metrics.specificity_score),
            );
        }
        if assessment.level(Area::Constraint) != CoverageLevel::Detailed {
            out.push(Area::Constraint, Priority::High, LIMITS_QUESTION, "constraints are not detailed");
        }
    }

    // Targeted gaps
    if (3..=4).contains(&tier) {
        if assessment.level(Area::Risk) != CoverageLevel::Detailed {
            out.push(Area::Risk, Priority::High, RISK_QUESTION, "risk coverage is weak");
        }
        if mentions_data_without_security(ctx) {
            out.push(Area::Risk, Priority::High, SECURITY_QUESTION, "data mentioned without security language");
        }
        for coverage in assessment
            .area_coverage
            .iter()
            .filter(|c| c.level != CoverageLevel::Detailed)
            .take(2)
        {
            if let Some(item) = coverage.missing.first() {
                out.push(
                    coverage.area,
                    Priority::Medium,
                    item.clone(),
                    format!("{} checklist gap", coverage.area),
                );
            }
        }
    }

    // Refinement
    if tier >= 4 {
        out.push(Area::Technical, Priority::Medium, EDGE_CASE_QUESTION, "edge cases not confirmed");
        out.push(Area::Scope, Priority::Medium, OUT_OF_SCOPE_QUESTION, "out-of-scope not stated");
    }

    // Validation
    if tier == 5 {
        out.push(Area::Scope, Priority::Medium, MISSING_QUESTION, "final completeness check");
        out.push(Area::Constraint, Priority::Medium, CONFLICT_QUESTION, "final consistency check");
    }

    let budget = question_budget(tier);
    let mut questions = out.into_vec();
    questions.truncate(budget);

    // Fallback: pin down the first vague phrase
    if questions.len() < budget {
        if let Some(phrase) = ind.vague_phrases.first() {
            let text = vague_question(phrase);
            let already = ctx.asked.iter().any(|q| q.eq_ignore_ascii_case(&text))
                || questions.iter().any(|q| q.text == text);
            if !already {
                questions.push(Question::new(
                    Area::Success,
                    Priority::Medium,
                    text,
                    format!("vague phrase \"{}\"", phrase),
                ));
            }
        }
    }

    questions
}

/// Question quoting a vague phrase verbatim
pub fn vague_question(phrase: &str) -> String {
    format!(
        "You said \"{}\". What exactly does \"{}\" mean here, in measurable terms?",
        phrase, phrase
    )
}

fn mentions_data_without_security(ctx: &QuestionContext<'_>) -> bool {
    let mut lower = ctx.epic_text.to_lowercase();
    for answer in ctx.answers {
        lower.push('\n');
        lower.push_str(&answer.text.to_lowercase());
    }
    patterns::has_word(&lower, "data") && !patterns::has_security_language(&lower)
}

/// Accumulator that drops questions already asked or already queued
struct Candidates<'a> {
    asked: &'a [String],
    questions: Vec<Question>,
}

impl<'a> Candidates<'a> {
    fn new(asked: &'a [String]) -> Self {
        Self {
            asked,
            questions: Vec::new(),
        }
    }

    fn push(&mut self, area: Area, priority: Priority, text: impl Into<String>, rationale: impl Into<String>) {
        let text = text.into();
        let duplicate = self.asked.iter().any(|q| q.eq_ignore_ascii_case(&text))
            || self.questions.iter().any(|q| q.text.eq_ignore_ascii_case(&text));
        if !duplicate {
            self.questions.push(Question::new(area, priority, text, rationale));
        }
    }

    fn into_vec(self) -> Vec<Question> {
        self.questions
    }
}
