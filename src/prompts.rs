//! Prompts for the optional semantic reviewer
//!
//! Section headers are a contract with downstream parsers and tests. The
//! prose around them may change freely.

use crate::specificity::QualityAssessment;
use crate::types::{Contradiction, CoverageLevel, Premise};

pub const SECTION_EPIC: &str = "## Epic Content";
pub const SECTION_METRICS: &str = "## Quality Metrics";
pub const SECTION_INDICATORS: &str = "## Specificity Indicators";
pub const SECTION_COVERAGE: &str = "## Area Coverage";
pub const SECTION_TASK: &str = "## Task";
pub const SECTION_OUTPUT: &str = "## Output Format";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn level_name(level: CoverageLevel) -> &'static str {
    match level {
        CoverageLevel::Absent => "absent",
        CoverageLevel::Mentioned => "mentioned",
        CoverageLevel::Detailed => "detailed",
    }
}

/// Build the analysis prompt for an epic and its assessment
pub fn analysis_prompt(text: &str, assessment: &QualityAssessment) -> String {
    let ind = &assessment.indicators;
    let m = &assessment.metrics;

    let vague = if ind.vague_phrases.is_empty() {
        "none".to_string()
    } else {
        ind.vague_phrases
            .iter()
            .map(|p| format!("\"{}\"", p))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let coverage = assessment
        .area_coverage
        .iter()
        .map(|c| {
            let missing = if c.missing.is_empty() {
                String::new()
            } else {
                format!(" (missing: {})", c.missing.join("; "))
            };
            format!("- {}: {}{}", c.area, level_name(c.level), missing)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are reviewing a feature request before it is turned into a specification.

{epic_h}
{text}

{metrics_h}
- Tier: {tier}/5 ({strategy})
- Statements: {statements}
- Clarity: {clarity}/100
- Specificity: {specificity}/100
- Coverage: {coverage_score}/100

{ind_h}
- Numbers: {numbers}
- Units: {units}
- Actors: {actors}
- Testable conditions: {conditions}
- Technology: {technology}
- Vague phrases: {vague}

{cov_h}
{coverage}

{task_h}
Identify the gaps that would block a developer from building this. Quote vague
phrases verbatim and say what number or rule would replace each one.

{out_h}
Respond with JSON only:
{{"signals": [{{"description": "...", "severity": "critical|high|medium|low"}}],
  "questions": [{{"area": "scope|success|constraint|risk|technical|stakeholder", "text": "..."}}]}}
"#,
        epic_h = SECTION_EPIC,
        metrics_h = SECTION_METRICS,
        ind_h = SECTION_INDICATORS,
        cov_h = SECTION_COVERAGE,
        task_h = SECTION_TASK,
        out_h = SECTION_OUTPUT,
        text = text,
        tier = assessment.tier,
        strategy = assessment.strategy.name(),
        statements = m.statement_count,
        clarity = m.clarity_score,
        specificity = m.specificity_score,
        coverage_score = m.coverage_score,
        numbers = yes_no(ind.has_numbers),
        units = yes_no(ind.has_units),
        actors = yes_no(ind.has_actors),
        conditions = yes_no(ind.has_testable_conditions),
        technology = yes_no(ind.has_technology),
        vague = vague,
        coverage = coverage,
    )
}

/// Ask the reviewer which recorded premises cannot all hold
pub fn contradiction_prompt(premises: &[Premise], recorded: &[Contradiction]) -> String {
    let listed = premises
        .iter()
        .map(|p| format!("- [{}] ({}) {}", p.id, p.premise_type.name(), p.statement))
        .collect::<Vec<_>>()
        .join("\n");

    let known = if recorded.is_empty() {
        "- (none)".to_string()
    } else {
        recorded
            .iter()
            .map(|c| {
                let state = match &c.resolution {
                    Some(resolution) if c.resolved => format!("settled: {}", resolution),
                    _ => "open".to_string(),
                };
                format!("- [{}] {} ({})", c.premise_ids.join(", "), c.description, state)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"These are commitments a stakeholder made while describing a feature.

## Premises
{listed}

## Already Recorded
{known}

## Task
Find pairs or groups of premises that cannot all be true at once. Ignore
premises that merely overlap. Do not report a group listed under Already
Recorded; settled conflicts stay settled. Use the ids in brackets.

## Output Format
Respond with JSON only:
[{{"premiseIds": ["id-1", "id-2"], "description": "...", "severity": "critical|high|medium|low"}}]
Return [] when nothing conflicts.
"#,
        listed = listed,
        known = known,
    )
}

/// Ask the reviewer for follow-up questions beyond the rule table
pub fn question_prompt(text: &str, assessment: &QualityAssessment, already_asked: &[String]) -> String {
    let asked = if already_asked.is_empty() {
        "- (none)".to_string()
    } else {
        already_asked
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let focus = assessment
        .suggested_focus
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"{epic_h}
{text}

## Already Asked
{asked}

{task_h}
Write at most 2 new follow-up questions that would make this requirement
testable. Focus on: {focus}. Do not repeat questions already asked.

{out_h}
Respond with JSON only:
[{{"area": "scope|success|constraint|risk|technical|stakeholder", "text": "..."}}]
"#,
        epic_h = SECTION_EPIC,
        task_h = SECTION_TASK,
        out_h = SECTION_OUTPUT,
        text = text,
        asked = asked,
        focus = focus,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specificity::analyze;
    use crate::types::PremiseType;

    #[test]
    fn test_analysis_prompt_sections_in_order() {
        let text = "Build a dashboard. It should be fast and user-friendly.";
        let prompt = analysis_prompt(text, &analyze(text));

        let positions: Vec<usize> = [
            SECTION_EPIC,
            SECTION_METRICS,
            SECTION_INDICATORS,
            SECTION_COVERAGE,
            SECTION_TASK,
            SECTION_OUTPUT,
        ]
        .iter()
        .map(|h| prompt.find(h).unwrap_or_else(|| panic!("missing {}", h)))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(prompt.contains("\"fast\""));
        assert!(prompt.contains(text));
    }

    #[test]
    fn test_contradiction_prompt_lists_ids() {
        let premises = vec![Premise {
            id: "p-1".to_string(),
            statement: "All users can export".to_string(),
            premise_type: PremiseType::Capability,
            confidence: 0.8,
            answer_id: "a-1".to_string(),
        }];
        let prompt = contradiction_prompt(&premises, &[]);
        assert!(prompt.contains("[p-1] (capability) All users can export"));
        assert!(prompt.contains("## Already Recorded\n- (none)"));
    }

    #[test]
    fn test_contradiction_prompt_marks_settled_conflicts() {
        let settled = Contradiction {
            id: "c-1".to_string(),
            premise_ids: vec!["p1".to_string(), "p2".to_string()],
            description: "Export of PII is unrestricted".to_string(),
            severity: crate::types::Severity::Critical,
            resolved: true,
            resolution: Some("Only admins can export PII".to_string()),
            detected_at: chrono::Utc::now(),
            resolved_at: Some(chrono::Utc::now()),
        };
        let prompt = contradiction_prompt(&[], &[settled]);
        assert!(prompt.contains(
            "- [p1, p2] Export of PII is unrestricted (settled: Only admins can export PII)"
        ));
    }
}
