//! Specificity Analyzer
//!
//! Scores how vague or concrete a requirement is and picks how hard to
//! interrogate it. Pure rules, no judgment: the same text always yields
//! the same tier.
//!
//! Pipeline: indicators -> metrics -> area coverage -> tier -> strategy.

use serde::{Deserialize, Serialize};

use crate::patterns::{self, has_any_term};
use crate::types::{Area, CoverageLevel, Strategy};

/// Binary evidence found in the text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecificityIndicators {
    pub has_numbers: bool,
    pub has_units: bool,
    pub has_actors: bool,
    pub has_testable_conditions: bool,
    pub has_technology: bool,
    pub has_vague_language: bool,
    /// Matched vague phrases, verbatim, in order of appearance
    pub vague_phrases: Vec<String>,
    pub technologies: Vec<String>,
}

/// Derived 0-100 scores
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub statement_count: usize,
    pub clarity_score: u32,
    pub specificity_score: u32,
    pub coverage_score: u32,
}

/// Coverage of one area against its checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AreaCoverage {
    pub area: Area,
    pub level: CoverageLevel,
    pub covered: Vec<String>,
    /// Checklist questions nothing in the text answers yet
    pub missing: Vec<String>,
}

/// Full assessment of a body of requirement text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityAssessment {
    pub tier: u8,
    pub strategy: Strategy,
    pub indicators: SpecificityIndicators,
    pub area_coverage: Vec<AreaCoverage>,
    pub metrics: QualityMetrics,
    /// Areas not yet detailed, required areas first
    pub suggested_focus: Vec<Area>,
}

impl QualityAssessment {
    pub fn coverage_for(&self, area: Area) -> Option<&AreaCoverage> {
        self.area_coverage.iter().find(|c| c.area == area)
    }

    pub fn level(&self, area: Area) -> CoverageLevel {
        self.coverage_for(area)
            .map(|c| c.level)
            .unwrap_or(CoverageLevel::Absent)
    }
}

// ============================================================================
// AREA CHECKLISTS
// ============================================================================

struct ChecklistItem {
    label: &'static str,
    terms: &'static [&'static str],
}

const SCOPE_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "What problem does this solve, and for whom?",
        terms: &["problem", "goal", "purpose", "objective", "pain", "so that", "in order to"],
    },
    ChecklistItem {
        label: "Which features are in scope?",
        terms: &["scope", "feature", "include", "support", "provide", "allow", "enable"],
    },
    ChecklistItem {
        label: "Who are the primary users?",
        terms: &["user", "customer", "admin", "persona", "actor", "member", "role"],
    },
    ChecklistItem {
        label: "What is explicitly out of scope?",
        terms: &["out of scope", "not include", "exclude", "won't", "will not", "non-goal"],
    },
];

const SUCCESS_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "How will success be measured?",
        terms: &["metric", "measure", "kpi", "success", "track", "conversion", "adoption"],
    },
    ChecklistItem {
        label: "What are the acceptance criteria?",
        terms: &["acceptance", "criteria", "done when", "verify", "test", "given"],
    },
    ChecklistItem {
        label: "What numeric targets must be met?",
        terms: &["target", "percent", "sla", "slo", "threshold", "at least", "under", "within"],
    },
];

const CONSTRAINT_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "What is the delivery timeline?",
        terms: &["deadline", "timeline", "launch", "release", "sprint", "quarter", "q1", "q2", "q3", "q4"],
    },
    ChecklistItem {
        label: "What budget or resource limits apply?",
        terms: &["budget", "cost", "price", "headcount", "resource", "$"],
    },
    ChecklistItem {
        label: "Which compliance or regulatory rules apply?",
        terms: &["compliance", "comply", "gdpr", "hipaa", "soc", "pci", "regulat", "legal", "pii"],
    },
    ChecklistItem {
        label: "Which technical limits must be respected?",
        terms: &["must", "cannot", "can't", "limit", "constraint", "compatible", "only"],
    },
];

const RISK_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "What could go wrong?",
        terms: &["risk", "fail", "outage", "break", "downtime", "loss", "attack"],
    },
    ChecklistItem {
        label: "How will failures be mitigated?",
        terms: &["mitigat", "fallback", "rollback", "retry", "backup", "recover", "redundan"],
    },
    ChecklistItem {
        label: "Which dependencies could block delivery?",
        terms: &["depend", "third-party", "third party", "vendor", "external", "upstream"],
    },
];

const TECHNICAL_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "Which technology stack will be used?",
        terms: &["stack", "framework", "language", "library", "platform", "database"],
    },
    ChecklistItem {
        label: "What data must be stored or processed?",
        terms: &["data", "store", "schema", "persist", "record", "table"],
    },
    ChecklistItem {
        label: "What performance is required?",
        terms: &["latency", "throughput", "performance", "load", "concurrent", "rps", "response time"],
    },
    ChecklistItem {
        label: "Which integrations or interfaces are needed?",
        terms: &["api", "integrat", "webhook", "endpoint", "interface", "import", "export"],
    },
];

const STAKEHOLDER_CHECKLIST: &[ChecklistItem] = &[
    ChecklistItem {
        label: "Who owns this feature?",
        terms: &["owner", "owns", "product manager", "sponsor", "responsible"],
    },
    ChecklistItem {
        label: "Who approves the result?",
        terms: &["approve", "sign-off", "sign off", "stakeholder", "review"],
    },
    ChecklistItem {
        label: "Who else is affected by the change?",
        terms: &["affect", "impact", "team", "department", "support staff"],
    },
];

fn checklist(area: Area) -> &'static [ChecklistItem] {
    match area {
        Area::Scope => SCOPE_CHECKLIST,
        Area::Success => SUCCESS_CHECKLIST,
        Area::Constraint => CONSTRAINT_CHECKLIST,
        Area::Risk => RISK_CHECKLIST,
        Area::Technical => TECHNICAL_CHECKLIST,
        Area::Stakeholder => STAKEHOLDER_CHECKLIST,
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Analyze text (an epic alone, or epic plus accumulated answers)
pub fn analyze(text: &str) -> QualityAssessment {
    let lower = text.to_lowercase();
    let statements = patterns::split_statements(text);

    let indicators = detect_indicators(text, &lower);
    // "user-friendly" says nothing about users
    let evidence = patterns::strip_vague(&lower);
    let area_coverage: Vec<AreaCoverage> = Area::ALL
        .iter()
        .map(|&area| assess_area(area, &evidence))
        .collect();

    let (_, vague_hits) = patterns::find_vague_phrases(text);
    let metrics = QualityMetrics {
        statement_count: statements.len(),
        clarity_score: clarity_score(statements.len(), vague_hits),
        specificity_score: specificity_score(&indicators),
        coverage_score: coverage_score(&area_coverage),
    };

    let tier = derive_tier(&metrics);
    let strategy = strategy_for_tier(tier);
    let suggested_focus = area_coverage
        .iter()
        .filter(|c| c.level != CoverageLevel::Detailed)
        .map(|c| c.area)
        .collect();

    tracing::debug!(
        tier,
        strategy = strategy.name(),
        clarity = metrics.clarity_score,
        specificity = metrics.specificity_score,
        coverage = metrics.coverage_score,
        "Specificity assessed"
    );

    QualityAssessment {
        tier,
        strategy,
        indicators,
        area_coverage,
        metrics,
        suggested_focus,
    }
}

pub fn detect_indicators(text: &str, lower: &str) -> SpecificityIndicators {
    let (vague_phrases, _) = patterns::find_vague_phrases(text);
    let technologies: Vec<String> = patterns::technologies(lower)
        .into_iter()
        .map(String::from)
        .collect();

    SpecificityIndicators {
        has_numbers: patterns::NUMBER_RE.is_match(text),
        has_units: patterns::UNIT_RE.is_match(text),
        has_actors: patterns::has_actors(lower),
        has_testable_conditions: patterns::CONDITION_RE.is_match(text),
        has_technology: !technologies.is_empty(),
        has_vague_language: !vague_phrases.is_empty(),
        vague_phrases,
        technologies,
    }
}

fn assess_area(area: Area, lower: &str) -> AreaCoverage {
    let items = checklist(area);
    let mut covered = Vec::new();
    let mut missing = Vec::new();

    for item in items {
        if has_any_term(lower, item.terms) {
            covered.push(item.label.to_string());
        } else {
            missing.push(item.label.to_string());
        }
    }

    let level = match covered.len() {
        0 => CoverageLevel::Absent,
        n if n >= 2 && n * 2 >= items.len() => CoverageLevel::Detailed,
        _ => CoverageLevel::Mentioned,
    };

    AreaCoverage {
        area,
        level,
        covered,
        missing,
    }
}

/// 100 minus a penalty for vague hits per statement
pub fn clarity_score(statement_count: usize, vague_hits: usize) -> u32 {
    if statement_count == 0 {
        return 0;
    }
    let ratio = vague_hits as f64 / statement_count as f64;
    (100.0 - ratio * 50.0).clamp(0.0, 100.0).round() as u32
}

/// Weighted sum of indicator presence. Only positive weights, so adding
/// evidence can never lower the score.
pub fn specificity_score(indicators: &SpecificityIndicators) -> u32 {
    let weights = [
        (indicators.has_numbers, 25),
        (indicators.has_units, 25),
        (indicators.has_actors, 15),
        (indicators.has_testable_conditions, 20),
        (indicators.has_technology, 15),
    ];
    weights
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, w)| w)
        .sum::<u32>()
        .min(100)
}

/// Share of the five scored areas with any keyword hit
pub fn coverage_score(area_coverage: &[AreaCoverage]) -> u32 {
    let hit = area_coverage
        .iter()
        .filter(|c| Area::SCORED.contains(&c.area) && c.level != CoverageLevel::Absent)
        .count();
    (hit * 100 / Area::SCORED.len()) as u32
}

/// Combine metrics into a 1-5 tier
pub fn derive_tier(metrics: &QualityMetrics) -> u8 {
    if metrics.statement_count == 0 {
        return 1;
    }

    let score = 0.25 * metrics.clarity_score as f64
        + 0.40 * metrics.specificity_score as f64
        + 0.35 * metrics.coverage_score as f64;

    let mut tier: u8 = match score {
        s if s < 25.0 => 1,
        s if s < 45.0 => 2,
        s if s < 65.0 => 3,
        s if s < 80.0 => 4,
        _ => 5,
    };

    // A couple of sentences cannot carry a complete requirement
    if metrics.statement_count < 3 {
        tier = tier.min(2);
    } else if metrics.statement_count < 6 {
        tier = tier.min(4);
    }

    tier.clamp(1, 5)
}

/// Static tier -> strategy table
pub fn strategy_for_tier(tier: u8) -> Strategy {
    match tier.clamp(1, 5) {
        1 | 2 => Strategy::Comprehensive,
        3 => Strategy::Targeted,
        4 => Strategy::Validation,
        _ => Strategy::Minimal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECIFIC_EPIC: &str = "Customers can export their order history as CSV. \
        When an export is requested, then the file is emailed within 5 minutes. \
        The export API must respond in under 200ms for 10,000 concurrent users. \
        Data is stored in Postgres and encrypted at rest to meet GDPR compliance. \
        Risk: the email vendor may fail, so we retry with a fallback queue. \
        Success is measured by 30% fewer support tickets. \
        The deadline is Q3 and the budget is fixed. \
        Bulk exports for admins are out of scope.";

    #[test]
    fn test_tier_always_in_range() {
        let fixtures = [
            "",
            " ",
            "...",
            "x",
            "Build a dashboard. It should be fast and user-friendly.",
            SPECIFIC_EPIC,
            "fast fast fast fast fast fast fast fast fast fast",
        ];
        for text in fixtures {
            let assessment = analyze(text);
            assert!(
                (1..=5).contains(&assessment.tier),
                "tier {} out of range for {:?}",
                assessment.tier,
                text
            );
        }
    }

    #[test]
    fn test_empty_text_is_lowest_evidence() {
        let assessment = analyze("");
        assert_eq!(assessment.metrics.statement_count, 0);
        assert_eq!(assessment.tier, 1);
        assert_eq!(assessment.strategy, Strategy::Comprehensive);
    }

    #[test]
    fn test_strategy_table() {
        let table = [
            (1, Strategy::Comprehensive),
            (2, Strategy::Comprehensive),
            (3, Strategy::Targeted),
            (4, Strategy::Validation),
            (5, Strategy::Minimal),
        ];
        for (tier, expected) in table {
            assert_eq!(strategy_for_tier(tier), expected);
        }
        // Out-of-range input still maps through the clamped table
        assert_eq!(strategy_for_tier(0), Strategy::Comprehensive);
        assert_eq!(strategy_for_tier(9), Strategy::Minimal);
    }

    #[test]
    fn test_area_coverage_enumerates_each_area_once() {
        for text in ["", "Build a dashboard.", SPECIFIC_EPIC] {
            let assessment = analyze(text);
            assert_eq!(assessment.area_coverage.len(), Area::ALL.len());
            for area in Area::ALL {
                let count = assessment
                    .area_coverage
                    .iter()
                    .filter(|c| c.area == area)
                    .count();
                assert_eq!(count, 1, "{} appears {} times", area, count);
            }
        }
    }

    #[test]
    fn test_scenario_vague_dashboard() {
        let assessment = analyze("Build a dashboard. It should be fast and user-friendly.");
        assert!(assessment.tier <= 2);
        assert_eq!(assessment.strategy, Strategy::Comprehensive);
        assert!(assessment.indicators.vague_phrases.contains(&"fast".to_string()));
        assert!(assessment
            .indicators
            .vague_phrases
            .contains(&"user-friendly".to_string()));
        assert!(assessment.indicators.has_vague_language);
    }

    #[test]
    fn test_scenario_quantified_latency() {
        let assessment =
            analyze("The search API must respond in under 200ms for 10,000 concurrent users.");
        assert!(assessment.indicators.has_numbers);
        assert!(assessment.indicators.has_units);
        assert!(assessment.metrics.specificity_score > 60);
    }

    #[test]
    fn test_evidence_never_lowers_specificity() {
        let base = [
            "Build a reporting page.",
            "Make the checkout nicer. It should be fast.",
            "Sync invoices nightly.",
        ];
        let evidence = [
            " It handles 500 requests per second.",
            " Pages load in under 2 seconds.",
            " Admins and customers use it.",
            " Finance managers review it.",
        ];
        for text in base {
            let before = analyze(text).metrics.specificity_score;
            for extra in evidence {
                let after = analyze(&format!("{}{}", text, extra)).metrics.specificity_score;
                assert!(after >= before, "{:?} + {:?}: {} < {}", text, extra, after, before);
            }
        }
    }

    #[test]
    fn test_long_repetitive_text_is_bounded() {
        let text = "It must be fast and easy and scalable. ".repeat(5_000);
        let assessment = analyze(&text);
        assert!(assessment.metrics.clarity_score <= 100);
        assert!(assessment.metrics.specificity_score <= 100);
        assert!(assessment.metrics.coverage_score <= 100);
        assert!((1..=5).contains(&assessment.tier));
    }

    #[test]
    fn test_analysis_time_grows_with_input_size() {
        let small = "easy ".repeat(5_000);
        let large = "easy ".repeat(20_000);

        let started = std::time::Instant::now();
        analyze(&small);
        let small_time = started.elapsed();

        let started = std::time::Instant::now();
        let assessment = analyze(&large);
        let large_time = started.elapsed();

        assert_eq!(assessment.indicators.vague_phrases, vec!["easy".to_string()]);
        assert!(large_time < std::time::Duration::from_secs(3), "took {:?}", large_time);
        // 4x the input; quadratic growth would be ~16x
        assert!(
            large_time <= small_time * 10 + std::time::Duration::from_millis(50),
            "{:?} vs {:?}",
            large_time,
            small_time
        );
    }

    #[test]
    fn test_specific_epic_scores_high() {
        let assessment = analyze(SPECIFIC_EPIC);
        assert!(assessment.indicators.has_testable_conditions);
        assert!(assessment.indicators.has_technology);
        assert!(assessment.tier >= 4, "tier {}", assessment.tier);
        assert_eq!(assessment.metrics.coverage_score, 100);
    }

    #[test]
    fn test_suggested_focus_puts_required_areas_first() {
        let assessment = analyze("Build a dashboard.");
        let focus = &assessment.suggested_focus;
        let first_optional = focus.iter().position(|a| !a.is_required());
        let last_required = focus.iter().rposition(|a| a.is_required());
        if let (Some(opt), Some(req)) = (first_optional, last_required) {
            assert!(req < opt);
        }
        assert!(focus.contains(&Area::Risk));
    }

    #[test]
    fn test_missing_lists_unmatched_checklist_items() {
        let assessment = analyze("The deadline is March.");
        let constraint = assessment.coverage_for(Area::Constraint).unwrap();
        assert_eq!(constraint.level, CoverageLevel::Mentioned);
        assert_eq!(constraint.covered, vec!["What is the delivery timeline?"]);
        assert!(constraint
            .missing
            .contains(&"What budget or resource limits apply?".to_string()));
    }

    #[test]
    fn test_clarity_penalizes_vague_ratio() {
        assert_eq!(clarity_score(0, 0), 0);
        assert_eq!(clarity_score(2, 0), 100);
        assert_eq!(clarity_score(2, 2), 50);
        assert_eq!(clarity_score(1, 10), 0);
    }
}
