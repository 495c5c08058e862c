//! Fact Extractor
//!
//! Tags typed atomic claims inside a single answer. Each fact kind has its
//! own independent rule. Facts are not deduplicated across rounds; the
//! counts are a transparency signal, not a knowledge base.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    /// Numeric KPI with a unit
    Metric,
    /// Comparator plus value
    Threshold,
    /// Candidate domain noun
    Entity,
    /// "X has / relates to Y"
    Relationship,
    /// Modal language: must, cannot, should not
    Constraint,
    /// Named technology or approach choice
    Decision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub kind: FactKind,
    /// The matched span or sentence, verbatim
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
}

impl Fact {
    fn plain(kind: FactKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            value: None,
            unit: None,
            comparator: None,
        }
    }
}

/// Per-kind fact counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FactCounts {
    pub metrics: usize,
    pub thresholds: usize,
    pub entities: usize,
    pub relationships: usize,
    pub constraints: usize,
    pub decisions: usize,
    pub total: usize,
}

impl FactCounts {
    pub fn from_facts(facts: &[Fact]) -> Self {
        let mut counts = Self::default();
        for fact in facts {
            counts.add(fact.kind);
        }
        counts
    }

    pub fn add(&mut self, kind: FactKind) {
        match kind {
            FactKind::Metric => self.metrics += 1,
            FactKind::Threshold => self.thresholds += 1,
            FactKind::Entity => self.entities += 1,
            FactKind::Relationship => self.relationships += 1,
            FactKind::Constraint => self.constraints += 1,
            FactKind::Decision => self.decisions += 1,
        }
        self.total += 1;
    }

    pub fn merge(&mut self, other: &FactCounts) {
        self.metrics += other.metrics;
        self.thresholds += other.thresholds;
        self.entities += other.entities;
        self.relationships += other.relationships;
        self.constraints += other.constraints;
        self.decisions += other.decisions;
        self.total += other.total;
    }
}

static METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(%|percent\b|ms\b|milliseconds?\b|seconds?\b|secs?\b|minutes?\b|mins?\b|hours?\b|days?\b|weeks?\b|months?\b|kb\b|mb\b|gb\b|tb\b|rps\b|qps\b|tps\b|req/s\b|requests?\b|users?\b|orders?\b|records?\b|transactions?\b|events?\b)",
    )
    .expect("valid regex")
});

static THRESHOLD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(under|below|less than|fewer than|at most|no more than|up to|within|over|above|more than|greater than|at least|exceeds?|<=|>=|<|>)\s*(\d[\d,]*(?:\.\d+)?)",
    )
    .expect("valid regex")
});

static RELATIONSHIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b([a-z][\w-]*)\s+(has many|has one|has an?|has|have|belongs to|relates to|is linked to|contains|owns|references|depends on)\s+(?:an?\s+|the\s+|many\s+|one\s+|multiple\s+)?([a-z][\w-]*)",
    )
    .expect("valid regex")
});

static DETERMINER_NOUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:each|every|per|an?|the)\s+([a-z][a-z_-]{2,})").expect("valid regex")
});

static MODAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(must not|must|cannot|can't|can not|should not|shouldn't|shall not|shall|never|is required to|are required to)\b")
        .expect("valid regex")
});

static DECISION_VERB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(use|uses|using|chose|choose|chosen|going with|go with|decided|adopt|adopting|pick|picked|standardi[sz]e on|built on|build on)\b")
        .expect("valid regex")
});

static DECIDED_TO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:we(?:'ve| have)? decided to|we will|we'll|the decision is to)\s+([^.,;!?\n]+)")
        .expect("valid regex")
});

/// Words that follow determiners but are not domain nouns
const ENTITY_STOPWORDS: &[&str] = &[
    "same", "other", "first", "last", "next", "new", "old", "most", "best", "only", "whole",
    "system", "way", "time", "thing", "things", "case", "end", "start", "following", "above",
    "below", "number", "amount", "user", "users", "app", "application", "feature", "one",
    "moment", "day", "week", "month", "year", "rest", "right", "left", "top", "bottom",
];

const PRONOUNS: &[&str] = &["i", "we", "you", "they", "it", "he", "she", "this", "that", "who"];

/// Extract every fact from an answer. The question text is used only to
/// resolve entities the answer refers back to.
pub fn extract_facts(question: &str, answer: &str) -> Vec<Fact> {
    let mut facts = Vec::new();
    facts.extend(extract_metrics(answer));
    facts.extend(extract_thresholds(answer));
    facts.extend(extract_entities(question, answer));
    facts.extend(extract_relationships(answer));
    facts.extend(extract_constraints(answer));
    facts.extend(extract_decisions(answer));
    facts
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

pub fn extract_metrics(text: &str) -> Vec<Fact> {
    METRIC_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?.as_str();
            Some(Fact {
                kind: FactKind::Metric,
                text: whole.trim().to_string(),
                value: parse_number(cap.get(1)?.as_str()),
                unit: Some(cap.get(2)?.as_str().to_lowercase()),
                comparator: None,
            })
        })
        .collect()
}

pub fn extract_thresholds(text: &str) -> Vec<Fact> {
    THRESHOLD_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let comparator = normalize_comparator(cap.get(1)?.as_str());
            Some(Fact {
                kind: FactKind::Threshold,
                text: cap.get(0)?.as_str().trim().to_string(),
                value: parse_number(cap.get(2)?.as_str()),
                unit: None,
                comparator: Some(comparator.to_string()),
            })
        })
        .collect()
}

fn normalize_comparator(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "under" | "below" | "less than" | "fewer than" | "<" => "<",
        "at most" | "no more than" | "up to" | "within" | "<=" => "<=",
        "over" | "above" | "more than" | "greater than" | "exceeds" | "exceed" | ">" => ">",
        _ => ">=",
    }
}

/// Domain nouns: words after determiners plus capitalized mid-sentence
/// words, each reported once per answer
pub fn extract_entities(question: &str, answer: &str) -> Vec<Fact> {
    let mut seen: Vec<String> = Vec::new();
    let mut facts = Vec::new();
    let question_lower = question.to_lowercase();

    let mut push = |word: &str, facts: &mut Vec<Fact>| {
        let key = word.to_lowercase();
        let key = key.trim_end_matches('s').to_string();
        if key.len() < 3
            || ENTITY_STOPWORDS.contains(&word.to_lowercase().as_str())
            || patterns::VAGUE_PHRASES.contains(&word.to_lowercase().as_str())
            || seen.contains(&key)
        {
            return;
        }
        seen.push(key);
        facts.push(Fact::plain(FactKind::Entity, word));
    };

    for cap in DETERMINER_NOUN_RE.captures_iter(answer) {
        if let Some(m) = cap.get(1) {
            push(m.as_str(), &mut facts);
        }
    }

    for sentence in patterns::split_statements(answer) {
        for (i, word) in sentence.split_whitespace().enumerate() {
            if i == 0 {
                continue;
            }
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            let capitalized = word.chars().next().is_some_and(char::is_uppercase)
                && word.chars().skip(1).any(char::is_lowercase);
            if capitalized {
                push(word, &mut facts);
            }
        }
    }

    // Nouns the question introduced and the answer repeats
    for cap in DETERMINER_NOUN_RE.captures_iter(&question_lower) {
        if let Some(m) = cap.get(1) {
            if patterns::has_word(&answer.to_lowercase(), m.as_str()) {
                push(m.as_str(), &mut facts);
            }
        }
    }

    facts
}

pub fn extract_relationships(text: &str) -> Vec<Fact> {
    RELATIONSHIP_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let subject = cap.get(1)?.as_str();
            let object = cap.get(3)?.as_str();
            if PRONOUNS.contains(&subject.to_lowercase().as_str()) {
                return None;
            }
            Some(Fact {
                kind: FactKind::Relationship,
                text: cap.get(0)?.as_str().to_string(),
                value: None,
                unit: Some(format!("{} -> {}", subject.to_lowercase(), object.to_lowercase())),
                comparator: None,
            })
        })
        .collect()
}

/// One constraint per sentence that carries modal language
pub fn extract_constraints(text: &str) -> Vec<Fact> {
    patterns::split_statements(text)
        .into_iter()
        .filter(|s| MODAL_RE.is_match(s))
        .map(|s| Fact::plain(FactKind::Constraint, s))
        .collect()
}

/// Technologies named next to a decision verb, plus "we decided to X" phrases
pub fn extract_decisions(text: &str) -> Vec<Fact> {
    let mut facts = Vec::new();

    for sentence in patterns::split_statements(text) {
        let lower = sentence.to_lowercase();
        if DECISION_VERB_RE.is_match(sentence) {
            for tech in patterns::technologies(&lower) {
                facts.push(Fact::plain(FactKind::Decision, tech));
            }
        }
        for cap in DECIDED_TO_RE.captures_iter(sentence) {
            if let Some(m) = cap.get(1) {
                let choice = m.as_str().trim();
                if !choice.is_empty() && !facts.iter().any(|f: &Fact| choice.to_lowercase().contains(&f.text)) {
                    facts.push(Fact::plain(FactKind::Decision, choice));
                }
            }
        }
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(facts: &[Fact], kind: FactKind) -> Vec<&Fact> {
        facts.iter().filter(|f| f.kind == kind).collect()
    }

    #[test]
    fn test_metrics() {
        let facts = extract_metrics("p95 latency is 200ms and uptime is 99.9% for 10,000 users");
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].value, Some(200.0));
        assert_eq!(facts[0].unit.as_deref(), Some("ms"));
        assert_eq!(facts[1].value, Some(99.9));
        assert_eq!(facts[2].value, Some(10_000.0));
    }

    #[test]
    fn test_thresholds() {
        let table = [
            ("respond in under 200ms", "<", 200.0),
            ("at least 3 replicas", ">=", 3.0),
            ("no more than 5 retries", "<=", 5.0),
            ("more than 1,000 orders", ">", 1000.0),
        ];
        for (text, comparator, value) in table {
            let facts = extract_thresholds(text);
            assert_eq!(facts.len(), 1, "{}", text);
            assert_eq!(facts[0].comparator.as_deref(), Some(comparator), "{}", text);
            assert_eq!(facts[0].value, Some(value), "{}", text);
        }
    }

    #[test]
    fn test_constraints() {
        let facts = extract_constraints(
            "Exports must be signed. Reports are emailed weekly. Guests cannot download files.",
        );
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].text, "Exports must be signed");
        assert_eq!(facts[1].text, "Guests cannot download files");
    }

    #[test]
    fn test_relationships() {
        let facts = extract_relationships("Each account has many invoices and an invoice belongs to a customer.");
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].unit.as_deref(), Some("account -> invoices"));
        assert_eq!(facts[1].unit.as_deref(), Some("invoice -> customer"));
    }

    #[test]
    fn test_decisions() {
        let facts = extract_decisions("We will use Postgres for storage. Redis was considered.");
        let names: Vec<&str> = facts.iter().map(|f| f.text.as_str()).collect();
        assert!(names.contains(&"postgres"));
        assert!(!names.contains(&"redis"));
    }

    #[test]
    fn test_decided_to_phrase() {
        let facts = extract_decisions("We decided to batch exports nightly.");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "batch exports nightly");
    }

    #[test]
    fn test_entities_deduplicated_within_answer() {
        let facts = extract_entities(
            "Who approves a refund?",
            "The refund is approved by the Finance team. Each refund needs a ticket.",
        );
        let names: Vec<String> = facts.iter().map(|f| f.text.to_lowercase()).collect();
        assert_eq!(names.iter().filter(|n| n.as_str() == "refund").count(), 1);
        assert!(names.contains(&"finance".to_string()));
        assert!(names.contains(&"ticket".to_string()));
    }

    #[test]
    fn test_extract_facts_is_pure_and_not_deduplicated_across_calls() {
        let answer = "Exports must finish within 5 minutes.";
        let first = extract_facts("How fast?", answer);
        let second = extract_facts("How fast?", answer);
        assert_eq!(first, second);

        let mut counts = FactCounts::from_facts(&first);
        counts.merge(&FactCounts::from_facts(&second));
        assert_eq!(counts.total, first.len() * 2);
        assert_eq!(kinds(&first, FactKind::Constraint).len(), 1);
        assert_eq!(kinds(&first, FactKind::Threshold).len(), 1);
        assert_eq!(kinds(&first, FactKind::Metric).len(), 1);
    }

    #[test]
    fn test_empty_answer_has_no_facts() {
        assert!(extract_facts("Anything else?", "").is_empty());
    }
}
