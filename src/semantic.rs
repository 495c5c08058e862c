//! Semantic augmentation
//!
//! One switch, chosen once per call: run the deterministic template path
//! alone, or also ask a `TextGenerator` for signals, questions and
//! contradictions. Reviewer output is only ever added to the template
//! baseline. Any reviewer failure is logged and treated as "no additions".

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::elenchus::PremiseLedger;
use crate::llm::{GenerateOptions, TextGenerator};
use crate::prompts;
use crate::specificity::QualityAssessment;
use crate::types::{Area, Premise, Priority, Question, Severity, Signal};

pub const SEMANTIC_RATIONALE: &str = "semantic reviewer";

/// How a round is augmented
#[derive(Clone, Copy)]
pub enum Augmentation<'a> {
    Template,
    SemanticAugmented(&'a dyn TextGenerator),
}

impl<'a> Augmentation<'a> {
    /// Template when no generator is available
    pub fn from_generator(generator: Option<&'a dyn TextGenerator>) -> Self {
        match generator {
            Some(g) => Augmentation::SemanticAugmented(g),
            None => Augmentation::Template,
        }
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, Augmentation::SemanticAugmented(_))
    }

    /// Signals and questions for an epic
    pub async fn review_epic(&self, text: &str, assessment: &QualityAssessment) -> Additions {
        let Augmentation::SemanticAugmented(generator) = self else {
            return Additions::default();
        };

        let prompt = prompts::analysis_prompt(text, assessment);
        let Some(raw) = ask(*generator, &prompt).await else {
            return Additions::default();
        };

        let parsed: AnalysisReply = match parse_lenient(&raw) {
            Some(reply) => reply,
            None => {
                tracing::warn!(generator = generator.name(), "Unparseable analysis reply, ignoring");
                return Additions::default();
            }
        };

        Additions {
            signals: parsed.signals.iter().filter_map(RawSignal::to_signal).collect(),
            questions: parsed.questions.iter().filter_map(RawQuestion::to_question).collect(),
            contradictions: Vec::new(),
        }
    }

    /// Contradictions among the ledger's premises plus follow-up questions
    pub async fn review_round(
        &self,
        text: &str,
        assessment: &QualityAssessment,
        ledger: &PremiseLedger,
        already_asked: &[String],
    ) -> Additions {
        let Augmentation::SemanticAugmented(generator) = self else {
            return Additions::default();
        };

        let mut additions = Additions::default();

        if ledger.premises.len() >= 2 {
            let prompt = prompts::contradiction_prompt(&ledger.premises, &ledger.contradictions);
            if let Some(raw) = ask(*generator, &prompt).await {
                match parse_lenient::<Vec<RawContradiction>>(&raw) {
                    Some(found) => {
                        additions.contradictions = found
                            .iter()
                            .filter_map(|c| c.to_proposed(&ledger.premises))
                            .collect();
                    }
                    None => tracing::warn!("Unparseable contradiction reply, ignoring"),
                }
            }
        }

        let prompt = prompts::question_prompt(text, assessment, already_asked);
        if let Some(raw) = ask(*generator, &prompt).await {
            match parse_lenient::<Vec<RawQuestion>>(&raw) {
                Some(found) => {
                    additions.questions = found.iter().filter_map(RawQuestion::to_question).collect();
                }
                None => tracing::warn!("Unparseable question reply, ignoring"),
            }
        }

        additions
    }
}

/// Everything the reviewer proposed
#[derive(Debug, Clone, Default)]
pub struct Additions {
    pub signals: Vec<Signal>,
    pub questions: Vec<Question>,
    pub contradictions: Vec<ProposedContradiction>,
}

impl Additions {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.questions.is_empty() && self.contradictions.is_empty()
    }
}

/// A contradiction the reviewer suggests; the ledger still validates it
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedContradiction {
    pub premise_ids: Vec<String>,
    pub description: String,
    pub severity: Severity,
}

async fn ask(generator: &dyn TextGenerator, prompt: &str) -> Option<String> {
    let options = GenerateOptions {
        temperature: Some(0.0),
        ..GenerateOptions::default()
    };
    match generator.generate(prompt, &options).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(generator = generator.name(), "Semantic reviewer failed, using template only: {}", e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient reply parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisReply {
    signals: Vec<RawSignal>,
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSignal {
    description: String,
    severity: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuestion {
    area: String,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawContradiction {
    premise_ids: Vec<String>,
    description: String,
    severity: String,
}

fn parse_severity(raw: &str) -> Severity {
    match raw.trim().to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "low" => Severity::Low,
        _ => Severity::Medium,
    }
}

fn parse_area(raw: &str) -> Option<Area> {
    let lower = raw.trim().to_lowercase();
    Area::ALL.iter().copied().find(|a| a.name() == lower)
}

/// Stable id so the same finding upserts instead of duplicating
pub fn signal_id(description: &str) -> String {
    let normalized = description.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("sig-{}", &hex::encode(digest)[..12])
}

impl RawSignal {
    fn to_signal(&self) -> Option<Signal> {
        let description = self.description.trim();
        if description.is_empty() {
            return None;
        }
        Some(Signal {
            id: signal_id(description),
            description: description.to_string(),
            severity: parse_severity(&self.severity),
            addressed: false,
        })
    }
}

impl RawQuestion {
    fn to_question(&self) -> Option<Question> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        // Unknown areas are dropped rather than guessed
        let area = parse_area(&self.area)?;
        Some(Question::new(area, Priority::Medium, text, SEMANTIC_RATIONALE))
    }
}

impl RawContradiction {
    fn to_proposed(&self, premises: &[Premise]) -> Option<ProposedContradiction> {
        let description = self.description.trim();
        if description.is_empty() || self.premise_ids.len() < 2 {
            return None;
        }
        if let Some(unknown) = self
            .premise_ids
            .iter()
            .find(|id| !premises.iter().any(|p| &p.id == *id))
        {
            tracing::debug!(premise = %unknown, "Reviewer cited unknown premise, dropping");
            return None;
        }
        Some(ProposedContradiction {
            premise_ids: self.premise_ids.clone(),
            description: description.to_string(),
            severity: parse_severity(&self.severity),
        })
    }
}

/// Parse JSON out of model text: tolerates code fences and surrounding prose
pub fn parse_lenient<T: for<'de> Deserialize<'de>>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find(|c| c == '{' || c == '[')?;
    let open = trimmed[start..].chars().next()?;
    let close = if open == '{' { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
