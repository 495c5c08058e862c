//! Typed request payloads
//!
//! Parse, then validate, then apply. Parsing rejects unknown fields and
//! out-of-enum values; `validate` rejects semantically broken batches. A
//! request that fails either step never touches session state.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::elenchus::PremiseLedger;
use crate::error::EngineError;
use crate::types::{Area, PremiseType, Severity};

/// A premise stated alongside an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PremiseInput {
    /// Caller-chosen id so contradictions in the same batch can cite it
    #[serde(default)]
    pub id: Option<String>,
    pub statement: String,
    #[serde(rename = "type")]
    pub premise_type: PremiseType,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One question/answer pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AnswerInput {
    pub area: Area,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub premises: Vec<PremiseInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ContradictionInput {
    pub premise_ids: Vec<String>,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ResolutionInput {
    pub contradiction_id: String,
    pub resolution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SignalInput {
    /// Derived from the description when absent
    #[serde(default)]
    pub id: Option<String>,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub addressed: bool,
}

/// One round of Q&A plus optional ledger and signal updates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RoundRequest {
    pub answers: Vec<AnswerInput>,
    #[serde(default)]
    pub contradictions: Vec<ContradictionInput>,
    #[serde(default)]
    pub resolutions: Vec<ResolutionInput>,
    #[serde(default)]
    pub signals: Vec<SignalInput>,
}

/// Parse a JSON value into a typed request, failing closed
pub fn parse<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, EngineError> {
    serde_json::from_value(value).map_err(|e| EngineError::InvalidRequest(e.to_string()))
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidRequest(message.into())
}

fn require_text(value: &str, what: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} must not be empty", what)));
    }
    Ok(())
}

impl RoundRequest {
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
            && self.contradictions.is_empty()
            && self.resolutions.is_empty()
            && self.signals.is_empty()
    }

    /// Structural checks against the current ledger. Unknown premise or
    /// contradiction ids are not errors here; the ledger reports those.
    pub fn validate(&self, ledger: &PremiseLedger) -> Result<(), EngineError> {
        if self.is_empty() {
            return Err(invalid("request contains no answers, contradictions, resolutions or signals"));
        }

        let mut batch_ids: Vec<&str> = Vec::new();
        for (i, answer) in self.answers.iter().enumerate() {
            require_text(&answer.question, &format!("answers[{}].question", i))?;
            require_text(&answer.answer, &format!("answers[{}].answer", i))?;

            if let Some(score) = answer.score {
                if !(1..=5).contains(&score) {
                    return Err(invalid(format!("answers[{}].score must be 1-5, got {}", i, score)));
                }
            }

            for (j, premise) in answer.premises.iter().enumerate() {
                let at = format!("answers[{}].premises[{}]", i, j);
                require_text(&premise.statement, &format!("{}.statement", at))?;

                if let Some(confidence) = premise.confidence {
                    if !(0.0..=1.0).contains(&confidence) {
                        return Err(invalid(format!("{}.confidence must be within 0-1", at)));
                    }
                }

                if let Some(id) = &premise.id {
                    require_text(id, &format!("{}.id", at))?;
                    // Stored ids are trimmed, so compare trimmed
                    let id = id.trim();
                    if batch_ids.contains(&id) || ledger.premise(id).is_some() {
                        return Err(invalid(format!("{}.id {:?} is already in use", at, id)));
                    }
                    batch_ids.push(id);
                }
            }
        }

        for (i, contradiction) in self.contradictions.iter().enumerate() {
            require_text(&contradiction.description, &format!("contradictions[{}].description", i))?;
        }

        for (i, resolution) in self.resolutions.iter().enumerate() {
            require_text(&resolution.contradiction_id, &format!("resolutions[{}].contradictionId", i))?;
            require_text(&resolution.resolution, &format!("resolutions[{}].resolution", i))?;
        }

        for (i, signal) in self.signals.iter().enumerate() {
            require_text(&signal.description, &format!("signals[{}].description", i))?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EpicArgs {
    pub epic: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractFactsArgs {
    #[serde(default)]
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SessionArgs {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SubmitArgs {
    pub session_id: String,
    pub answers: Vec<AnswerInput>,
    #[serde(default)]
    pub contradictions: Vec<ContradictionInput>,
    #[serde(default)]
    pub resolutions: Vec<ResolutionInput>,
    #[serde(default)]
    pub signals: Vec<SignalInput>,
}

impl SubmitArgs {
    pub fn into_parts(self) -> (String, RoundRequest) {
        (
            self.session_id,
            RoundRequest {
                answers: self.answers,
                contradictions: self.contradictions,
                resolutions: self.resolutions,
                signals: self.signals,
            },
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ResolveArgs {
    pub session_id: String,
    pub resolutions: Vec<ResolutionInput>,
}
