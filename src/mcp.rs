//! MCP protocol surface
//!
//! Tool definitions, tool dispatch, and the JSON-RPC envelope. Transport
//! (stdio) lives in the binary.

use serde_json::{json, Value};

use crate::engine::InterrogationEngine;
use crate::epic::Epic;
use crate::error::EngineError;
use crate::facts::{self, FactCounts};
use crate::prompts;
use crate::request::{self, EpicArgs, ExtractFactsArgs, ResolveArgs, SessionArgs, SubmitArgs};
use crate::semantic::Augmentation;
use crate::specificity;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const AREA_ENUM: [&str; 6] = ["scope", "success", "constraint", "risk", "technical", "stakeholder"];
const SEVERITY_ENUM: [&str; 4] = ["critical", "high", "medium", "low"];
const PREMISE_TYPE_ENUM: [&str; 5] = ["capability", "constraint", "requirement", "assumption", "preference"];

fn resolutions_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "contradictionId": {"type": "string"},
                "resolution": {"type": "string", "description": "How the conflict is settled, in the requester's words"}
            },
            "required": ["contradictionId", "resolution"]
        }
    })
}

/// Tool definitions for `tools/list`
pub fn get_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "analyze_epic",
            "description": "Score how specific a feature request is. Returns tier 1 (vague) to 5 (complete), the interrogation strategy, specificity indicators (numbers, units, actors, testable conditions, technology, vague phrases quoted verbatim), per-area coverage with missing checklist items, and a ready-to-send analysis prompt. Stateless.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "epic": {"type": "string", "description": "Raw feature request text"}
                },
                "required": ["epic"]
            }
        }),
        json!({
            "name": "extract_facts",
            "description": "Tag the atomic claims in one answer: metrics, thresholds, entities, relationships, constraints and decisions. Stateless.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The question that was asked"},
                    "answer": {"type": "string", "description": "The answer to analyze"}
                },
                "required": ["answer"]
            }
        }),
        json!({
            "name": "start_interrogation",
            "description": "Start an interrogation session for an epic. Returns the session id, the assessment, and the first round of questions. Vague epics get foundation questions; detailed ones get validation questions.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "epic": {"type": "string", "description": "Raw feature request text"}
                },
                "required": ["epic"]
            }
        }),
        json!({
            "name": "submit_answers",
            "description": "Submit one round of answers. Premises stated in answers are recorded as commitments; contradictions between premises block readiness until resolved. Returns re-assessed tier, fact counts, answer quality, coverage, the premise ledger, next questions, a challenge question for the first open contradiction, blockers, and readyForSpec. The whole batch is rejected if any entry is malformed.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"},
                    "answers": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "area": {"type": "string", "enum": AREA_ENUM},
                                "question": {"type": "string"},
                                "answer": {"type": "string"},
                                "score": {"type": "integer", "minimum": 1, "maximum": 5},
                                "premises": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "id": {"type": "string", "description": "Optional id so contradictions in this batch can cite it"},
                                            "statement": {"type": "string"},
                                            "type": {"type": "string", "enum": PREMISE_TYPE_ENUM},
                                            "confidence": {"type": "number", "minimum": 0, "maximum": 1}
                                        },
                                        "required": ["statement", "type"]
                                    }
                                }
                            },
                            "required": ["area", "question", "answer"]
                        }
                    },
                    "contradictions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "premiseIds": {"type": "array", "items": {"type": "string"}, "minItems": 2},
                                "description": {"type": "string"},
                                "severity": {"type": "string", "enum": SEVERITY_ENUM}
                            },
                            "required": ["premiseIds", "description", "severity"]
                        }
                    },
                    "resolutions": resolutions_schema(),
                    "signals": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "description": {"type": "string"},
                                "severity": {"type": "string", "enum": SEVERITY_ENUM},
                                "addressed": {"type": "boolean"}
                            },
                            "required": ["description", "severity"]
                        }
                    }
                },
                "required": ["sessionId", "answers"]
            }
        }),
        json!({
            "name": "resolve_contradictions",
            "description": "Resolve recorded contradictions by id and re-run the readiness gate. Resolving twice keeps the first resolution.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"},
                    "resolutions": resolutions_schema()
                },
                "required": ["sessionId", "resolutions"]
            }
        }),
        json!({
            "name": "get_session",
            "description": "Get a session's current state: answers, scores per round, blockers, readiness, and the premise ledger.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sessionId": {"type": "string"}
                },
                "required": ["sessionId"]
            }
        }),
    ]
}

/// Run one tool
pub async fn handle_tool_call(
    engine: &InterrogationEngine<'_>,
    augmentation: &Augmentation<'_>,
    name: &str,
    arguments: Value,
) -> Result<Value, EngineError> {
    tracing::debug!(tool = name, "Tool call");

    match name {
        "analyze_epic" => {
            let args: EpicArgs = request::parse(arguments)?;
            let epic = Epic::ingest(&args.epic);
            let assessment = specificity::analyze(&epic.text);
            let prompt = prompts::analysis_prompt(&epic.text, &assessment);
            Ok(json!({
                "assessment": assessment,
                "contentHash": epic.content_hash,
                "goals": epic.goals,
                "constraints": epic.constraints,
                "acceptanceCriteria": epic.acceptance_criteria,
                "analysisPrompt": prompt,
            }))
        }
        "extract_facts" => {
            let args: ExtractFactsArgs = request::parse(arguments)?;
            let facts = facts::extract_facts(&args.question, &args.answer);
            let counts = FactCounts::from_facts(&facts);
            Ok(json!({ "facts": facts, "counts": counts }))
        }
        "start_interrogation" => {
            let args: EpicArgs = request::parse(arguments)?;
            let started = engine.start_with(&args.epic, augmentation).await?;
            Ok(serde_json::to_value(started)?)
        }
        "submit_answers" => {
            let args: SubmitArgs = request::parse(arguments)?;
            let (session_id, round) = args.into_parts();
            let output = engine.submit_round_with(&session_id, round, augmentation).await?;
            Ok(serde_json::to_value(output)?)
        }
        "resolve_contradictions" => {
            let args: ResolveArgs = request::parse(arguments)?;
            let output = engine.resolve(&args.session_id, &args.resolutions)?;
            Ok(serde_json::to_value(output)?)
        }
        "get_session" => {
            let args: SessionArgs = request::parse(arguments)?;
            Ok(serde_json::to_value(engine.session(&args.session_id)?)?)
        }
        _ => Err(EngineError::InvalidRequest(format!("Unknown tool: {}", name))),
    }
}

/// JSON-RPC error codes
fn error_code(err: &EngineError) -> i64 {
    match err {
        EngineError::InvalidRequest(_) => -32602,
        EngineError::NotFound(_) => -32001,
        EngineError::Storage(_) | EngineError::Serialization(_) => -32000,
    }
}

fn rpc_error(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

/// Handle one JSON-RPC message. Notifications (no id) get no response.
pub async fn handle_message(
    engine: &InterrogationEngine<'_>,
    augmentation: &Augmentation<'_>,
    message: &Value,
) -> Option<Value> {
    let id = message.get("id").cloned();
    let method = message.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = message.get("params").cloned().unwrap_or_else(|| json!({}));

    let result = match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "elenchus", "version": env!("CARGO_PKG_VERSION")}
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": get_tools() })),
        "tools/call" => {
            let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            match handle_tool_call(engine, augmentation, name, arguments).await {
                Ok(value) => Ok(json!({
                    "content": [{"type": "text", "text": value.to_string()}],
                    "structuredContent": value,
                })),
                // Tool failures are results, not protocol errors
                Err(e) => Ok(json!({
                    "content": [{"type": "text", "text": e.to_string()}],
                    "isError": true,
                    "errorCode": error_code(&e),
                })),
            }
        }
        m if m.starts_with("notifications/") => return None,
        _ => Err((-32601, format!("Unknown method: {}", method))),
    };

    let id = id?;
    Some(match result {
        Ok(value) => json!({"jsonrpc": "2.0", "id": id, "result": value}),
        Err((code, message)) => rpc_error(id, code, message),
    })
}

/// Reply for a line that is not valid JSON
pub fn parse_error(detail: &str) -> Value {
    rpc_error(Value::Null, -32700, format!("Parse error: {}", detail))
}
