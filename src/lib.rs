//! elenchus - Requirements Interrogation Engine
//!
//! Turns an ambiguous feature request ("epic") into a structured,
//! internally consistent set of facts that a spec writer can build from.
//!
//! # Philosophy
//!
//! Socratic elenchus: ask, record what was committed to, and when two
//! commitments collide, stop and make the requester choose.
//!
//! - Score vagueness before asking anything (tier 1-5)
//! - Ask the questions the tier calls for, no more
//! - Keep every premise; never silently drop a contradiction
//! - Work fully offline; an LLM reviewer only ever adds
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use elenchus::{EngineConfig, InterrogationEngine, MemoryStore, RoundRequest};
//!
//! let store = MemoryStore::new();
//! let config = EngineConfig::default();
//! let engine = InterrogationEngine::new(&store, &config);
//!
//! let started = engine.start("Build a dashboard. It should be fast.")?;
//! for q in &started.questions {
//!     println!("[{}] {}", q.area, q.text);
//! }
//!
//! let output = engine.submit_round(&started.session_id, request)?;
//! if let Some(challenge) = output.challenge_question {
//!     println!("{}", challenge);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   AI Agent (Claude, etc.)            │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ MCP (JSON-RPC over stdio)
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │              InterrogationEngine                     │
//! │  specificity → questions → facts → elenchus          │
//! │                    → readiness gate                  │
//! └──────────┬──────────────────────────┬───────────────┘
//!            │                          │ optional
//!            ▼                          ▼
//!      SessionStore                TextGenerator
//!   (memory / SQLite)           (Anthropic Messages)
//! ```

pub mod config;
pub mod elenchus;
pub mod engine;
pub mod epic;
pub mod error;
pub mod facts;
pub mod llm;
pub mod mcp;
pub mod patterns;
pub mod prompts;
pub mod questions;
pub mod readiness;
pub mod request;
pub mod semantic;
pub mod specificity;
pub mod store;
pub mod types;

// Engine
pub use engine::{InterrogationEngine, QualityReport, ResolveOutput, RoundOutput, SessionSnapshot, StartOutput};
pub use config::{get_data_dir, EngineConfig, LlmConfig, RetryPolicy};
pub use error::{EngineError, LedgerError, LlmError};
pub use types::*;

// Analysis
pub use epic::Epic;
pub use facts::{extract_facts, Fact, FactCounts, FactKind};
pub use specificity::{analyze, strategy_for_tier, QualityAssessment};
pub use questions::select_questions;

// Ledger and gate
pub use elenchus::{ElenchusSummary, PremiseLedger, ResolveOutcome};
pub use readiness::{Coverage, Readiness};

// Requests
pub use request::{AnswerInput, ContradictionInput, PremiseInput, ResolutionInput, RoundRequest, SignalInput};

// Collaborators
pub use llm::{AnthropicClient, GenerateOptions, TextGenerator};
pub use semantic::Augmentation;
pub use store::{MemoryStore, SessionStore, SqliteStore};
