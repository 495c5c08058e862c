//! Runtime configuration
//!
//! Everything has a working default. Environment variables override:
//!
//! - `ELENCHUS_MAX_ROUNDS` - soft round limit (warns, never halts)
//! - `ELENCHUS_TIER_BYPASSES_APORIA` - let tier >= 4 skip the contradiction gate
//! - `ANTHROPIC_API_KEY` - enables the semantic reviewer when non-empty
//! - `ELENCHUS_MODEL`, `ELENCHUS_LLM_URL` - reviewer model and endpoint
//! - `ELENCHUS_DATA_DIR` - where `sessions.db` lives

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::epic::EPIC_WARN_CHARS;

pub const DB_FILE: &str = "sessions.db";

/// Interrogation engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Rounds after which every submission carries a warning
    pub max_rounds: u32,

    /// Answers needed before a blocker-free session counts as ready
    pub min_answers_for_ready: usize,

    /// Answers scored below this are low quality
    pub low_score_threshold: u8,

    /// When true, tier >= 4 is ready even with unresolved critical contradictions
    pub tier_bypasses_aporia: bool,

    /// Epics longer than this are logged as oversize
    pub epic_warn_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            min_answers_for_ready: 4,
            low_score_threshold: 3,
            tier_bypasses_aporia: false,
            epic_warn_chars: EPIC_WARN_CHARS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ELENCHUS_MAX_ROUNDS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_rounds = n,
                _ => tracing::warn!("Ignoring invalid ELENCHUS_MAX_ROUNDS={:?}", raw),
            }
        }

        if let Ok(raw) = std::env::var("ELENCHUS_TIER_BYPASSES_APORIA") {
            config.tier_bypasses_aporia = parse_flag(&raw);
        }

        config
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Backoff for the text-generation collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Backoff never waits longer than this
    pub max_delay: Duration,
    /// Fractional jitter applied to each delay (0.25 = +/-25%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), before jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Backoff with jitter applied; `unit` is a sample in [0, 1)
    pub fn jittered(&self, attempt: u32, unit: f64) -> Duration {
        let base = self.backoff(attempt).as_secs_f64();
        let spread = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 + spread * (unit.clamp(0.0, 1.0) * 2.0 - 1.0);
        Duration::from_secs_f64((base * factor).min(self.max_delay.as_secs_f64()))
    }
}

/// Semantic reviewer settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,

    /// Empty means no reviewer
    pub api_key: String,

    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let mut config = Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            ..Self::default()
        };
        if let Ok(model) = std::env::var("ELENCHUS_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(url) = std::env::var("ELENCHUS_LLM_URL") {
            if !url.trim().is_empty() {
                config.api_url = url;
            }
        }
        config
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Data directory: `ELENCHUS_DATA_DIR`, else the platform data dir
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ELENCHUS_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    // XDG data dir on Linux, ~/Library/Application Support on macOS
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("elenchus"))
}
