//! Pattern dictionaries and term matchers
//!
//! Every classifier in the crate is built from these lists. Matching is
//! case-insensitive and word-anchored so "fast" does not fire on "breakfast".

use once_cell::sync::Lazy;
use regex::Regex;

/// Vague adjectives and filler that signal an unquantified claim
pub const VAGUE_PHRASES: &[&str] = &[
    "user-friendly",
    "easy to use",
    "high quality",
    "as needed",
    "and so on",
    "state of the art",
    "best practices",
    "fast",
    "quick",
    "quickly",
    "slow",
    "easy",
    "simple",
    "intuitive",
    "scalable",
    "robust",
    "flexible",
    "efficient",
    "seamless",
    "modern",
    "reliable",
    "performant",
    "responsive",
    "clean",
    "nice",
    "good",
    "better",
    "powerful",
    "lightweight",
    "some",
    "many",
    "various",
    "several",
    "etc",
    "appropriate",
    "adequate",
    "minimal",
    "optimal",
];

/// Role and actor nouns
pub const ACTOR_TERMS: &[&str] = &[
    "user",
    "admin",
    "administrator",
    "customer",
    "operator",
    "developer",
    "manager",
    "stakeholder",
    "owner",
    "visitor",
    "member",
    "client",
    "analyst",
    "engineer",
    "support agent",
    "reviewer",
    "guest",
    "tenant",
    "persona",
    "role",
];

/// Named technologies, frameworks and datastores (whole words only)
pub const TECHNOLOGY_TERMS: &[&str] = &[
    "postgres",
    "postgresql",
    "mysql",
    "sqlite",
    "mongodb",
    "redis",
    "kafka",
    "rabbitmq",
    "elasticsearch",
    "dynamodb",
    "s3",
    "rust",
    "python",
    "java",
    "golang",
    "typescript",
    "javascript",
    "node",
    "nodejs",
    "react",
    "vue",
    "angular",
    "svelte",
    "django",
    "flask",
    "rails",
    "spring",
    "kubernetes",
    "k8s",
    "docker",
    "terraform",
    "aws",
    "gcp",
    "azure",
    "lambda",
    "graphql",
    "grpc",
    "rest",
    "websocket",
    "websockets",
    "nginx",
    "oauth",
    "jwt",
];

/// Language that shows security was considered
pub const SECURITY_TERMS: &[&str] = &[
    "security",
    "secure",
    "encrypt",
    "authenticat",
    "authoriz",
    "permission",
    "access control",
    "privacy",
    "pii",
    "gdpr",
    "rbac",
    "audit",
];

/// Numerals anywhere in the text
pub static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));

/// A number followed by a unit, percentage, duration or volume noun
pub static UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d[\d,]*(?:\.\d+)?\s*(?:%|percent\b|ms\b|milliseconds?\b|s\b|secs?\b|seconds?\b|mins?\b|minutes?\b|h\b|hrs?\b|hours?\b|days?\b|weeks?\b|months?\b|years?\b|kb\b|mb\b|gb\b|tb\b|rps\b|qps\b|tps\b|req/s\b|requests?\b|concurrent\b|users?\b|records?\b|rows?\b|items?\b|x\b)",
    )
    .expect("valid regex")
});

/// "when/if/given X ... then/should/must Y" phrasing
pub static CONDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:when|if|given)\b[^.!?\n]*\b(?:then|should|must|will|returns?|shows?|displays?)\b")
        .expect("valid regex")
});

/// Sentence boundaries
pub static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?\n]+").expect("valid regex"));

/// Split text into trimmed, non-empty statements
pub fn split_statements(text: &str) -> Vec<&str> {
    SENTENCE_RE
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offsets of `term` in `haystack` that start on a word boundary.
/// Both inputs are expected lowercase. With `whole` the match must also
/// end on a boundary; otherwise the term acts as a stem.
fn term_offsets(haystack: &str, term: &str, whole: bool) -> Vec<usize> {
    let mut offsets = Vec::new();
    if term.is_empty() {
        return offsets;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        let left_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let right_ok = !whole || haystack[end..].chars().next().map_or(true, |c| !is_word_char(c));
        if left_ok && right_ok {
            offsets.push(start);
        }
        from = end;
    }
    offsets
}

/// Stem match: "fail" matches "failure", not "unfailing"
pub fn has_term(lower: &str, term: &str) -> bool {
    !term_offsets(lower, term, false).is_empty()
}

/// Whole-word match: "rest" matches "REST api", not "restore"
pub fn has_word(lower: &str, word: &str) -> bool {
    !term_offsets(lower, word, true).is_empty()
}

pub fn has_any_term(lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| has_term(lower, t))
}

/// Vague phrases in order of first appearance, plus total hit count
pub fn find_vague_phrases(text: &str) -> (Vec<String>, usize) {
    let lower = text.to_lowercase();
    // One scan per dictionary phrase; offsets come back ascending
    let located: Vec<(&str, Vec<usize>)> = VAGUE_PHRASES
        .iter()
        .map(|phrase| (*phrase, term_offsets(&lower, phrase, true)))
        .collect();

    let mut found: Vec<(usize, &str)> = Vec::new();
    let mut hits = 0;

    for &(phrase, ref offsets) in &located {
        let longer: Vec<&(&str, Vec<usize>)> = located
            .iter()
            .filter(|(other, _)| other.len() > phrase.len() && other.contains(phrase))
            .collect();

        // "easy" inside "easy to use" counts once, as the longer phrase
        let kept: Vec<usize> = offsets
            .iter()
            .copied()
            .filter(|&o| !longer.iter().any(|(other, spans)| covers(spans, other.len(), o)))
            .collect();
        if let Some(first) = kept.first() {
            found.push((*first, phrase));
            hits += kept.len();
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    (found.into_iter().map(|(_, p)| p.to_string()).collect(), hits)
}

/// True when `offset` falls inside one of the spans starting at `starts`.
/// Spans of a single phrase never overlap, so only the nearest start matters.
fn covers(starts: &[usize], len: usize, offset: usize) -> bool {
    let idx = starts.partition_point(|&s| s <= offset);
    idx > 0 && offset < starts[idx - 1] + len
}

/// Blank out vague phrases so they cannot count as other evidence
pub fn strip_vague(lower: &str) -> String {
    let mut out = lower.to_string();
    for phrase in VAGUE_PHRASES.iter().filter(|p| p.contains(|c: char| !c.is_alphabetic())) {
        out = out.replace(phrase, &" ".repeat(phrase.len()));
    }
    out
}

pub fn has_actors(lower: &str) -> bool {
    let stripped = strip_vague(lower);
    has_any_term(&stripped, ACTOR_TERMS)
}

/// Technologies named in the text, in dictionary order
pub fn technologies(lower: &str) -> Vec<&'static str> {
    TECHNOLOGY_TERMS
        .iter()
        .copied()
        .filter(|t| has_word(lower, t))
        .collect()
}

pub fn has_security_language(lower: &str) -> bool {
    has_any_term(lower, SECURITY_TERMS)
}
