//! Session persistence
//!
//! The engine only needs get/save by session id. Two backends:
//! - `MemoryStore` for tests and embedding
//! - `SqliteStore`, a single file under the data directory
//!
//! Premises are append-only. Contradictions are upserted so that
//! resolutions persist.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::elenchus::PremiseLedger;
use crate::types::{Contradiction, InterrogationSession, Premise};

/// A stored round evaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub session_id: String,
    pub round: u32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator
pub trait SessionStore: Send + Sync {
    fn get_session(&self, id: &str) -> Result<Option<InterrogationSession>>;
    fn save_session(&self, session: &InterrogationSession) -> Result<()>;

    /// Empty ledger when nothing is stored yet
    fn get_ledger(&self, session_id: &str) -> Result<PremiseLedger>;
    fn save_ledger(&self, ledger: &PremiseLedger) -> Result<()>;

    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()>;
    fn get_evaluations(&self, session_id: &str) -> Result<Vec<Evaluation>>;
}

fn lock_poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("store lock poisoned")
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<String, InterrogationSession>,
    ledgers: HashMap<String, PremiseLedger>,
    evaluations: HashMap<String, Vec<Evaluation>>,
}

/// Mutex-guarded maps
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get_session(&self, id: &str) -> Result<Option<InterrogationSession>> {
        let state = self.state.lock().map_err(lock_poisoned)?;
        Ok(state.sessions.get(id).cloned())
    }

    fn save_session(&self, session: &InterrogationSession) -> Result<()> {
        let mut state = self.state.lock().map_err(lock_poisoned)?;
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn get_ledger(&self, session_id: &str) -> Result<PremiseLedger> {
        let state = self.state.lock().map_err(lock_poisoned)?;
        Ok(state
            .ledgers
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| PremiseLedger::new(session_id)))
    }

    fn save_ledger(&self, ledger: &PremiseLedger) -> Result<()> {
        let mut state = self.state.lock().map_err(lock_poisoned)?;
        let stored = state
            .ledgers
            .entry(ledger.session_id.clone())
            .or_insert_with(|| PremiseLedger::new(ledger.session_id.clone()));

        for premise in &ledger.premises {
            if stored.premise(&premise.id).is_none() {
                stored.premises.push(premise.clone());
            }
        }
        for contradiction in &ledger.contradictions {
            match stored.contradictions.iter_mut().find(|c| c.id == contradiction.id) {
                Some(existing) => *existing = contradiction.clone(),
                None => stored.contradictions.push(contradiction.clone()),
            }
        }
        Ok(())
    }

    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        let mut state = self.state.lock().map_err(lock_poisoned)?;
        state
            .evaluations
            .entry(evaluation.session_id.clone())
            .or_default()
            .push(evaluation.clone());
        Ok(())
    }

    fn get_evaluations(&self, session_id: &str) -> Result<Vec<Evaluation>> {
        let state = self.state.lock().map_err(lock_poisoned)?;
        Ok(state.evaluations.get(session_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
-- Sessions: full snapshot as JSON, a few columns for listing
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    round INTEGER NOT NULL,
    ready_for_spec INTEGER NOT NULL DEFAULT 0,
    epic_hash TEXT NOT NULL,
    session_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Premises: append-only, ids are scoped to their session
CREATE TABLE IF NOT EXISTS premises (
    id TEXT NOT NULL,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    seq INTEGER NOT NULL,
    statement TEXT NOT NULL,
    premise_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    answer_id TEXT NOT NULL,
    PRIMARY KEY (session_id, id)
);

CREATE INDEX IF NOT EXISTS idx_premises_session ON premises(session_id, seq);

-- Contradictions: mutated only by resolution
CREATE TABLE IF NOT EXISTS contradictions (
    id TEXT NOT NULL,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    seq INTEGER NOT NULL,
    premise_ids TEXT NOT NULL,      -- JSON array
    description TEXT NOT NULL,
    severity TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolution TEXT,
    detected_at TEXT NOT NULL,
    resolved_at TEXT,
    PRIMARY KEY (session_id, id)
);

CREATE INDEX IF NOT EXISTS idx_contradictions_session ON contradictions(session_id, seq);

-- Evaluations: one row per submitted round
CREATE TABLE IF NOT EXISTS evaluations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    round INTEGER NOT NULL,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluations_session ON evaluations(session_id, round);
"#;

/// Enum to its serde string form ("critical", "capability", ...)
fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => anyhow::bail!("expected string enum, got {}", other),
    }
}

fn enum_from_text<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .with_context(|| format!("Unknown enum value {:?}", text))
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("Bad timestamp {:?}", text))?
        .with_timezone(&Utc))
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database with schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_premises(conn: &Connection, session_id: &str) -> Result<Vec<Premise>> {
        let mut stmt = conn.prepare(
            "SELECT id, statement, premise_type, confidence, answer_id
             FROM premises WHERE session_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut premises = Vec::new();
        for row in rows {
            let (id, statement, premise_type, confidence, answer_id) = row?;
            premises.push(Premise {
                id,
                statement,
                premise_type: enum_from_text(&premise_type)?,
                confidence,
                answer_id,
            });
        }
        Ok(premises)
    }

    fn read_contradictions(conn: &Connection, session_id: &str) -> Result<Vec<Contradiction>> {
        let mut stmt = conn.prepare(
            "SELECT id, premise_ids, description, severity, resolved, resolution, detected_at, resolved_at
             FROM contradictions WHERE session_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut contradictions = Vec::new();
        for row in rows {
            let (id, premise_ids, description, severity, resolved, resolution, detected_at, resolved_at) = row?;
            contradictions.push(Contradiction {
                id,
                premise_ids: serde_json::from_str(&premise_ids)?,
                description,
                severity: enum_from_text(&severity)?,
                resolved: resolved != 0,
                resolution,
                detected_at: parse_time(&detected_at)?,
                resolved_at: resolved_at.as_deref().map(parse_time).transpose()?,
            });
        }
        Ok(contradictions)
    }
}

impl SessionStore for SqliteStore {
    fn get_session(&self, id: &str) -> Result<Option<InterrogationSession>> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        let json: Option<String> = conn
            .query_row(
                "SELECT session_json FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).context("Corrupt session record"))
            .transpose()
    }

    fn save_session(&self, session: &InterrogationSession) -> Result<()> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        let json = serde_json::to_string(session)?;
        conn.execute(
            r#"
            INSERT INTO sessions (id, status, round, ready_for_spec, epic_hash, session_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                round = excluded.round,
                ready_for_spec = excluded.ready_for_spec,
                session_json = excluded.session_json,
                updated_at = excluded.updated_at
            "#,
            params![
                session.id,
                enum_text(&session.status)?,
                session.round,
                session.ready_for_spec as i32,
                session.epic.content_hash,
                json,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to save session {}", session.id))?;
        Ok(())
    }

    fn get_ledger(&self, session_id: &str) -> Result<PremiseLedger> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        Ok(PremiseLedger {
            session_id: session_id.to_string(),
            premises: Self::read_premises(&conn, session_id)?,
            contradictions: Self::read_contradictions(&conn, session_id)?,
        })
    }

    fn save_ledger(&self, ledger: &PremiseLedger) -> Result<()> {
        let mut conn = self.conn.lock().map_err(lock_poisoned)?;
        let tx = conn.transaction()?;

        for (seq, premise) in ledger.premises.iter().enumerate() {
            tx.execute(
                r#"
                INSERT OR IGNORE INTO premises (id, session_id, seq, statement, premise_type, confidence, answer_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    premise.id,
                    ledger.session_id,
                    seq as i64,
                    premise.statement,
                    enum_text(&premise.premise_type)?,
                    premise.confidence,
                    premise.answer_id,
                ],
            )?;
        }

        for (seq, contradiction) in ledger.contradictions.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO contradictions (id, session_id, seq, premise_ids, description, severity,
                                            resolved, resolution, detected_at, resolved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(session_id, id) DO UPDATE SET
                    resolved = excluded.resolved,
                    resolution = excluded.resolution,
                    resolved_at = excluded.resolved_at
                "#,
                params![
                    contradiction.id,
                    ledger.session_id,
                    seq as i64,
                    serde_json::to_string(&contradiction.premise_ids)?,
                    contradiction.description,
                    enum_text(&contradiction.severity)?,
                    contradiction.resolved as i32,
                    contradiction.resolution,
                    contradiction.detected_at.to_rfc3339(),
                    contradiction.resolved_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }

        tx.commit()
            .with_context(|| format!("Failed to save ledger for {}", ledger.session_id))?;
        Ok(())
    }

    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        conn.execute(
            "INSERT INTO evaluations (session_id, round, payload_json, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                evaluation.session_id,
                evaluation.round,
                serde_json::to_string(&evaluation.payload)?,
                evaluation.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_evaluations(&self, session_id: &str) -> Result<Vec<Evaluation>> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT round, payload_json, created_at FROM evaluations WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut evaluations = Vec::new();
        for row in rows {
            let (round, payload, created_at) = row?;
            evaluations.push(Evaluation {
                session_id: session_id.to_string(),
                round,
                payload: serde_json::from_str(&payload)?,
                created_at: parse_time(&created_at)?,
            });
        }
        Ok(evaluations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epic::Epic;
    use crate::types::{PremiseType, Severity};
    use tempfile::tempdir;

    fn setup_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    fn sample_ledger(session_id: &str) -> (PremiseLedger, String) {
        let mut ledger = PremiseLedger::new(session_id);
        let a = ledger
            .add_premise("All users can export", PremiseType::Capability, 0.8, "a1")
            .id
            .clone();
        let b = ledger
            .add_premise("PII requires access control", PremiseType::Constraint, 0.8, "a2")
            .id
            .clone();
        let c = ledger
            .record_contradiction(&[a, b], "Export of PII is unrestricted", Severity::Critical)
            .unwrap()
            .id
            .clone();
        (ledger, c)
    }

    fn exercise_store(store: &dyn SessionStore) {
        let session = InterrogationSession::new(Epic::ingest("Build a dashboard."), 1);
        assert!(store.get_session(&session.id).unwrap().is_none());

        store.save_session(&session).unwrap();
        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.epic.text, "Build a dashboard.");

        let (mut ledger, contradiction_id) = sample_ledger(&session.id);
        store.save_ledger(&ledger).unwrap();

        ledger.resolve(&contradiction_id, "Only admins can export PII").unwrap();
        store.save_ledger(&ledger).unwrap();

        let loaded = store.get_ledger(&session.id).unwrap();
        assert_eq!(loaded.premises.len(), 2);
        assert_eq!(loaded.premises[0].statement, "All users can export");
        assert_eq!(loaded.contradictions.len(), 1);
        assert!(loaded.contradictions[0].resolved);
        assert_eq!(
            loaded.contradictions[0].resolution.as_deref(),
            Some("Only admins can export PII")
        );
        assert_eq!(loaded.unresolved_critical(), 0);

        store
            .save_evaluation(&Evaluation {
                session_id: session.id.clone(),
                round: 1,
                payload: serde_json::json!({"readyForSpec": false}),
                created_at: Utc::now(),
            })
            .unwrap();
        let evaluations = store.get_evaluations(&session.id).unwrap();
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].payload["readyForSpec"], false);

        exercise_shared_premise_ids(store);
    }

    /// Caller-chosen ids like "p1" are only unique within a session
    fn exercise_shared_premise_ids(store: &dyn SessionStore) {
        let mut ids = Vec::new();
        for (statement, resolved) in [("Export is open to all", true), ("Export is admin only", false)] {
            let session = InterrogationSession::new(Epic::ingest("Let users export reports."), 1);
            store.save_session(&session).unwrap();

            let mut ledger = PremiseLedger::new(session.id.clone());
            ledger.add_premise_with_id("p1".to_string(), statement, PremiseType::Capability, 0.8, "a1");
            ledger.add_premise_with_id(
                "p2".to_string(),
                "PII requires access control",
                PremiseType::Constraint,
                0.8,
                "a2",
            );
            let contradiction_id = ledger
                .record_contradiction(&["p1".to_string(), "p2".to_string()], statement, Severity::Critical)
                .unwrap()
                .id
                .clone();
            store.save_ledger(&ledger).unwrap();
            if resolved {
                ledger.resolve(&contradiction_id, "Only admins can export PII").unwrap();
                store.save_ledger(&ledger).unwrap();
            }
            ids.push(session.id);
        }

        let first = store.get_ledger(&ids[0]).unwrap();
        let second = store.get_ledger(&ids[1]).unwrap();

        assert_eq!(first.premises.len(), 2);
        assert_eq!(second.premises.len(), 2);
        assert_eq!(first.premise("p1").unwrap().statement, "Export is open to all");
        assert_eq!(second.premise("p1").unwrap().statement, "Export is admin only");

        assert_eq!(first.unresolved_critical(), 0);
        assert_eq!(second.unresolved_critical(), 1);
        assert_eq!(
            second.challenge_question().unwrap(),
            "You said \"Export is admin only\" AND \"PII requires access control\". \
             Export is admin only. These cannot both be true. \
             Which is ESSENTIAL, or how do they work together?"
        );
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        let (store, _dir) = setup_test_store();
        exercise_store(&store);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let session = InterrogationSession::new(Epic::ingest("Sync data."), 2);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_session(&session).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.get_session(&session.id).unwrap().is_some());
    }

    #[test]
    fn test_premises_are_append_only() {
        let store = SqliteStore::in_memory().unwrap();
        let session = InterrogationSession::new(Epic::ingest("Sync data."), 2);
        store.save_session(&session).unwrap();

        let (mut ledger, _) = sample_ledger(&session.id);
        store.save_ledger(&ledger).unwrap();

        // A caller dropping a premise locally does not delete it
        ledger.premises.pop();
        store.save_ledger(&ledger).unwrap();
        assert_eq!(store.get_ledger(&session.id).unwrap().premises.len(), 2);
    }

    #[test]
    fn test_unknown_session_has_empty_ledger() {
        let store = MemoryStore::new();
        let ledger = store.get_ledger("nope").unwrap();
        assert_eq!(ledger.session_id, "nope");
        assert!(ledger.premises.is_empty());
    }
}
