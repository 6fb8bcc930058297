//! Answer storage.
//!
//! Answers live in an in-process SQLite database that disappears with the
//! process. Durability, sharing between processes and crash recovery are not
//! provided; point [`AnswerStore`] at a file-backed connection before relying
//! on any of them.

mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::models::AnswerRecord;

/// Key/value store from node id to answer text.
///
/// Clones share the same connection. Every operation holds the connection
/// lock for its whole duration, so reads and writes are linearizable per key
/// and concurrent writers to one key resolve last-writer-wins.
#[derive(Clone)]
pub struct AnswerStore {
    conn: Arc<Mutex<Connection>>,
}

impl AnswerStore {
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Single answers
    // ============================================================

    /// Insert or overwrite the answer for `node_id`.
    ///
    /// Any text is accepted, including the empty string, and `node_id` is not
    /// checked against the taxonomy.
    pub fn save(&self, node_id: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        upsert(&conn, node_id, value)?;
        tracing::debug!(node_id, "Saved answer");
        Ok(())
    }

    /// The answer for `node_id`, or `None` if nothing has been saved.
    pub fn get(&self, node_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM answers WHERE node_id = ?",
                [node_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn get_record(&self, node_id: &str) -> Result<Option<AnswerRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let record = conn
            .query_row(
                "SELECT node_id, value, updated_at FROM answers WHERE node_id = ?",
                [node_id],
                |row| {
                    Ok(AnswerRecord {
                        node_id: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: parse_datetime(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ============================================================
    // Bulk answers
    // ============================================================

    /// Save every entry of `answers` in one transaction. Returns the number of
    /// entries written.
    pub fn save_bulk(&self, answers: &BTreeMap<String, String>) -> Result<usize> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        for (node_id, value) in answers {
            upsert(&tx, node_id, value)?;
        }
        tx.commit()?;

        tracing::debug!(count = answers.len(), "Saved answers");
        Ok(answers.len())
    }

    /// Answers for the given ids. Ids without an answer are left out of the
    /// result rather than mapped to an empty value.
    pub fn get_bulk<S: AsRef<str>>(&self, node_ids: &[S]) -> Result<BTreeMap<String, String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare_cached("SELECT value FROM answers WHERE node_id = ?")?;

        let unique: BTreeSet<&str> = node_ids.iter().map(AsRef::as_ref).collect();
        let mut answers = BTreeMap::new();
        for node_id in unique {
            let value: Option<String> = stmt.query_row([node_id], |row| row.get(0)).optional()?;
            if let Some(value) = value {
                answers.insert(node_id.to_string(), value);
            }
        }
        Ok(answers)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM answers", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn upsert(conn: &Connection, node_id: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO answers (node_id, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(node_id) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (node_id, value, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
