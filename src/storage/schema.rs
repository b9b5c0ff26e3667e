//! Database schema definitions

use rusqlite::Connection;
use crate::{Error, Result};

/// SQL to create the workflows table
pub const CREATE_WORKFLOWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS workflows (
    id TEXT NOT NULL PRIMARY KEY,
    node_id TEXT NOT NULL,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    url TEXT NOT NULL,
    html_url TEXT NOT NULL,
    badge_url TEXT NOT NULL
)
"#;

/// SQL to create the repository table
pub const CREATE_REPOSITORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repository (
    name TEXT NOT NULL PRIMARY KEY,
    owner TEXT NOT NULL,
    token TEXT NOT NULL
)
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_WORKFLOWS_TABLE, CREATE_REPOSITORY_TABLE]
}

/// Create both tables if absent.
///
/// Safe to run against an initialised database. Any failure means the store
/// cannot start and is reported as a connection error.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    for stmt in all_schema_statements() {
        conn.execute(stmt, [])
            .map_err(|e| Error::Connection(format!("failed to create schema: {}", e)))?;
    }
    Ok(())
}
