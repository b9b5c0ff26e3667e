//! SQLite operation bodies
//!
//! `WorkflowDb` wraps the connection owned by the storage actor. Nothing
//! outside the actor holds one, so no method here locks.

use std::path::Path;
use rusqlite::{Connection, DatabaseName, params, OptionalExtension};
use crate::model::{Repository, Workflow, WorkflowState};
use crate::{Result, Error};
use super::schema;

const WORKFLOW_COLUMNS: &str =
    "id, node_id, name, path, state, created_at, updated_at, url, html_url, badge_url";

/// SQLite-backed storage for workflows and repositories
pub struct WorkflowDb {
    conn: Connection,
}

impl WorkflowDb {
    /// Open a database file (creates if doesn't exist) and ensure the schema.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            Error::Connection(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing and short-lived sessions)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(format!("failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // SQLite falls back to read-only when it cannot open for writing
        let readonly = conn
            .is_readonly(DatabaseName::Main)
            .map_err(|e| Error::Connection(format!("failed to inspect database: {}", e)))?;
        if readonly {
            return Err(Error::Connection("database is read-only".to_string()));
        }
        schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    // ========== Workflow Operations ==========

    /// Insert a workflow, overwriting every field if the id already exists
    pub fn upsert_workflow(&self, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;
        self.conn.execute(
            r#"
            INSERT INTO workflows (id, node_id, name, path, state, created_at, updated_at, url, html_url, badge_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                node_id = excluded.node_id,
                name = excluded.name,
                path = excluded.path,
                state = excluded.state,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                url = excluded.url,
                html_url = excluded.html_url,
                badge_url = excluded.badge_url
            "#,
            params![
                workflow.id,
                workflow.node_id,
                workflow.name,
                workflow.path,
                workflow.state.as_str(),
                workflow.created_at,
                workflow.updated_at,
                workflow.url,
                workflow.html_url,
                workflow.badge_url,
            ],
        )?;
        Ok(())
    }

    /// Overwrite all fields of an existing workflow
    pub fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;
        let changed = self.conn.execute(
            r#"
            UPDATE workflows
            SET node_id = ?2, name = ?3, path = ?4, state = ?5, created_at = ?6,
                updated_at = ?7, url = ?8, html_url = ?9, badge_url = ?10
            WHERE id = ?1
            "#,
            params![
                workflow.id,
                workflow.node_id,
                workflow.name,
                workflow.path,
                workflow.state.as_str(),
                workflow.created_at,
                workflow.updated_at,
                workflow.url,
                workflow.html_url,
                workflow.badge_url,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(workflow.id.clone()));
        }
        Ok(())
    }

    /// Delete a workflow by id. Returns whether a row existed.
    pub fn delete_workflow(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM workflows WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Get a workflow by id
    pub fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM workflows WHERE id = ?1", WORKFLOW_COLUMNS),
                [id],
                row_to_workflow,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Workflows whose API url places them under the named repository.
    ///
    /// An unknown repository yields an empty list.
    pub fn workflows_for_repo(&self, repo_name: &str) -> Result<Vec<Workflow>> {
        let Some(repo) = self.get_repository(repo_name)? else {
            return Ok(Vec::new());
        };

        let pattern = format!(
            "%/repos/{}/{}/actions/workflows/%",
            escape_like(&repo.owner),
            escape_like(&repo.name)
        );
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM workflows WHERE url LIKE ?1 ESCAPE '\\' ORDER BY name, id",
            WORKFLOW_COLUMNS
        ))?;

        let workflows = stmt
            .query_map([pattern], row_to_workflow)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(workflows)
    }

    /// Count all workflows
    #[cfg(test)]
    pub fn count_workflows(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM workflows", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Repository Operations ==========

    /// Get a repository by name
    pub fn get_repository(&self, name: &str) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                "SELECT name, owner, token FROM repository WHERE name = ?1",
                [name],
                row_to_repository,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All repositories ordered by name
    pub fn repositories(&self) -> Result<Vec<Repository>> {
        let mut stmt = self.conn.prepare("SELECT name, owner, token FROM repository ORDER BY name")?;
        let repos = stmt
            .query_map([], row_to_repository)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(repos)
    }

    /// Upsert configured repositories by name in one transaction.
    ///
    /// Either every repository is written or none is.
    pub fn seed_repositories(&mut self, repos: &[Repository]) -> Result<usize> {
        for repo in repos {
            repo.validate()?;
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO repository (name, owner, token) VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET owner = excluded.owner, token = excluded.token
                "#,
            )?;
            for repo in repos {
                stmt.execute(params![repo.name, repo.owner, repo.token])?;
            }
        }
        tx.commit()?;
        Ok(repos.len())
    }
}

/// Helper to convert a row to a Workflow
fn row_to_workflow(row: &rusqlite::Row) -> rusqlite::Result<Workflow> {
    let state_str: String = row.get(4)?;
    let state: WorkflowState = state_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Workflow {
        id: row.get(0)?,
        node_id: row.get(1)?,
        name: row.get(2)?,
        path: row.get(3)?,
        state,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        url: row.get(7)?,
        html_url: row.get(8)?,
        badge_url: row.get(9)?,
    })
}

/// Helper to convert a row to a Repository
fn row_to_repository(row: &rusqlite::Row) -> rusqlite::Result<Repository> {
    Ok(Repository {
        name: row.get(0)?,
        owner: row.get(1)?,
        token: row.get(2)?,
    })
}

/// Escape LIKE wildcards so owner/repo names match literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
