//! Remote operations against the GitHub Actions API

use reqwest::Method;
use serde_json::{json, Value};
use crate::model::Repository;
use crate::{Error, Result};

/// Every call actiondeck makes to GitHub.
///
/// Method, path and body are exhaustive matches, so a new variant does not
/// compile until all three are decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    List,
    Get { id: String },
    Dispatch { id: String, git_ref: String },
    Enable { id: String },
    Disable { id: String },
}

impl RemoteAction {
    pub fn method(&self) -> Method {
        match self {
            RemoteAction::List | RemoteAction::Get { .. } => Method::GET,
            RemoteAction::Dispatch { .. } => Method::POST,
            RemoteAction::Enable { .. } | RemoteAction::Disable { .. } => Method::PUT,
        }
    }

    fn workflow_id(&self) -> Option<&str> {
        match self {
            RemoteAction::List => None,
            RemoteAction::Get { id }
            | RemoteAction::Dispatch { id, .. }
            | RemoteAction::Enable { id }
            | RemoteAction::Disable { id } => Some(id),
        }
    }

    /// Workflow ids are numeric ids or workflow file names, one path segment
    pub fn validate(&self) -> Result<()> {
        let Some(id) = self.workflow_id() else {
            return Ok(());
        };
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(Error::InvalidRecord(format!("invalid workflow id '{}'", id)));
        }
        Ok(())
    }

    /// Path below the API base url
    pub fn path(&self, repo: &Repository) -> String {
        let base = format!("/repos/{}/{}/actions/workflows", repo.owner, repo.name);
        match self {
            RemoteAction::List => base,
            RemoteAction::Get { id } => format!("{}/{}", base, id),
            RemoteAction::Dispatch { id, .. } => format!("{}/{}/dispatches", base, id),
            RemoteAction::Enable { id } => format!("{}/{}/enable", base, id),
            RemoteAction::Disable { id } => format!("{}/{}/disable", base, id),
        }
    }

    /// JSON body, for the calls that take one
    pub fn body(&self) -> Option<Value> {
        match self {
            RemoteAction::Dispatch { git_ref, .. } => Some(json!({ "ref": git_ref })),
            RemoteAction::List
            | RemoteAction::Get { .. }
            | RemoteAction::Enable { .. }
            | RemoteAction::Disable { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RemoteAction::List => "list",
            RemoteAction::Get { .. } => "get",
            RemoteAction::Dispatch { .. } => "dispatch",
            RemoteAction::Enable { .. } => "enable",
            RemoteAction::Disable { .. } => "disable",
        }
    }
}
