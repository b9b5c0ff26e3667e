//! Record types persisted by the workflow store
//!
//! - `Repository`: one managed GitHub repository and its access token
//! - `Workflow`: the cached view of one GitHub Actions workflow

use crate::serde_utils::string_or_number;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One GitHub repository under management.
///
/// `name` is the unique key. In configuration the field is spelled `repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(alias = "repo")]
    pub name: String,
    pub owner: String,
    pub token: String,
}

impl Repository {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            token: token.into(),
        }
    }

    /// `owner/name` as shown on GitHub
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Check that every field needed to call the API is set
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "owner is not set for repository '{}'",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "repo is not set for repository owned by '{}'",
                self.owner
            )));
        }
        if self.token.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "token is not set for repository '{}'",
                self.full_name()
            )));
        }
        Ok(())
    }
}

/// Enabled state of a workflow.
///
/// GitHub reports several flavours of disabled; they all collapse to
/// `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Active,
    #[serde(alias = "disabled_manually", alias = "disabled_inactivity", alias = "disabled_fork")]
    Disabled,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Active => "active",
            WorkflowState::Disabled => "disabled",
        }
    }
}

impl FromStr for WorkflowState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(WorkflowState::Active),
            "disabled" | "disabled_manually" | "disabled_inactivity" | "disabled_fork" => {
                Ok(WorkflowState::Disabled)
            }
            _ => Err(Error::InvalidRecord(format!("Unknown workflow state: {}", s))),
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A GitHub Actions workflow as last observed from the API.
///
/// Every field is required, so a partial payload fails to deserialize
/// instead of reaching the store. Timestamps are opaque and kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Remote-assigned id, canonicalised to a decimal string
    #[serde(with = "string_or_number")]
    pub id: String,
    pub node_id: String,
    pub name: String,
    /// File path inside the repository, e.g. `.github/workflows/ci.yaml`
    pub path: String,
    pub state: WorkflowState,
    pub created_at: String,
    pub updated_at: String,
    /// API url: `https://api.github.com/repos/{owner}/{repo}/actions/workflows/{id}`
    pub url: String,
    pub html_url: String,
    pub badge_url: String,
}

impl Workflow {
    /// Reject records the store must never persist
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "workflow '{}' has an empty id",
                self.name
            )));
        }
        Ok(())
    }
}
