//! GitHub Actions API - the remote workflow source
//!
//! The store never talks to the network. Workflows come from a
//! [`WorkflowSource`]; [`GithubClient`] is the real one and takes its HTTP
//! client as a constructor argument, so tests can point it anywhere.

pub mod request;
pub mod client;

pub use request::RemoteAction;
pub use client::{GithubClient, GITHUB_API_URL};

use async_trait::async_trait;
use serde::Deserialize;
use crate::model::{Repository, Workflow};
use crate::Result;

/// Something that can list and drive a repository's workflows
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn list(&self, repo: &Repository) -> Result<Vec<Workflow>>;

    async fn get(&self, repo: &Repository, id: &str) -> Result<Workflow>;

    /// Trigger a `workflow_dispatch` run on `git_ref`
    async fn dispatch(&self, repo: &Repository, id: &str, git_ref: &str) -> Result<()>;

    async fn enable(&self, repo: &Repository, id: &str) -> Result<()>;

    async fn disable(&self, repo: &Repository, id: &str) -> Result<()>;
}

/// Body of `GET /repos/{owner}/{repo}/actions/workflows`
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub total_count: usize,
    pub workflows: Vec<Workflow>,
}
