//! Refresh the local cache from a remote workflow source

use crate::github::WorkflowSource;
use crate::model::{Repository, Workflow};
use crate::storage::Store;
use crate::{Error, Result};

/// Outcome of syncing several repositories
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Repository name and number of workflows fetched
    pub synced: Vec<(String, usize)>,
    /// Repository name and the error that stopped it
    pub failed: Vec<(String, Error)>,
}

impl SyncReport {
    pub fn total_workflows(&self) -> usize {
        self.synced.iter().map(|(_, count)| count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch a repository's workflows and cache each one.
///
/// Returns what was fetched. With a disabled store nothing is cached and the
/// fetched workflows are still returned.
pub async fn sync_repository<S>(source: &S, store: &Store, repo: &Repository) -> Result<Vec<Workflow>>
where
    S: WorkflowSource + ?Sized,
{
    let workflows = source.list(repo).await?;
    if store.is_available() {
        persist(store, workflows.clone()).await?;
    }
    tracing::info!("synced {} workflow(s) for {}", workflows.len(), repo.full_name());
    Ok(workflows)
}

/// Sync every repository, recording failures instead of stopping at the first
pub async fn sync_all<S>(source: &S, store: &Store, repos: &[Repository]) -> SyncReport
where
    S: WorkflowSource + ?Sized,
{
    let mut report = SyncReport::default();
    for repo in repos {
        match sync_repository(source, store, repo).await {
            Ok(workflows) => report.synced.push((repo.name.clone(), workflows.len())),
            Err(e) => {
                tracing::warn!("sync of {} failed: {}", repo.full_name(), e);
                report.failed.push((repo.name.clone(), e));
            }
        }
    }
    report
}

/// Refresh one workflow after a remote state change
pub async fn refresh_workflow<S>(source: &S, store: &Store, repo: &Repository, id: &str) -> Result<Workflow>
where
    S: WorkflowSource + ?Sized,
{
    let workflow = source.get(repo, id).await?;
    if store.is_available() {
        persist(store, vec![workflow.clone()]).await?;
    }
    Ok(workflow)
}

/// Store calls block on the actor's reply, so keep them off the async workers
async fn persist(store: &Store, workflows: Vec<Workflow>) -> Result<()> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || {
        for workflow in workflows {
            store.store_workflow(workflow)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(format!("cache writer task failed: {}", e)))?
}
