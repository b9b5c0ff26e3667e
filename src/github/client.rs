//! HTTP implementation of [`WorkflowSource`]

use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use crate::model::{Repository, Workflow};
use crate::{Error, Result};
use super::{ListResponse, RemoteAction, WorkflowSource};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const DEFAULT_PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the GitHub Actions workflows API
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    page_size: usize,
}

impl GithubClient {
    /// Use an existing HTTP client against `base_url`
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Client for api.github.com with sensible timeouts
    pub fn github() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::new(http, GITHUB_API_URL))
    }

    /// Workflows requested per page when listing
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, repo: &Repository, action: &RemoteAction) -> String {
        format!("{}{}", self.base_url, action.path(repo))
    }

    async fn send(
        &self,
        repo: &Repository,
        action: &RemoteAction,
        query: &[(&str, String)],
    ) -> Result<String> {
        repo.validate()?;
        action.validate()?;

        let url = self.url_for(repo, action);
        let mut request = self
            .http
            .request(action.method(), &url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, concat!("actiondeck/", env!("CARGO_PKG_VERSION")))
            .bearer_auth(&repo.token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = action.body() {
            request = request.json(&body);
        }

        tracing::debug!("{} {} ({})", action.method(), url, action.name());
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Remote(format!(
                "{} {} failed with {}: {}",
                action.method(),
                url,
                status,
                text.trim()
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl WorkflowSource for GithubClient {
    async fn list(&self, repo: &Repository) -> Result<Vec<Workflow>> {
        let mut workflows = Vec::new();
        let mut page = 1usize;

        loop {
            let query = [("per_page", self.page_size.to_string()), ("page", page.to_string())];
            let body = self.send(repo, &RemoteAction::List, &query).await?;
            let listed: ListResponse = serde_json::from_str(&body)?;

            let received = listed.workflows.len();
            workflows.extend(listed.workflows);
            if received == 0 || received < self.page_size || workflows.len() >= listed.total_count {
                break;
            }
            page += 1;
        }

        tracing::debug!("listed {} workflow(s) for {}", workflows.len(), repo.full_name());
        Ok(workflows)
    }

    async fn get(&self, repo: &Repository, id: &str) -> Result<Workflow> {
        let action = RemoteAction::Get { id: id.to_string() };
        let body = self.send(repo, &action, &[]).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn dispatch(&self, repo: &Repository, id: &str, git_ref: &str) -> Result<()> {
        let action = RemoteAction::Dispatch {
            id: id.to_string(),
            git_ref: git_ref.to_string(),
        };
        self.send(repo, &action, &[]).await?;
        Ok(())
    }

    async fn enable(&self, repo: &Repository, id: &str) -> Result<()> {
        self.send(repo, &RemoteAction::Enable { id: id.to_string() }, &[]).await?;
        Ok(())
    }

    async fn disable(&self, repo: &Repository, id: &str) -> Result<()> {
        self.send(repo, &RemoteAction::Disable { id: id.to_string() }, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowState;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const TOKEN: &str = "t0k3n";

    #[derive(Default)]
    struct Recorded {
        calls: Mutex<Vec<String>>,
    }

    fn workflow_json(owner: &str, repo: &str, id: u64) -> Value {
        json!({
            "id": id,
            "node_id": format!("node-{}", id),
            "name": format!("wf-{}", id),
            "path": format!(".github/workflows/wf-{}.yaml", id),
            "state": if id % 2 == 0 { "active" } else { "disabled_manually" },
            "created_at": "2020-01-08T23:48:37.000-08:00",
            "updated_at": "2020-01-08T23:50:21.000-08:00",
            "url": format!("https://api.github.com/repos/{}/{}/actions/workflows/{}", owner, repo, id),
            "html_url": format!("https://github.com/{}/{}/blob/main/.github/workflows/wf-{}.yaml", owner, repo, id),
            "badge_url": format!("https://github.com/{}/{}/workflows/wf-{}/badge.svg", owner, repo, id)
        })
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {}", TOKEN))
    }

    async fn list_handler(
        State(recorded): State<Arc<Recorded>>,
        Path((owner, repo)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let per_page: u64 = query.get("per_page").and_then(|v| v.parse().ok()).unwrap_or(30);
        let page: u64 = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
        recorded.calls.lock().unwrap().push(format!("list page {}", page));

        let total = 5u64;
        let start = (page - 1) * per_page + 1;
        let end = (start + per_page).min(total + 1);
        let workflows: Vec<Value> = (start..end).map(|id| workflow_json(&owner, &repo, id)).collect();
        Ok(Json(json!({ "total_count": total, "workflows": workflows })))
    }

    async fn get_handler(
        Path((owner, repo, id)): Path<(String, String, String)>,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        match id.parse::<u64>() {
            Ok(id) if id <= 5 => Ok(Json(workflow_json(&owner, &repo, id))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn dispatch_handler(
        State(recorded): State<Arc<Recorded>>,
        Path((_owner, _repo, id)): Path<(String, String, String)>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        recorded
            .calls
            .lock()
            .unwrap()
            .push(format!("dispatch {} {}", id, body["ref"].as_str().unwrap_or("")));
        StatusCode::NO_CONTENT
    }

    async fn toggle_handler(
        State(recorded): State<Arc<Recorded>>,
        Path((_owner, _repo, id, verb)): Path<(String, String, String, String)>,
    ) -> StatusCode {
        recorded.calls.lock().unwrap().push(format!("{} {}", verb, id));
        StatusCode::NO_CONTENT
    }

    async fn serve() -> (GithubClient, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        let app = Router::new()
            .route("/repos/{owner}/{repo}/actions/workflows", get(list_handler))
            .route("/repos/{owner}/{repo}/actions/workflows/{id}", get(get_handler))
            .route(
                "/repos/{owner}/{repo}/actions/workflows/{id}/dispatches",
                post(dispatch_handler),
            )
            .route("/repos/{owner}/{repo}/actions/workflows/{id}/{verb}", put(toggle_handler))
            .with_state(Arc::clone(&recorded));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GithubClient::new(reqwest::Client::new(), format!("http://{}/", addr));
        (client, recorded)
    }

    fn repo() -> Repository {
        Repository::new("lazy-project", "andreas", TOKEN)
    }

    #[tokio::test]
    async fn test_list_follows_pages() {
        let (client, recorded) = serve().await;
        let client = client.with_page_size(2);

        let workflows = client.list(&repo()).await.unwrap();

        assert_eq!(workflows.len(), 5);
        assert_eq!(workflows[0].id, "1");
        assert_eq!(workflows[0].state, WorkflowState::Disabled);
        assert_eq!(workflows[1].state, WorkflowState::Active);
        assert!(workflows.iter().all(|w| w
            .url
            .starts_with("https://api.github.com/repos/andreas/lazy-project/actions/workflows/")));
        assert_eq!(
            *recorded.calls.lock().unwrap(),
            vec!["list page 1", "list page 2", "list page 3"]
        );
    }

    #[tokio::test]
    async fn test_get_and_not_found() {
        let (client, _) = serve().await;

        let workflow = client.get(&repo(), "4").await.unwrap();
        assert_eq!(workflow.name, "wf-4");
        assert_eq!(workflow.created_at, "2020-01-08T23:48:37.000-08:00");

        let err = client.get(&repo(), "99").await.unwrap_err();
        assert!(matches!(err, Error::Remote(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_bad_token_is_remote_error() {
        let (client, _) = serve().await;
        let repo = Repository::new("lazy-project", "andreas", "wrong");
        let err = client.list(&repo).await.unwrap_err();
        assert!(matches!(err, Error::Remote(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_dispatch_enable_disable() {
        let (client, recorded) = serve().await;

        client.dispatch(&repo(), "3", "main").await.unwrap();
        client.enable(&repo(), "3").await.unwrap();
        client.disable(&repo(), "4").await.unwrap();

        assert_eq!(
            *recorded.calls.lock().unwrap(),
            vec!["dispatch 3 main", "enable 3", "disable 4"]
        );
    }

    #[tokio::test]
    async fn test_incomplete_repository_rejected_before_request() {
        let client = GithubClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let repo = Repository::new("lazy-project", "andreas", "");
        assert!(matches!(
            client.list(&repo).await,
            Err(Error::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_path_like_workflow_id_rejected_before_request() {
        let client = GithubClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(matches!(
            client.get(&repo(), "../../../user").await,
            Err(Error::InvalidRecord(_))
        ));
        assert!(matches!(
            client.dispatch(&repo(), "1/enable", "main").await,
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GithubClient::new(reqwest::Client::new(), "https://example.test/api/");
        assert_eq!(
            client.url_for(&repo(), &RemoteAction::List),
            "https://example.test/api/repos/andreas/lazy-project/actions/workflows"
        );
    }
}
