//! GitHub REST API client.
//!
//! The hosting-API half of the remote repository gateway: issue comments,
//! pull request creation, and open-PR lookup against the trusted upstream.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::GitHubError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub html_url: String,
}

/// Asynchronous GitHub REST API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let token = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("forkmirror/0.1"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        info!(api_url = %api_url, "created GitHubClient");
        Self {
            http,
            api_url,
            token,
        }
    }

    /// Post a comment on an issue or pull request thread.
    #[instrument(skip(self, body))]
    pub async fn create_issue_comment(
        &self,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<IssueComment, GitHubError> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_url, repo, issue_number
        );
        let payload = serde_json::json!({ "body": body });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        let comment: IssueComment = resp.json().await?;
        debug!(issue_number, comment_id = comment.id, "created issue comment");
        Ok(comment)
    }

    /// Open a pull request from `head` against `base`.
    #[instrument(skip(self, body))]
    pub async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        let url = format!("{}/repos/{}/pulls", self.api_url, repo);
        let payload =
            serde_json::json!({ "title": title, "body": body, "head": head, "base": base });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        let pr: PullRequest = resp.json().await?;
        info!(number = pr.number, "created pull request");
        Ok(pr)
    }

    /// List pull requests whose head matches `head_spec` (`owner:branch`).
    #[instrument(skip(self))]
    pub async fn list_pull_requests(
        &self,
        repo: &str,
        head_spec: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        let url = format!("{}/repos/{}/pulls", self.api_url, repo);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("head", head_spec), ("state", state), ("per_page", "10")])
            .send()
            .await?;
        self.check_response(&resp)?;
        let prs: Vec<PullRequest> = resp.json().await?;
        debug!(count = prs.len(), head_spec, "listed pull requests");
        Ok(prs)
    }

    fn check_response(&self, resp: &reqwest::Response) -> Result<(), GitHubError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GitHubError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        if status.as_u16() == 429 {
            let reset = resp
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(GitHubError::RateLimited { reset_at: reset });
        }
        Err(GitHubError::ApiError {
            status: status.as_u16(),
            body: format!("HTTP {}", status),
        })
    }
}
