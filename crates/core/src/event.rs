//! Incoming pull-request event boundary.
//!
//! The trigger mechanism delivers the hosting platform's `pull_request`
//! webhook payload as a JSON document. This module parses it into the
//! immutable [`ForkPrEvent`] the pipeline consumes, filtering out everything
//! the pipeline must never touch: events whose head is not a fork, and
//! actions other than `opened` / `synchronize`.

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::EventError;

// ---------------------------------------------------------------------------
// Payload types (wire format)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    action: String,
    number: u64,
    pull_request: PrDetailPayload,
}

#[derive(Debug, Deserialize)]
struct PrDetailPayload {
    title: String,
    body: Option<String>,
    user: UserPayload,
    head: HeadPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct HeadPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
    /// `null` when the head repository has been deleted.
    repo: Option<HeadRepoPayload>,
}

#[derive(Debug, Deserialize)]
struct HeadRepoPayload {
    clone_url: String,
    fork: bool,
    full_name: String,
}

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

/// The pull-request actions the pipeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// The fork PR was just opened.
    Opened,
    /// New commits were pushed to the fork PR's head branch.
    Synchronize,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Synchronize => write!(f, "synchronize"),
        }
    }
}

/// A fork pull-request event, consumed once per pipeline run.
#[derive(Debug, Clone)]
pub struct ForkPrEvent {
    pub action: EventAction,
    /// PR number in the fork PR's home repository.
    pub pr_number: u64,
    /// Head branch name, mirrored upstream verbatim.
    pub head_branch: String,
    /// Clone URL of the fork repository.
    pub head_clone_url: String,
    /// Head commit SHA at event time.
    pub head_sha: String,
    /// Login of the PR author.
    pub author: String,
    pub title: String,
    pub body: String,
}

impl ForkPrEvent {
    /// Parse a `pull_request` webhook payload.
    ///
    /// Returns `Ok(None)` for events the pipeline ignores entirely: actions
    /// other than `opened`/`synchronize`, and heads that do not come from a
    /// fork. Payloads missing the head repository (deleted fork) are an
    /// error -- there is nothing left to mirror from.
    pub fn from_json(payload: &str) -> Result<Option<Self>, EventError> {
        let payload: PullRequestPayload =
            serde_json::from_str(payload).map_err(|e| EventError::ParseError(e.to_string()))?;

        let action = match payload.action.as_str() {
            "opened" => EventAction::Opened,
            "synchronize" => EventAction::Synchronize,
            other => {
                info!(action = other, "ignoring pull_request action");
                return Ok(None);
            }
        };

        let head_repo = payload
            .pull_request
            .head
            .repo
            .ok_or_else(|| EventError::MissingField("pull_request.head.repo".into()))?;

        if !head_repo.fork {
            info!(
                head_repo = %head_repo.full_name,
                "ignoring pull request whose head is not a fork"
            );
            return Ok(None);
        }

        let event = Self {
            action,
            pr_number: payload.number,
            head_branch: payload.pull_request.head.ref_name,
            head_clone_url: head_repo.clone_url,
            head_sha: payload.pull_request.head.sha,
            author: payload.pull_request.user.login,
            title: payload.pull_request.title,
            body: payload.pull_request.body.unwrap_or_default(),
        };

        debug!(
            action = %event.action,
            pr_number = event.pr_number,
            branch = %event.head_branch,
            sha = %event.head_sha,
            "parsed fork PR event"
        );
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(action: &str, fork: bool) -> String {
        format!(
            r#"{{
                "action": "{action}",
                "number": 17,
                "pull_request": {{
                    "title": "Add search endpoint",
                    "body": "Implements the thing.",
                    "user": {{ "login": "octocat" }},
                    "head": {{
                        "ref": "feature-x",
                        "sha": "a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5",
                        "repo": {{
                            "clone_url": "https://github.com/octocat/widget.git",
                            "fork": {fork},
                            "full_name": "octocat/widget"
                        }}
                    }}
                }}
            }}"#
        )
    }

    #[test]
    fn test_parse_opened_fork_event() {
        let event = ForkPrEvent::from_json(&payload("opened", true))
            .unwrap()
            .expect("fork event should not be ignored");
        assert_eq!(event.action, EventAction::Opened);
        assert_eq!(event.pr_number, 17);
        assert_eq!(event.head_branch, "feature-x");
        assert_eq!(event.head_sha, "a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5");
        assert_eq!(event.author, "octocat");
        assert_eq!(event.head_clone_url, "https://github.com/octocat/widget.git");
    }

    #[test]
    fn test_parse_synchronize_event() {
        let event = ForkPrEvent::from_json(&payload("synchronize", true))
            .unwrap()
            .unwrap();
        assert_eq!(event.action, EventAction::Synchronize);
    }

    #[test]
    fn test_non_fork_head_is_ignored() {
        let result = ForkPrEvent::from_json(&payload("opened", false)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_irrelevant_action_is_ignored() {
        let result = ForkPrEvent::from_json(&payload("closed", true)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_head_repo_is_an_error() {
        let payload = r#"{
            "action": "opened",
            "number": 1,
            "pull_request": {
                "title": "t",
                "body": null,
                "user": { "login": "octocat" },
                "head": { "ref": "b", "sha": "abc", "repo": null }
            }
        }"#;
        let result = ForkPrEvent::from_json(payload);
        assert!(matches!(result, Err(EventError::MissingField(_))));
    }

    #[test]
    fn test_null_body_becomes_empty() {
        let payload = payload("opened", true).replace("\"Implements the thing.\"", "null");
        let event = ForkPrEvent::from_json(&payload).unwrap().unwrap();
        assert!(event.body.is_empty());
    }

    #[test]
    fn test_garbage_payload_is_a_parse_error() {
        assert!(matches!(
            ForkPrEvent::from_json("not json"),
            Err(EventError::ParseError(_))
        ));
    }
}
