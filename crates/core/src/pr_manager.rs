//! Mirror pull request lifecycle.
//!
//! On a first mirror, opens the mirror PR against trunk with a
//! preview-prefixed title and a body that back-references the original fork
//! PR. On updates, locates the existing open mirror PR by head branch and
//! annotates it. Both paths finish by posting the trigger marker comment
//! that downstream build automation watches for.

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{GitHubConfig, MirrorConfig};
use crate::errors::MirrorError;
use crate::event::ForkPrEvent;
use crate::git::GitHubClient;
use crate::mirror::MirrorOutcome;

/// Comment body that triggers the downstream build system.
///
/// Downstream automation matches these exact bytes, misspelling included.
/// Never edit this literal.
pub const TRIGGER_MARKER_COMMENT: &str = "/run-tursted-build";

/// A mirror pull request in the trusted upstream repository.
#[derive(Debug, Clone)]
pub struct MirrorPr {
    pub number: u64,
    pub url: String,
    pub branch: String,
    pub state: String,
}

/// Creates and annotates mirror pull requests.
pub struct MirrorPrManager {
    github: GitHubClient,
    repo: String,
    owner: String,
    trunk_branch: String,
    title_prefix: String,
}

impl MirrorPrManager {
    pub fn new(github: GitHubClient, config: &GitHubConfig, mirror: &MirrorConfig) -> Self {
        Self {
            github,
            repo: config.repo.clone(),
            owner: config.owner().to_string(),
            trunk_branch: config.trunk_branch.clone(),
            title_prefix: mirror.title_prefix.clone(),
        }
    }

    /// Head filter for the open-PR lookup, `owner:branch`.
    fn head_spec(&self, branch: &str) -> String {
        format!("{}:{}", self.owner, branch)
    }

    /// Open a new mirror PR for a freshly mirrored branch and post the
    /// trigger marker comment on it.
    pub async fn create_mirror_pr(
        &self,
        event: &ForkPrEvent,
        outcome: &MirrorOutcome,
    ) -> Result<MirrorPr, MirrorError> {
        let title = format!("{} {}", self.title_prefix, event.title);
        let body = build_mirror_body(event, outcome);

        let pr = self
            .github
            .create_pull_request(&self.repo, &title, &body, &event.head_branch, &self.trunk_branch)
            .await?;
        info!(
            mirror_pr = pr.number,
            fork_pr = event.pr_number,
            branch = %event.head_branch,
            "created mirror pull request"
        );

        self.github
            .create_issue_comment(&self.repo, pr.number, TRIGGER_MARKER_COMMENT)
            .await?;

        Ok(MirrorPr {
            number: pr.number,
            url: pr.html_url,
            branch: event.head_branch.clone(),
            state: pr.state,
        })
    }

    /// Locate the open mirror PR for an updated branch and annotate it with
    /// an update notice plus the trigger marker comment.
    ///
    /// Zero matches means the mirror PR was closed or merged externally --
    /// terminal for this step, though the branch push already landed. More
    /// than one match violates the one-mirror-PR-per-branch invariant and is
    /// surfaced rather than silently picking a winner.
    pub async fn update_mirror_pr(
        &self,
        event: &ForkPrEvent,
        outcome: &MirrorOutcome,
    ) -> Result<MirrorPr, MirrorError> {
        let head_spec = self.head_spec(&event.head_branch);
        let mut prs = self
            .github
            .list_pull_requests(&self.repo, &head_spec, "open")
            .await?;

        let pr = match prs.len() {
            0 => {
                warn!(
                    branch = %event.head_branch,
                    "no open mirror pull request found for updated branch"
                );
                return Err(MirrorError::MirrorPrMissing(event.head_branch.clone()));
            }
            1 => prs.remove(0),
            count => {
                return Err(MirrorError::MultipleMirrorPrs {
                    branch: event.head_branch.clone(),
                    count,
                });
            }
        };

        let notice = build_update_notice(event, outcome);
        self.github
            .create_issue_comment(&self.repo, pr.number, &notice)
            .await?;
        self.github
            .create_issue_comment(&self.repo, pr.number, TRIGGER_MARKER_COMMENT)
            .await?;

        info!(
            mirror_pr = pr.number,
            fork_pr = event.pr_number,
            sha = %outcome.commit_sha,
            "annotated existing mirror pull request"
        );

        Ok(MirrorPr {
            number: pr.number,
            url: pr.html_url,
            branch: event.head_branch.clone(),
            state: pr.state,
        })
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Body of a newly created mirror PR: structured back-references, the
/// original description verbatim, and a non-propagation footer.
fn build_mirror_body(event: &ForkPrEvent, outcome: &MirrorOutcome) -> String {
    format!(
        "> Preview copy of fork pull request #{number}.\n\
         >\n\
         > - Original PR: #{number}\n\
         > - Author: @{author}\n\
         > - Branch: `{branch}`\n\
         > - Commit: `{sha}`\n\
         > - Mirrored at: {timestamp}\n\
         \n\
         {body}\n\
         \n\
         ---\n\
         This pull request was generated by forkmirror. Edits here do not \
         propagate back to the original pull request.",
        number = event.pr_number,
        author = event.author,
        branch = event.head_branch,
        sha = outcome.commit_sha,
        timestamp = Utc::now().to_rfc3339(),
        body = event.body,
    )
}

/// Update notice posted on the mirror PR when the fork branch advances.
fn build_update_notice(event: &ForkPrEvent, outcome: &MirrorOutcome) -> String {
    format!(
        "Mirrored new commits from fork pull request #{}: head is now `{}` ({}).",
        event.pr_number, outcome.commit_sha, outcome.commit_short_sha,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventAction;

    fn sample_event() -> ForkPrEvent {
        ForkPrEvent {
            action: EventAction::Opened,
            pr_number: 17,
            head_branch: "feature-x".into(),
            head_clone_url: "https://github.com/octocat/widget.git".into(),
            head_sha: "a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5".into(),
            author: "octocat".into(),
            title: "Add search endpoint".into(),
            body: "Implements the thing.".into(),
        }
    }

    fn sample_outcome() -> MirrorOutcome {
        MirrorOutcome {
            is_first_mirror: true,
            commit_sha: "a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5".into(),
            commit_short_sha: "a3f5c1e".into(),
        }
    }

    #[test]
    fn test_mirror_body_embeds_sha_verbatim() {
        let body = build_mirror_body(&sample_event(), &sample_outcome());
        assert!(body.contains("a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5"));
        assert!(body.contains("#17"));
        assert!(body.contains("@octocat"));
        assert!(body.contains("`feature-x`"));
        assert!(body.contains("Implements the thing."));
        assert!(body.contains("do not propagate back"));
    }

    #[test]
    fn test_update_notice_mentions_both_sha_forms() {
        let notice = build_update_notice(&sample_event(), &sample_outcome());
        assert!(notice.contains("a3f5c1e9b2d4a3f5c1e9b2d4a3f5c1e9b2d4a3f5"));
        assert!(notice.contains("(a3f5c1e)"));
        assert!(notice.contains("#17"));
    }

    #[test]
    fn test_trigger_marker_is_opaque() {
        // The misspelling is contractual for downstream automation.
        assert_eq!(TRIGGER_MARKER_COMMENT, "/run-tursted-build");
    }

    #[test]
    fn test_head_spec_is_owner_qualified() {
        let config = GitHubConfig {
            api_url: "https://api.github.com".into(),
            repo: "acme/widget".into(),
            token_env: "GH_TOKEN".into(),
            trunk_branch: "main".into(),
            git_base_url: None,
            token: None,
        };
        let manager = MirrorPrManager::new(
            GitHubClient::new("https://api.github.com", "tok"),
            &config,
            &MirrorConfig::default(),
        );
        assert_eq!(manager.head_spec("feature-x"), "acme:feature-x");
    }
}
