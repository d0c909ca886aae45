//! Status notifications back to the originating fork PR.
//!
//! Every pipeline stage reports its outcome as a single comment on the fork
//! PR's issue thread. Posting is best-effort: a failed comment is logged and
//! swallowed so an already-failing pipeline does not cascade.

use tracing::{debug, warn};

use crate::git::GitHubClient;
use crate::pr_manager::MirrorPr;

/// Posts stage-outcome comments on the fork PR thread.
pub struct Notifier {
    github: GitHubClient,
    repo: String,
}

impl Notifier {
    pub fn new(github: GitHubClient, repo: impl Into<String>) -> Self {
        Self {
            github,
            repo: repo.into(),
        }
    }

    /// Post one comment on the fork PR. Failures are recorded and swallowed.
    pub async fn post(&self, fork_pr_number: u64, message: &str) {
        match self
            .github
            .create_issue_comment(&self.repo, fork_pr_number, message)
            .await
        {
            Ok(comment) => debug!(fork_pr_number, comment_id = comment.id, "posted status comment"),
            Err(e) => warn!(fork_pr_number, error = %e, "failed to post status comment"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage-specific messages
// ---------------------------------------------------------------------------

/// Branch-name collision: mirroring cannot proceed under this name.
pub fn conflict_message(branch: &str) -> String {
    format!(
        "A branch named `{}` already exists in the upstream repository, so this \
         pull request cannot be mirrored for a trusted build. Please rename your \
         branch and open a new pull request.",
        branch
    )
}

/// Fork base is stale relative to trunk.
pub fn unsynced_message(trunk_branch: &str) -> String {
    format!(
        "This pull request is not up to date with `{}`. Please rebase onto (or \
         merge) the latest `{}` and push again to mirror it for a trusted build.",
        trunk_branch, trunk_branch
    )
}

/// First mirror succeeded and a mirror PR was opened.
pub fn mirrored_message(pr: &MirrorPr, commit_sha: &str) -> String {
    format!(
        "Mirrored commit `{}` into the upstream repository; trusted builds will \
         run on {}.",
        commit_sha, pr.url
    )
}

/// An existing mirror PR was updated with the new head.
pub fn updated_message(pr: &MirrorPr, commit_sha: &str) -> String {
    format!(
        "Updated the mirrored branch to commit `{}`; trusted builds will re-run \
         on {}.",
        commit_sha, pr.url
    )
}

/// The branch was updated upstream but no open mirror PR links to it.
pub fn mirror_missing_message(branch: &str) -> String {
    format!(
        "The mirrored branch `{}` was updated, but no open mirror pull request \
         exists for it (it may have been closed or merged). A maintainer needs \
         to look at this manually.",
        branch
    )
}

/// A hard failure ended the run; the raw error is echoed for the author.
pub fn failure_message(error: &str) -> String {
    format!("Mirroring this pull request failed: {}", error)
}
