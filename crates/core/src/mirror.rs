//! Mirror branch synchronization.
//!
//! Performs the create-or-update transition for the mirror branch: the fork
//! branch's head is copied into the trusted upstream under the identical
//! name. Whether this is the branch's first appearance upstream is decided
//! here, not at conflict-check time -- fetch and merge-base latency leaves a
//! window in which another actor could have created the branch.

use tracing::info;

use crate::errors::MirrorError;
use crate::git::GitClient;

/// Staging ref used when force-updating an existing mirror branch.
const UPDATE_STAGING_REF: &str = "refs/forkmirror/staging";

/// Result of one create-or-update branch push.
#[derive(Debug, Clone)]
pub struct MirrorOutcome {
    /// True when the push created the upstream branch.
    pub is_first_mirror: bool,
    /// Fork head commit, verbatim.
    pub commit_sha: String,
    /// First 7 characters of the fork head commit.
    pub commit_short_sha: String,
}

/// Abbreviate a commit SHA to its 7-character short form.
pub fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

/// Copies the fork branch into the trusted upstream.
pub struct MirrorSynchronizer;

impl MirrorSynchronizer {
    /// Fetch the fork branch and push it upstream under its own name.
    ///
    /// The push is the last step: any earlier failure leaves upstream
    /// untouched. Update pushes are forced so a rebased fork branch still
    /// mirrors; only the latest push's content must survive.
    pub fn sync(
        git: &GitClient,
        upstream_url: &str,
        fork_url: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<MirrorOutcome, MirrorError> {
        let exists_upstream = git.remote_branch_exists(upstream_url, branch, token)?;

        let commit_sha = if exists_upstream {
            git.fetch_branch(fork_url, branch, UPDATE_STAGING_REF, None)?;
            let tip = git.resolve_ref(UPDATE_STAGING_REF)?;
            git.force_branch(branch, &tip)?;
            git.push_branch(upstream_url, branch, true, token)?;
            tip
        } else {
            let local_ref = format!("refs/heads/{}", branch);
            git.fetch_branch(fork_url, branch, &local_ref, None)?;
            let tip = git.resolve_ref(&local_ref)?;
            git.push_branch(upstream_url, branch, false, token)?;
            tip
        };

        let outcome = MirrorOutcome {
            is_first_mirror: !exists_upstream,
            commit_short_sha: short_sha(&commit_sha),
            commit_sha,
        };
        info!(
            branch,
            first_mirror = outcome.is_first_mirror,
            sha = %outcome.commit_sha,
            "mirrored fork branch upstream"
        );
        Ok(outcome)
    }
}
