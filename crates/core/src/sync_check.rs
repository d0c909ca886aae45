//! Fork-base synchronization validation.
//!
//! A fork branch may only be mirrored when trunk's tip is reachable from the
//! fork branch's tip -- otherwise the fork sits on a stale base and the
//! author must rebase or merge the latest trunk first.

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::MirrorError;
use crate::git::GitClient;

/// Private ref the upstream trunk is fetched into.
pub const TRUNK_REF: &str = "refs/forkmirror/trunk";
/// Private ref the fork branch head is fetched into.
pub const FORK_HEAD_REF: &str = "refs/forkmirror/fork-head";

/// Ancestry relation between trunk and the fork branch, recomputed on every
/// event and never cached across events.
#[derive(Debug, Clone, Serialize)]
pub struct SyncState {
    pub common_ancestor_sha: String,
    pub trunk_head_sha: String,
    pub is_synced: bool,
}

/// Validates that the fork branch descends from trunk's current tip.
pub struct SyncValidator;

impl SyncValidator {
    /// Fetch trunk and the fork branch, then compare the merge base against
    /// trunk's head. Fetch failures are fatal for the run -- they usually
    /// mean a deleted fork or a network fault, and are never retried.
    pub fn check(
        git: &GitClient,
        upstream_url: &str,
        trunk_branch: &str,
        fork_url: &str,
        fork_branch: &str,
        token: Option<&str>,
    ) -> Result<SyncState, MirrorError> {
        git.fetch_branch(upstream_url, trunk_branch, TRUNK_REF, token)?;
        git.fetch_branch(fork_url, fork_branch, FORK_HEAD_REF, None)?;

        let trunk_head_sha = git.resolve_ref(TRUNK_REF)?;
        let common_ancestor_sha = git.merge_base(TRUNK_REF, FORK_HEAD_REF)?;
        let is_synced = common_ancestor_sha == trunk_head_sha;

        if is_synced {
            debug!(
                trunk_head = %trunk_head_sha,
                "fork branch descends from trunk tip"
            );
        } else {
            info!(
                trunk_head = %trunk_head_sha,
                common_ancestor = %common_ancestor_sha,
                "fork branch is behind trunk"
            );
        }

        Ok(SyncState {
            common_ancestor_sha,
            trunk_head_sha,
            is_synced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state_relation() {
        let synced = SyncState {
            common_ancestor_sha: "abc".into(),
            trunk_head_sha: "abc".into(),
            is_synced: true,
        };
        assert_eq!(synced.common_ancestor_sha, synced.trunk_head_sha);

        let stale = SyncState {
            common_ancestor_sha: "abc".into(),
            trunk_head_sha: "def".into(),
            is_synced: false,
        };
        assert_ne!(stale.common_ancestor_sha, stale.trunk_head_sha);
    }
}
